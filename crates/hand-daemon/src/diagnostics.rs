//! Diagnostics reporter for the hand daemon.
//!
//! Runs on its own thread, reads the seqlock ledger mirror and the
//! collaborators' debug probes, and periodically writes a report to a sink.
//! It never touches the scheduler, so a slow sink cannot stall the control
//! loop.

use crate::signals::ShutdownFlag;
use hand_common::config::ReportFormat;
use hand_common::ledger::RuntimeMeasurement;
use hand_drivers::{BusSnapshot, SignalBus};
use hand_runtime::registry::DebugProbe;
use hand_runtime::shared_ledger::SharedLedger;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SEPARATOR: &str = "----------------------------------------";

/// Granularity of the shutdown check while waiting for the next report.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Runtime statistics of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReport {
    /// Slot index.
    pub index: usize,
    /// Task name.
    pub name: String,
    /// Most recent execution time.
    pub current_us: u32,
    /// Minimum per the ledger's sentinel policy.
    pub min_us: u32,
    /// Largest execution time.
    pub max_us: u32,
    /// Spread between `max_us` and `min_us`.
    pub jitter_us: u32,
    /// Whether `max_us` exceeds the slot length.
    pub over_budget: bool,
}

/// One collaborator's debug dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Collaborator name.
    pub name: String,
    /// Probe output.
    pub dump: String,
}

/// One diagnostics report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticsReport {
    /// Time since the reporter was created.
    pub uptime_ms: u64,
    /// Slot length all execution times are compared against.
    pub slot_budget_us: u32,
    /// Per-slot statistics.
    pub slots: Vec<SlotReport>,
    /// Collaborator dumps.
    pub probes: Vec<ProbeReport>,
    /// Values on the signal bus, when the reporter watches one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus: Option<BusSnapshot>,
}

impl DiagnosticsReport {
    /// Render as the human-readable tree.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{SEPARATOR}");
        let _ = writeln!(out, " > runtimes (in microseconds):");
        for slot in &self.slots {
            let _ = write!(
                out,
                "    ├─[{}] {} curr: {}, min: {}, max: {}",
                slot.index, slot.name, slot.current_us, slot.min_us, slot.max_us
            );
            if slot.over_budget {
                let _ = write!(out, " (over {}us budget)", self.slot_budget_us);
            }
            out.push('\n');
        }
        for probe in &self.probes {
            let _ = writeln!(out, " > {}", probe.dump);
        }
        out
    }

    /// Render as a single JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Render in the given format, newline-terminated.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render(&self, format: ReportFormat) -> io::Result<String> {
        match format {
            ReportFormat::Text => Ok(self.to_text()),
            ReportFormat::Json => {
                let mut line = self.to_json()?;
                line.push('\n');
                Ok(line)
            }
        }
    }
}

/// Collects reports from the ledger mirror and the probes.
pub struct DiagnosticsReporter {
    ledger: Arc<SharedLedger>,
    slot_names: Vec<String>,
    probes: Vec<Arc<dyn DebugProbe>>,
    slot_budget_us: u32,
    format: ReportFormat,
    bus: Option<Arc<SignalBus>>,
    started: Instant,
}

impl std::fmt::Debug for DiagnosticsReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsReporter")
            .field("slot_names", &self.slot_names)
            .field("probes", &self.probes.len())
            .field("slot_budget_us", &self.slot_budget_us)
            .field("format", &self.format)
            .field("bus", &self.bus.is_some())
            .finish_non_exhaustive()
    }
}

impl DiagnosticsReporter {
    /// Create a reporter.
    pub fn new(
        ledger: Arc<SharedLedger>,
        slot_names: Vec<String>,
        probes: Vec<Arc<dyn DebugProbe>>,
        slot_budget_us: u32,
        format: ReportFormat,
    ) -> Self {
        Self {
            ledger,
            slot_names,
            probes,
            slot_budget_us,
            format,
            bus: None,
            started: Instant::now(),
        }
    }

    /// Include a snapshot of `bus` in every report.
    #[must_use]
    pub fn with_bus(mut self, bus: Arc<SignalBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Take one report.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn collect(&self) -> DiagnosticsReport {
        let slots = (0..self.ledger.len())
            .map(|index| {
                let m = self.ledger.read(index).unwrap_or(RuntimeMeasurement::UNMEASURED);
                SlotReport {
                    index,
                    name: self
                        .slot_names
                        .get(index)
                        .cloned()
                        .unwrap_or_else(|| "?".to_owned()),
                    current_us: m.current_us,
                    min_us: m.min_us,
                    max_us: m.max_us,
                    jitter_us: m.jitter_us(),
                    over_budget: m.max_us > self.slot_budget_us,
                }
            })
            .collect();

        let probes = self
            .probes
            .iter()
            .map(|probe| ProbeReport {
                name: probe.name().to_owned(),
                dump: probe.debug_dump(),
            })
            .collect();

        DiagnosticsReport {
            uptime_ms: self.started.elapsed().as_millis() as u64,
            slot_budget_us: self.slot_budget_us,
            slots,
            probes,
            bus: self.bus.as_ref().map(|bus| bus.snapshot()),
        }
    }

    /// Collect one report and write it to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub fn write_report<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        let rendered = self.collect().render(self.format)?;
        sink.write_all(rendered.as_bytes())?;
        sink.flush()
    }

    /// Write a report every `interval` until `shutdown` is raised.
    ///
    /// Stops early if the sink fails. Returns the number of reports written.
    pub fn run<W: Write>(&self, mut sink: W, interval: Duration, shutdown: &ShutdownFlag) -> u64 {
        let mut written = 0;
        while !shutdown.is_raised() {
            if let Err(e) = self.write_report(&mut sink) {
                warn!(error = %e, "Diagnostics sink failed, stopping reporter");
                break;
            }
            written += 1;

            let deadline = Instant::now() + interval;
            while !shutdown.is_raised() {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                thread::sleep(SHUTDOWN_POLL.min(deadline - now));
            }
        }
        debug!(written, "Diagnostics reporter finished");
        written
    }

    /// Run the reporter on a named background thread, optionally pinned to a CPU.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<W>(
        self,
        sink: W,
        interval: Duration,
        cpu: Option<usize>,
        shutdown: ShutdownFlag,
    ) -> io::Result<JoinHandle<u64>>
    where
        W: Write + Send + 'static,
    {
        thread::Builder::new()
            .name("hand-diagnostics".into())
            .spawn(move || {
                if let Some(cpu) = cpu {
                    if let Err(e) = hand_runtime::realtime::pin_current_thread(cpu) {
                        warn!(cpu, error = %e, "Could not pin diagnostics thread");
                    }
                }
                info!(interval = %humantime::format_duration(interval), format = ?self.format, "Diagnostics reporter started");
                self.run(sink, interval, &shutdown)
            })
    }
}
