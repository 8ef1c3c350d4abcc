//! Task registry: the slot-indexed dispatch table.
//!
//! The program composes the registry once at startup from already
//! initialized collaborators, in slot order. After the scheduler is built
//! the registry is never reordered or extended.
//!
//! # Collaborator contract
//!
//! - [`Collaborator::init`] is called by the program before the collaborator
//!   is bound; the registry never calls it.
//! - [`Collaborator::handle`] runs once per cycle in its slot. It must not
//!   block and should return within the slot budget; nothing enforces this.
//! - [`Collaborator::debug_probe`] exposes a read-only view for the
//!   diagnostics reporter, which runs on another thread.

use hand_common::error::HandResult;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Read-only debug view of a collaborator, safe to use from the reporter thread.
pub trait DebugProbe: Send + Sync {
    /// Collaborator name shown in reports.
    fn name(&self) -> &str;

    /// Human-readable snapshot of the collaborator state.
    fn debug_dump(&self) -> String;
}

/// Peripheral driver bound into a task slot.
pub trait Collaborator: Send {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// One-time initialization, called by the program before scheduling starts.
    ///
    /// # Errors
    ///
    /// An error aborts controller startup.
    fn init(&mut self) -> HandResult<()>;

    /// Per-cycle work. Must return promptly.
    fn handle(&mut self);

    /// Optional debug view for the diagnostics reporter.
    fn debug_probe(&self) -> Option<Arc<dyn DebugProbe>> {
        None
    }
}

impl<T: Collaborator + ?Sized> Collaborator for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn init(&mut self) -> HandResult<()> {
        (**self).init()
    }

    fn handle(&mut self) {
        (**self).handle();
    }

    fn debug_probe(&self) -> Option<Arc<dyn DebugProbe>> {
        (**self).debug_probe()
    }
}

type Handler = Box<dyn FnMut() + Send>;

/// One registry entry.
pub enum TaskSlot {
    /// Reserved slot; firing it does nothing.
    Idle,
    /// Slot bound to a handler.
    Bound {
        /// Task name.
        name: String,
        /// Zero-argument handle function.
        handler: Handler,
    },
}

impl TaskSlot {
    /// Name of the bound task, or `"idle"`.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Bound { name, .. } => name,
        }
    }
}

impl fmt::Debug for TaskSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Bound { name, .. } => f.debug_struct("Bound").field("name", name).finish_non_exhaustive(),
        }
    }
}

/// Ordered dispatch table mapping slot index to handle function.
#[derive(Default)]
pub struct TaskRegistry {
    slots: Vec<TaskSlot>,
    probes: Vec<Arc<dyn DebugProbe>>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("slots", &self.slots)
            .field("probes", &self.probes.len())
            .finish()
    }
}

impl TaskRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with room for `slot_count` entries.
    #[must_use]
    pub fn with_capacity(slot_count: usize) -> Self {
        Self {
            slots: Vec::with_capacity(slot_count),
            probes: Vec::new(),
        }
    }

    /// Bind the next slot to a closure.
    pub fn push_task<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        debug!(slot = self.slots.len(), task = %name, "Binding task slot");
        self.slots.push(TaskSlot::Bound {
            name,
            handler: Box::new(handler),
        });
        self
    }

    /// Bind the next slot to an initialized collaborator.
    ///
    /// The collaborator's debug probe, if any, is kept for the reporter.
    pub fn push_collaborator<C>(&mut self, mut collaborator: C) -> &mut Self
    where
        C: Collaborator + 'static,
    {
        if let Some(probe) = collaborator.debug_probe() {
            self.probes.push(probe);
        }
        let name = collaborator.name();
        self.push_task(name, move || collaborator.handle())
    }

    /// Reserve the next slot.
    pub fn push_idle(&mut self) -> &mut Self {
        debug!(slot = self.slots.len(), "Reserving idle slot");
        self.slots.push(TaskSlot::Idle);
        self
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the registry has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Run the handler bound to `slot`.
    ///
    /// Returns `false` for idle or out-of-range slots.
    #[inline]
    pub fn dispatch(&mut self, slot: usize) -> bool {
        match self.slots.get_mut(slot) {
            Some(TaskSlot::Bound { handler, .. }) => {
                handler();
                true
            }
            Some(TaskSlot::Idle) | None => false,
        }
    }

    /// Name of the task in `slot`.
    #[must_use]
    pub fn slot_name(&self, slot: usize) -> Option<&str> {
        self.slots.get(slot).map(TaskSlot::name)
    }

    /// Names of all slots, in slot order.
    #[must_use]
    pub fn slot_names(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.name().to_owned()).collect()
    }

    /// Debug probes of the bound collaborators, in binding order.
    #[must_use]
    pub fn probes(&self) -> &[Arc<dyn DebugProbe>] {
        &self.probes
    }
}
