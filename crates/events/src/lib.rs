#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in kiln
//!
//! Library crates never print or log. They emit [`AppEvent`]s through an
//! [`EventSender`], and the CLI drains the channel and turns events into
//! structured `tracing` records.

pub mod meta;
pub use meta::{EventLevel, EventSource};

pub mod events;
pub use events::{
    AppEvent, BuildEvent, FailureContext, GeneralEvent, InstallEvent, ManifestEvent,
    ResolverEvent,
};

use tokio::sync::mpsc::UnboundedSender;

/// Type alias for the event sender
pub type EventSender = UnboundedSender<AppEvent>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events
///
/// Implemented by the raw `EventSender` and by any context that may carry one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // A dropped receiver only means nobody is listening
            let _ = sender.send(event);
        }
    }

    /// Emit a debug log event
    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    /// Emit a warning event
    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    /// Emit an error event
    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }

    /// Emit an operation started event
    fn emit_operation_started(&self, operation: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::OperationStarted {
            operation: operation.into(),
        }));
    }

    /// Emit an operation completed event
    fn emit_operation_completed(&self, operation: impl Into<String>, success: bool) {
        self.emit(AppEvent::General(GeneralEvent::OperationCompleted {
            operation: operation.into(),
            success,
        }));
    }

    /// Emit an operation failed event
    fn emit_operation_failed(&self, operation: impl Into<String>, error: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::OperationFailed {
            operation: operation.into(),
            error: error.into(),
        }));
    }
}

impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

impl EventEmitter for Option<EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.as_ref()
    }
}
