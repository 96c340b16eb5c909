//! Feedback events for the notes client
//!
//! Every user-facing outcome of a sync or auth operation is published as a
//! [`NoteEvent`]. A presentation layer registers callbacks to show alerts and
//! trigger success/failure feedback (haptics, toasts, colored CLI output).
//!
//! # Thread Safety
//!
//! The dispatcher uses a single-thread callback model:
//! 1. Events can be emitted from any thread or task
//! 2. Events are queued for processing
//! 3. Callbacks only run when `process_events()` is called
//! 4. `process_events()` must run on the thread that registered the first callback
//!
//! UI toolkits that require main-thread updates can drain events from their own
//! event loop without extra synchronization.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex};
use std::thread::{self, ThreadId};
use strum::Display;
use tasknotes_core::{models::TaskId, NoteError, NoteResult};

/// The user-triggered operation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
    SignIn,
    SignUp,
    SignOut,
}

/// Success/failure notification surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Feedback {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    TasksLoaded,
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    OperationFailed,
    SignedIn,
    SignedUp,
    SignedOut,
    Alert,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NoteEvent {
    /// The local list was replaced with a fresh copy from the store
    TasksLoaded { count: usize },
    TaskCreated { title: String },
    TaskUpdated { id: TaskId },
    TaskDeleted { id: TaskId },
    /// Any failure, including validation; `message` is what the user sees
    OperationFailed { operation: Operation, message: String },
    SignedIn { email: String },
    SignedUp { confirmation_pending: bool },
    SignedOut,
    /// Informational message that is neither success nor failure
    Alert { title: String, message: String },
}

impl NoteEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            NoteEvent::TasksLoaded { .. } => EventType::TasksLoaded,
            NoteEvent::TaskCreated { .. } => EventType::TaskCreated,
            NoteEvent::TaskUpdated { .. } => EventType::TaskUpdated,
            NoteEvent::TaskDeleted { .. } => EventType::TaskDeleted,
            NoteEvent::OperationFailed { .. } => EventType::OperationFailed,
            NoteEvent::SignedIn { .. } => EventType::SignedIn,
            NoteEvent::SignedUp { .. } => EventType::SignedUp,
            NoteEvent::SignedOut => EventType::SignedOut,
            NoteEvent::Alert { .. } => EventType::Alert,
        }
    }

    /// Feedback signal to play for this event, if any.
    pub fn feedback(&self) -> Option<Feedback> {
        match self {
            NoteEvent::TaskCreated { .. }
            | NoteEvent::TaskUpdated { .. }
            | NoteEvent::TaskDeleted { .. }
            | NoteEvent::SignedIn { .. }
            | NoteEvent::SignedUp { .. } => Some(Feedback::Success),
            NoteEvent::OperationFailed { .. } => Some(Feedback::Failure),
            NoteEvent::TasksLoaded { .. } | NoteEvent::SignedOut | NoteEvent::Alert { .. } => None,
        }
    }
}

struct CallbackEntry {
    callback: Box<dyn Fn(NoteEvent) + Send>,
    event_filter: Option<EventType>,
}

/// Thread-safe event dispatcher for managing callbacks and event processing
///
/// # Example
///
/// ```rust,no_run
/// use tasknotes_client::events::{EventDispatcher, NoteEvent};
///
/// let dispatcher = EventDispatcher::new();
///
/// dispatcher.register_callback(|event| {
///     if let NoteEvent::OperationFailed { message, .. } = event {
///         eprintln!("Error: {}", message);
///     }
/// }).unwrap();
///
/// // In the UI loop
/// dispatcher.process_events().unwrap();
/// ```
pub struct EventDispatcher {
    callbacks: Mutex<Vec<CallbackEntry>>,
    event_queue: Mutex<mpsc::Receiver<NoteEvent>>,
    event_sender: mpsc::Sender<NoteEvent>,
    callback_thread_id: Mutex<Option<ThreadId>>,
    has_callbacks: AtomicBool,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            callbacks: Mutex::new(Vec::new()),
            event_queue: Mutex::new(receiver),
            event_sender: sender,
            callback_thread_id: Mutex::new(None),
            has_callbacks: AtomicBool::new(false),
        }
    }

    /// Helper to set callback thread ID on first registration
    fn ensure_callback_thread(&self) -> NoteResult<()> {
        let mut thread_id = self
            .callback_thread_id
            .lock()
            .map_err(|_| NoteError::LockError("thread ID".into()))?;
        if thread_id.is_none() {
            *thread_id = Some(thread::current().id());
            tracing::info!(
                "Event callbacks will be processed on thread: {:?}",
                thread::current().id()
            );
        }
        Ok(())
    }

    /// Register a callback for all events
    pub fn register_callback<F>(&self, callback: F) -> NoteResult<()>
    where
        F: Fn(NoteEvent) + Send + 'static,
    {
        self.push_callback(Box::new(callback), None)
    }

    /// Register a callback that only receives events of `event_filter` type
    pub fn register_callback_filtered<F>(&self, callback: F, event_filter: EventType) -> NoteResult<()>
    where
        F: Fn(NoteEvent) + Send + 'static,
    {
        self.push_callback(Box::new(callback), Some(event_filter))
    }

    fn push_callback(
        &self,
        callback: Box<dyn Fn(NoteEvent) + Send>,
        event_filter: Option<EventType>,
    ) -> NoteResult<()> {
        self.ensure_callback_thread()?;

        let mut callbacks = self
            .callbacks
            .lock()
            .map_err(|_| NoteError::LockError("callbacks".into()))?;

        callbacks.push(CallbackEntry {
            callback,
            event_filter,
        });
        self.has_callbacks.store(true, Ordering::SeqCst);

        Ok(())
    }

    /// Queues `event` for the next `process_events()`. Events emitted before
    /// any callback is registered are dropped, since nothing could ever
    /// receive them.
    pub fn emit(&self, event: NoteEvent) {
        if !self.has_callbacks.load(Ordering::SeqCst) {
            tracing::trace!("No callbacks registered; dropping {:?}", event.event_type());
            return;
        }
        tracing::debug!("Queueing event {:?}", event.event_type());
        if self.event_sender.send(event).is_err() {
            tracing::error!("Failed to queue event - receiver may have been dropped");
        }
    }

    pub fn emit_failure(&self, operation: Operation, error: &NoteError) {
        self.emit(NoteEvent::OperationFailed {
            operation,
            message: error.to_string(),
        });
    }

    pub fn emit_alert(&self, title: &str, message: &str) {
        self.emit(NoteEvent::Alert {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    /// Process all queued events. This MUST be called on the same thread where callbacks were registered.
    pub fn process_events(&self) -> NoteResult<usize> {
        {
            let thread_id = self
                .callback_thread_id
                .lock()
                .map_err(|_| NoteError::LockError("thread ID".into()))?;
            match *thread_id {
                Some(expected) if thread::current().id() != expected => {
                    return Err(NoteError::ThreadSafetyViolation);
                }
                Some(_) => {}
                None => return Err(NoteError::NoCallbacksRegistered),
            }
        }

        let callbacks = self
            .callbacks
            .lock()
            .map_err(|_| NoteError::LockError("callbacks".into()))?;
        let receiver = self
            .event_queue
            .lock()
            .map_err(|_| NoteError::LockError("event queue".into()))?;

        let mut processed_count = 0;
        while let Ok(event) = receiver.try_recv() {
            let event_type = event.event_type();
            for entry in callbacks.iter() {
                if let Some(filter) = entry.event_filter {
                    if filter != event_type {
                        continue;
                    }
                }
                (entry.callback)(event.clone());
            }
            processed_count += 1;
        }

        Ok(processed_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_feedback_mapping() {
        assert_eq!(
            NoteEvent::TaskCreated { title: "A".into() }.feedback(),
            Some(Feedback::Success)
        );
        assert_eq!(
            NoteEvent::OperationFailed {
                operation: Operation::List,
                message: "boom".into()
            }
            .feedback(),
            Some(Feedback::Failure)
        );
        assert_eq!(NoteEvent::TasksLoaded { count: 3 }.feedback(), None);
        assert_eq!(Operation::SignIn.to_string(), "sign_in");
    }

    #[test]
    fn test_process_without_callbacks_fails() {
        let dispatcher = EventDispatcher::new();
        dispatcher.emit(NoteEvent::SignedOut);
        assert!(matches!(
            dispatcher.process_events(),
            Err(NoteError::NoCallbacksRegistered)
        ));
    }

    #[test]
    fn test_events_without_callbacks_are_not_retained() {
        let dispatcher = EventDispatcher::new();
        for id in 0..2000 {
            dispatcher.emit(NoteEvent::TaskDeleted { id });
        }

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        dispatcher
            .register_callback(move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(dispatcher.process_events().unwrap(), 0);

        dispatcher.emit(NoteEvent::SignedOut);
        assert_eq!(dispatcher.process_events().unwrap(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_thread_safety_check() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        dispatcher
            .register_callback(move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let dispatcher_clone = dispatcher.clone();
        let handle = std::thread::spawn(move || dispatcher_clone.process_events());
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(NoteError::ThreadSafetyViolation)));

        // Events emitted on another thread are still delivered here.
        let emitter = dispatcher.clone();
        std::thread::spawn(move || emitter.emit(NoteEvent::TaskDeleted { id: 4 }))
            .join()
            .unwrap();

        assert_eq!(dispatcher.process_events().unwrap(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_filtered_and_unfiltered_callbacks() {
        let dispatcher = EventDispatcher::new();
        let all = Arc::new(Mutex::new(Vec::<String>::new()));
        let failures = Arc::new(AtomicUsize::new(0));

        let all_clone = all.clone();
        dispatcher
            .register_callback(move |event| {
                let desc = match &event {
                    NoteEvent::TaskCreated { title } => format!("created:{}", title),
                    NoteEvent::OperationFailed { operation, message } => {
                        format!("failed:{}:{}", operation, message)
                    }
                    other => format!("other:{:?}", other.event_type()),
                };
                all_clone.lock().unwrap().push(desc);
            })
            .unwrap();

        let failures_clone = failures.clone();
        dispatcher
            .register_callback_filtered(
                move |_| {
                    failures_clone.fetch_add(1, Ordering::SeqCst);
                },
                EventType::OperationFailed,
            )
            .unwrap();

        dispatcher.emit(NoteEvent::TaskCreated {
            title: "Groceries".into(),
        });
        dispatcher.emit_failure(Operation::Delete, &NoteError::NotAuthenticated);
        dispatcher.emit(NoteEvent::TasksLoaded { count: 2 });

        assert_eq!(dispatcher.process_events().unwrap(), 3);
        assert_eq!(failures.load(Ordering::SeqCst), 1);

        let seen = all.lock().unwrap();
        assert_eq!(seen[0], "created:Groceries");
        assert_eq!(seen[1], "failed:delete:User not found. Please sign in.");
        assert_eq!(seen[2], "other:TasksLoaded");

        // Queue is drained
        assert_eq!(dispatcher.process_events().unwrap(), 0);
    }
}
