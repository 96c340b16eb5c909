//! TaskNotes - per-user notes kept in a hosted table store
//!
//! This crate provides a unified API over the TaskNotes client and core types.
//!
//! # Example
//!
//! ```ignore
//! use tasknotes::{Client, ClientConfig};
//!
//! let client = Client::new(ClientConfig::from_env()?)?;
//! client.sign_in("ana@example.com", "password1").await?;
//! client.create_task("Groceries", "milk").await?;
//! ```

// Re-export client types
pub use tasknotes_client::{
    AuthFlow, AuthScreen, Client, ClientConfig, EventDispatcher, Feedback, InMemoryStore,
    NoteEvent, Operation, SupabaseClient, TaskBoard, TaskSync,
};

// Re-export core types that external applications may need
pub use tasknotes_core::errors::{NoteError, StoreError};
pub use tasknotes_core::models::{Session, SignUpOutcome, Task, TaskId};
pub use tasknotes_core::NoteResult;
