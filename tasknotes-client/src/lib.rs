pub mod auth;
pub mod client;
pub mod config;
pub mod events;
pub mod memory;
pub mod rest;
pub mod store;
pub mod sync;

pub use auth::{AuthFlow, AuthScreen};
pub use client::Client;
pub use config::ClientConfig;
pub use events::{EventDispatcher, Feedback, NoteEvent, Operation};
pub use memory::{InMemoryStore, StoreOp};
pub use rest::SupabaseClient;
pub use store::{AuthBackend, RemoteStore, StoreResult};
pub use sync::{ComposeSheet, EditSheet, TaskBoard, TaskSync};
