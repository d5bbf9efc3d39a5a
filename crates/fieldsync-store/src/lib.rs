// ABOUTME: Persistence layer for fieldsync, holding the offline write queue and its durable backends.
// ABOUTME: Provides the DurableStore contract, in-memory and SQLite backends, and the QueueStore.

pub mod durable;
pub mod memory;
pub mod queue;
pub mod sqlite;

pub use durable::{DurableStore, StoreError};
pub use memory::MemoryStore;
pub use queue::{LoadedQueues, QueueError, QueueStore, Queues};
pub use sqlite::SqliteStore;
