// ABOUTME: Sync engine for fieldsync: drains offline queues against a remote acceptor.
// ABOUTME: Exposes the RemoteAcceptor trait, a simulated backend, the engine, and test stubs.

pub mod engine;
pub mod remote;
pub mod testing;

pub use engine::{SyncEngine, SyncError, SyncOptions, SyncReport};
pub use remote::{RemoteAcceptor, RemoteError, SimulatedRemote};
