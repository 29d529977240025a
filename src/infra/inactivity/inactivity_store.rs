// Implementations of the inactivity storage port.

pub mod in_memory;
pub mod sqlite_store;

// Re-export for convenience
pub use in_memory::InMemoryActivityStore;
pub use sqlite_store::SqliteActivityStore;
