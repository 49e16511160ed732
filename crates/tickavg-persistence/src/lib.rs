//! Trade record storage for tickavg.
//!
//! Storage is a narrow two-operation collaborator: append a batch, query by
//! symbol and time bound. Two backends are provided:
//! - `MemoryStorage`: per-symbol vectors, for tests and ephemeral runs
//! - `JsonLinesStorage`: append-only daily `.jsonl` files

pub mod error;
pub mod jsonl;
pub mod memory;
pub mod storage;

pub use error::{PersistenceError, PersistenceResult};
pub use jsonl::JsonLinesStorage;
pub use memory::MemoryStorage;
pub use storage::{DynStorage, RecordQuery, Storage, TimeBound};
