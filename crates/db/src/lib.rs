//! Storage layer for promptinit: the [`DocumentStore`] seam, its MongoDB and
//! in-memory implementations, and the [`Initializer`] that runs against them.

pub mod error;
pub mod initializer;
pub mod memory;
pub mod mongo;
pub mod store;

pub use error::{InitError, Step};
pub use initializer::{InitReport, Initializer, SeedOutcome, SeedPlan};
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use store::{DocumentStore, StoreError};
