//! promptinit application library
//!
//! Wires settings, the MongoDB store and the initializer together for the
//! `prompts` collection.

pub mod modules;

/// `bootstrap`, `default_documents` and `seed_plan` at the crate root
pub use modules::*;
