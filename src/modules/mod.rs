pub mod prompts;

pub use prompts::{bootstrap, default_documents, seed_plan};
