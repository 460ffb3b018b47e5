use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

/// The initializer step a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Connect,
    ListCollections,
    CreateCollection,
    CountDocuments,
    InsertDefault,
    CreateIndex,
    ListDefaults,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Connect => "connect",
            Step::ListCollections => "list collections",
            Step::CreateCollection => "create collection",
            Step::CountDocuments => "count documents",
            Step::InsertDefault => "insert default document",
            Step::CreateIndex => "create unique index",
            Step::ListDefaults => "list default documents",
        };
        f.write_str(name)
    }
}

/// Fatal initialization failures.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("database unreachable during {step}")]
    Unreachable {
        step: Step,
        #[source]
        source: StoreError,
    },

    #[error(
        "unique index on `{collection}.{field}` cannot be built: existing documents or \
         indexes conflict with it and must be fixed by hand"
    )]
    IndexConflict {
        collection: String,
        field: String,
        #[source]
        source: StoreError,
    },

    #[error("{step} failed")]
    Step {
        step: Step,
        #[source]
        source: StoreError,
    },
}

impl InitError {
    pub(crate) fn at(step: Step, source: StoreError) -> Self {
        if source.is_unavailable() {
            InitError::Unreachable { step, source }
        } else {
            InitError::Step { step, source }
        }
    }

    pub fn step(&self) -> Step {
        match self {
            InitError::Unreachable { step, .. } | InitError::Step { step, .. } => *step,
            InitError::IndexConflict { .. } => Step::CreateIndex,
        }
    }
}
