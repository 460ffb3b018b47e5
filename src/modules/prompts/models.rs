use serde::{Deserialize, Serialize};

/// Default prompt settings for one document category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Category key, e.g. `pdf`. Unique across the collection.
    pub default_type: String,
    /// Prompt used when no user-given prompt exists; may be empty.
    #[serde(default)]
    pub default_prompt: String,
}

impl ConfigDocument {
    pub const KEY_FIELD: &'static str = "default_type";

    pub fn new(default_type: impl Into<String>, default_prompt: impl Into<String>) -> Self {
        Self {
            default_type: default_type.into(),
            default_prompt: default_prompt.into(),
        }
    }
}
