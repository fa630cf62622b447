//! Input sequence records

use serde::{Deserialize, Serialize};

/// One entry of the input sequence set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    /// Sequence identifier, unique within a run
    #[serde(rename = "ID")]
    pub id: String,
    /// Amino-acid sequence (one-letter codes)
    pub sequence: String,
}

impl SequenceRecord {
    pub fn new(id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
        }
    }
}
