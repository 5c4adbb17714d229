//! Control messages exchanged between a caller and the batch controller.

use serde::{Deserialize, Serialize};

use super::batch::{BatchId, BatchRequest};

/// Inbound control message, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Start a batch of queries followed by synthesis
    StartBatch {
        /// Queries in submission order
        queries: Vec<String>,
        /// Instruction for the synthesis step
        #[serde(rename = "integrationPrompt")]
        integration_prompt: String,
    },
}

impl ControlMessage {
    /// Batch request carried by the message.
    pub fn into_request(self) -> BatchRequest {
        match self {
            Self::StartBatch {
                queries,
                integration_prompt,
            } => BatchRequest::new(queries, integration_prompt),
        }
    }
}

/// Reply to a control message, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ControlResponse {
    /// The batch was admitted
    Ok {
        /// Id of the admitted batch
        #[serde(rename = "batchId")]
        batch_id: BatchId,
    },
    /// The message was rejected
    Error {
        /// Why
        message: String,
    },
}

impl ControlResponse {
    /// True when the batch was admitted.
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}
