//! Wire messages exchanged with the trigger source and the TRB workers.
//!
//! Two message types cross the process boundary: the [`TriggerDecision`]
//! sent to a worker's decision connection, and the [`CompletionToken`] the
//! worker returns once the corresponding trigger record has been written.
//! Both are encoded as MessagePack; the dispatch core itself only ever
//! handles the decoded structs or opaque byte buffers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a trigger decision, monotonically increasing within a run.
pub type TriggerNumber = u64;

/// Identifier of a data-taking run.
pub type RunNumber = u32;

/// A command to assemble a trigger record at a downstream worker.
///
/// The component list is the readout request payload; the orchestrator
/// forwards it untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDecision {
    /// Trigger sequence number within the run.
    pub trigger_number: TriggerNumber,
    /// Run this decision belongs to.
    pub run_number: RunNumber,
    /// Readout components requested for this trigger.
    pub components: Vec<u32>,
}

impl TriggerDecision {
    /// Create a decision with no component payload.
    pub fn new(trigger_number: TriggerNumber, run_number: RunNumber) -> Self {
        Self {
            trigger_number,
            run_number,
            components: Vec::new(),
        }
    }

    /// Encode to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::encode::to_vec(self)?)
    }

    /// Decode from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(rmp_serde::decode::from_slice(bytes)?)
    }
}

/// Completion message returned by a TRB worker.
///
/// Carries the originating trigger number and the worker's own connection
/// name so the orchestrator can locate the outstanding assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionToken {
    /// Run the completed trigger belonged to.
    pub run_number: RunNumber,
    /// Trigger number of the completed record.
    pub trigger_number: TriggerNumber,
    /// Connection name of the worker that built the record.
    pub decision_destination: String,
}

impl CompletionToken {
    /// Encode to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::encode::to_vec(self)?)
    }

    /// Decode from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(rmp_serde::decode::from_slice(bytes)?)
    }
}

/// Errors from the MessagePack codec boundary.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Message could not be encoded
    #[error("message encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Byte buffer could not be decoded
    #[error("message decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_round_trip() {
        let decision = TriggerDecision {
            trigger_number: 42,
            run_number: 7,
            components: vec![1, 2, 3],
        };

        let bytes = decision.to_bytes().unwrap();
        let decoded = TriggerDecision::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, decision);
    }

    #[test]
    fn test_token_round_trip() {
        let token = CompletionToken {
            run_number: 7,
            trigger_number: 42,
            decision_destination: "trb01".to_string(),
        };

        let bytes = token.to_bytes().unwrap();
        let decoded = CompletionToken::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_token_decode_rejects_garbage() {
        let result = CompletionToken::from_bytes(&[0xff, 0x00, 0x13]);
        assert!(result.is_err());
    }
}
