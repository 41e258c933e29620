use serde::{Deserialize, Serialize};

/// Lifecycle state of a document in the catalog.
///
/// Legal transitions:
/// `PENDING -> QUEUED -> PROCESSING -> (COMPLETED | FAILED | QUEUED)`.
/// Terminal states only re-enter the machine through an explicit
/// reprocessing reset, which is modelled separately from a normal
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Outcome of validating a status transition. Callers branch on this
/// instead of catching errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    Ok,
    InvalidTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },
}

impl TransitionResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, TransitionResult::Ok)
    }
}

impl DocumentStatus {
    pub fn validate_transition(from: DocumentStatus, to: DocumentStatus) -> TransitionResult {
        let legal = match (from, to) {
            (DocumentStatus::Pending, DocumentStatus::Queued) => true,
            (DocumentStatus::Queued, DocumentStatus::Processing) => true,
            (DocumentStatus::Processing, DocumentStatus::Completed) => true,
            (DocumentStatus::Processing, DocumentStatus::Failed) => true,
            // A worker nack puts the document back in line for another attempt.
            (DocumentStatus::Processing, DocumentStatus::Queued) => true,
            // Idempotent re-enqueue by the sweeper.
            (DocumentStatus::Pending, DocumentStatus::Pending) => true,
            (DocumentStatus::Queued, DocumentStatus::Queued) => true,
            // Progress updates while a worker holds the lease.
            (DocumentStatus::Processing, DocumentStatus::Processing) => true,
            _ => false,
        };

        if legal {
            TransitionResult::Ok
        } else {
            TransitionResult::InvalidTransition { from, to }
        }
    }

    /// Whether a reprocessing reset (terminal state back to QUEUED) is
    /// allowed from this state. Documents being actively processed must
    /// reach a terminal state first.
    pub fn can_reset_for_reprocessing(&self) -> bool {
        !matches!(self, DocumentStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "PENDING",
            DocumentStatus::Queued => "QUEUED",
            DocumentStatus::Processing => "PROCESSING",
            DocumentStatus::Completed => "COMPLETED",
            DocumentStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(DocumentStatus::Pending),
            "QUEUED" => Ok(DocumentStatus::Queued),
            "PROCESSING" => Ok(DocumentStatus::Processing),
            "COMPLETED" => Ok(DocumentStatus::Completed),
            "FAILED" => Ok(DocumentStatus::Failed),
            other => Err(format!("Invalid document status: {}", other)),
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_pipeline_transitions() {
        assert!(
            DocumentStatus::validate_transition(DocumentStatus::Pending, DocumentStatus::Queued)
                .is_ok()
        );
        assert!(
            DocumentStatus::validate_transition(DocumentStatus::Queued, DocumentStatus::Processing)
                .is_ok()
        );
        assert!(
            DocumentStatus::validate_transition(
                DocumentStatus::Processing,
                DocumentStatus::Completed
            )
            .is_ok()
        );
        assert!(
            DocumentStatus::validate_transition(DocumentStatus::Processing, DocumentStatus::Failed)
                .is_ok()
        );
        assert!(
            DocumentStatus::validate_transition(DocumentStatus::Processing, DocumentStatus::Queued)
                .is_ok()
        );
    }

    #[test]
    fn test_terminal_states_do_not_transition_normally() {
        let result = DocumentStatus::validate_transition(
            DocumentStatus::Completed,
            DocumentStatus::Processing,
        );
        assert_eq!(
            result,
            TransitionResult::InvalidTransition {
                from: DocumentStatus::Completed,
                to: DocumentStatus::Processing,
            }
        );

        assert!(
            !DocumentStatus::validate_transition(DocumentStatus::Failed, DocumentStatus::Queued)
                .is_ok()
        );
        assert!(
            !DocumentStatus::validate_transition(DocumentStatus::Pending, DocumentStatus::Completed)
                .is_ok()
        );
    }

    #[test]
    fn test_reset_eligibility() {
        assert!(DocumentStatus::Completed.can_reset_for_reprocessing());
        assert!(DocumentStatus::Failed.can_reset_for_reprocessing());
        assert!(DocumentStatus::Queued.can_reset_for_reprocessing());
        assert!(!DocumentStatus::Processing.can_reset_for_reprocessing());
    }

    #[test]
    fn test_string_round_trip() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Queued,
            DocumentStatus::Processing,
            DocumentStatus::Completed,
            DocumentStatus::Failed,
        ] {
            assert_eq!(DocumentStatus::from_str(status.as_str()), Ok(status));
        }

        assert!(DocumentStatus::from_str("ARCHIVED").is_err());
    }
}
