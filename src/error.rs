//! Run-level failures callers need to tell apart.
use crate::state::AuditState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("invalid audit request: {0}")]
    InvalidRequest(String),

    /// The enrichment cap was reached while data was still insufficient.
    /// Carries the final state so callers can still render what was gathered.
    #[error(
        "enrichment exhausted after {iterations} iteration(s); still missing: {}",
        .missing.join(", ")
    )]
    EnrichmentExhausted {
        iterations: u32,
        missing: Vec<String>,
        state: Box<AuditState>,
    },
}

impl AuditError {
    pub fn state(&self) -> Option<&AuditState> {
        match self {
            Self::EnrichmentExhausted { state, .. } => Some(state),
            Self::InvalidRequest(_) => None,
        }
    }
}
