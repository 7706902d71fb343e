//! Post-retrieval access filtering. Runs on every candidate regardless of
//! any pushdown the index applied; a candidate whose access rule cannot be
//! evaluated is dropped, never shown.

use crate::error::SiftError;
use crate::models::{AccessSpec, Candidate};

pub fn is_visible(candidate: &Candidate, requester: &str) -> bool {
    match &candidate.access {
        Some(AccessSpec::Open) => true,
        Some(AccessSpec::Restricted {
            allowed_identities,
            is_public,
        }) => *is_public || allowed_identities.contains(requester),
        None => {
            let error = SiftError::PermissionEvaluation {
                document_id: candidate.id.clone(),
                message: "missing or unparseable access rule".to_string(),
            };
            tracing::warn!(error = %error, "Dropping candidate, failing closed");
            false
        }
    }
}

pub fn filter_visible(candidates: Vec<Candidate>, requester: &str) -> Vec<Candidate> {
    let before = candidates.len();
    let visible: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| is_visible(c, requester))
        .collect();
    if visible.len() < before {
        tracing::debug!(
            requester = %requester,
            dropped = before - visible.len(),
            "Permission filter removed candidates"
        );
    }
    visible
}
