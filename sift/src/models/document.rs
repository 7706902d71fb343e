use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Free-form source-specific fields (author, url, title) kept for citation
/// rendering.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Closed set of content origins. Connectors are selected by this identifier,
/// never by runtime probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Chat,
    Issue,
    Transcript,
    CodeReview,
    Document,
}

impl Source {
    pub const ALL: [Source; 5] = [
        Source::Chat,
        Source::Issue,
        Source::Transcript,
        Source::CodeReview,
        Source::Document,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Chat => "chat",
            Source::Issue => "issue",
            Source::Transcript => "transcript",
            Source::CodeReview => "code_review",
            Source::Document => "document",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for Source {}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Source::Chat),
            "issue" => Ok(Source::Issue),
            "transcript" => Ok(Source::Transcript),
            "code_review" => Ok(Source::CodeReview),
            "document" => Ok(Source::Document),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// Access-control rule attached to a document. Exactly one variant per
/// document; evaluation fails closed when the stored form cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessSpec {
    /// Visible to every authenticated requester.
    Open,
    /// Visible iff `is_public` or the requester is in `allowed_identities`.
    Restricted {
        allowed_identities: HashSet<String>,
        is_public: bool,
    },
}

/// Canonical, searchable unit. The embedding vector is owned by the index
/// and never retained on this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source: Source,
    pub text: String,
    pub content_hash: String,
    pub project_key: Option<String>,
    pub access: AccessSpec,
    pub source_metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Deterministic document id from (source, source-native id, chunk index).
/// Re-ingesting the same source item always yields the same id, so upsert
/// can never duplicate it.
pub fn document_id(source: Source, native_id: &str, chunk_index: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(native_id.as_bytes());
    hasher.update(b":");
    hasher.update(chunk_index.to_string().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..32].to_string()
}

/// Content hash used to skip re-embedding unchanged items.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_is_deterministic() {
        let a = document_id(Source::Chat, "msg-42", 0);
        let b = document_id(Source::Chat, "msg-42", 0);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_document_id_varies_by_inputs() {
        let base = document_id(Source::Chat, "msg-42", 0);
        assert_ne!(base, document_id(Source::Issue, "msg-42", 0));
        assert_ne!(base, document_id(Source::Chat, "msg-43", 0));
        assert_ne!(base, document_id(Source::Chat, "msg-42", 1));
    }

    #[test]
    fn test_content_hash_tracks_text() {
        assert_eq!(content_hash("hello"), content_hash("hello"));
        assert_ne!(content_hash("hello"), content_hash("hello!"));
    }

    #[test]
    fn test_source_round_trip() {
        for source in Source::ALL {
            assert_eq!(Source::from_str(source.as_str()).unwrap(), source);
        }
        assert!(Source::from_str("wiki").is_err());
    }

    #[test]
    fn test_access_spec_serde_tagged() {
        let open = serde_json::to_string(&AccessSpec::Open).unwrap();
        assert_eq!(open, r#"{"kind":"open"}"#);

        let restricted = AccessSpec::Restricted {
            allowed_identities: ["alice".to_string()].into_iter().collect(),
            is_public: false,
        };
        let json = serde_json::to_string(&restricted).unwrap();
        let back: AccessSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, restricted);

        // Unknown or truncated payloads must not deserialize.
        assert!(serde_json::from_str::<AccessSpec>(r#"{"kind":"secret"}"#).is_err());
        assert!(serde_json::from_str::<AccessSpec>(r#"{"kind":"restricted"}"#).is_err());
    }
}
