//! Converts raw source items into canonical documents: stable identity,
//! cleaned text, and the access spec the source's policy dictates.

use serde_json::json;

use crate::connectors::RawItem;
use crate::models::{content_hash, document_id, AccessSpec, Document, Metadata, Source};

/// Normalize one raw item into one or more documents. Bodies longer than
/// `max_chars` are split at whitespace into per-chunk documents, each with
/// its chunk index baked into the id.
pub fn normalize(source: Source, raw: &RawItem, max_chars: usize) -> Vec<Document> {
    let text = normalize_text(&raw.body);
    if text.is_empty() {
        return Vec::new();
    }

    let access = derive_access(source, raw);
    let metadata = build_metadata(raw);

    split_chunks(&text, max_chars)
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| Document {
            id: document_id(source, &raw.native_id, index as u32),
            source,
            content_hash: content_hash(&chunk),
            text: chunk,
            project_key: raw.project_key.clone(),
            access: access.clone(),
            source_metadata: metadata.clone(),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        })
        .collect()
}

/// Collapse whitespace runs and strip control characters, preserving line
/// breaks so transcripts keep their speaker structure.
fn normalize_text(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    for line in body.lines() {
        let cleaned: String = line
            .chars()
            .filter(|c| !c.is_control())
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if !cleaned.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&cleaned);
        }
    }
    out
}

fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Source policy for access control. Chat, issues, and code review are
/// organization-wide in this deployment; transcripts are restricted to
/// attendees plus explicitly shared identities; documents are restricted
/// only when the source reports a participant list.
fn derive_access(source: Source, raw: &RawItem) -> AccessSpec {
    match source {
        Source::Chat | Source::Issue | Source::CodeReview => AccessSpec::Open,
        Source::Transcript => AccessSpec::Restricted {
            allowed_identities: raw
                .participants
                .clone()
                .unwrap_or_default()
                .into_iter()
                .collect(),
            is_public: raw.is_public.unwrap_or(false),
        },
        Source::Document => match &raw.participants {
            Some(participants) => AccessSpec::Restricted {
                allowed_identities: participants.iter().cloned().collect(),
                is_public: raw.is_public.unwrap_or(false),
            },
            None => AccessSpec::Open,
        },
    }
}

fn build_metadata(raw: &RawItem) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("native_id".to_string(), json!(raw.native_id));
    if let Some(ref title) = raw.title {
        metadata.insert("title".to_string(), json!(title));
    }
    if let Some(ref url) = raw.url {
        metadata.insert("url".to_string(), json!(url));
    }
    if let Some(ref author) = raw.author {
        metadata.insert("author".to_string(), json!(author));
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn raw_item(native_id: &str, body: &str) -> RawItem {
        RawItem {
            native_id: native_id.to_string(),
            title: Some("Weekly sync".to_string()),
            url: Some("https://example.com/item".to_string()),
            author: Some("alice".to_string()),
            body: body.to_string(),
            project_key: Some("PROJ".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            participants: None,
            is_public: None,
        }
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let raw = raw_item("msg-1", "hello   world");
        let a = normalize(Source::Chat, &raw, 8000);
        let b = normalize(Source::Chat, &raw, 8000);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].id, b[0].id);
        assert_eq!(a[0].content_hash, b[0].content_hash);
        assert_eq!(a[0].text, "hello world");
    }

    #[test]
    fn test_empty_body_yields_no_documents() {
        let raw = raw_item("msg-2", "  \n\t ");
        assert!(normalize(Source::Chat, &raw, 8000).is_empty());
    }

    #[test]
    fn test_long_body_splits_into_chunks_with_distinct_ids() {
        let body = "lorem ipsum dolor sit amet ".repeat(50);
        let raw = raw_item("doc-1", &body);
        let docs = normalize(Source::Document, &raw, 100);
        assert!(docs.len() > 1);
        let mut ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), docs.len());
        for doc in &docs {
            assert!(doc.text.chars().count() <= 100);
        }
    }

    #[test]
    fn test_chat_is_open_access() {
        let raw = raw_item("msg-3", "standup notes");
        let docs = normalize(Source::Chat, &raw, 8000);
        assert_eq!(docs[0].access, AccessSpec::Open);
    }

    #[test]
    fn test_transcript_is_restricted_to_participants() {
        let mut raw = raw_item("meet-1", "quarterly planning discussion");
        raw.participants = Some(vec!["alice".to_string(), "bob".to_string()]);
        raw.is_public = Some(false);

        let docs = normalize(Source::Transcript, &raw, 8000);
        match &docs[0].access {
            AccessSpec::Restricted {
                allowed_identities,
                is_public,
            } => {
                assert!(allowed_identities.contains("alice"));
                assert!(allowed_identities.contains("bob"));
                assert!(!is_public);
            }
            other => panic!("expected restricted access, got {other:?}"),
        }
    }

    #[test]
    fn test_transcript_without_participants_is_restricted_empty() {
        let raw = raw_item("meet-2", "ad-hoc call");
        let docs = normalize(Source::Transcript, &raw, 8000);
        match &docs[0].access {
            AccessSpec::Restricted {
                allowed_identities,
                is_public,
            } => {
                assert!(allowed_identities.is_empty());
                assert!(!is_public);
            }
            other => panic!("expected restricted access, got {other:?}"),
        }
    }

    #[test]
    fn test_metadata_carries_citation_fields() {
        let raw = raw_item("msg-4", "release notes");
        let docs = normalize(Source::Chat, &raw, 8000);
        assert_eq!(docs[0].source_metadata["title"], json!("Weekly sync"));
        assert_eq!(docs[0].source_metadata["author"], json!("alice"));
    }
}
