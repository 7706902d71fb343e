mod conversation;
mod document;
mod search;
mod sync;

pub use conversation::{ConversationTurn, TurnRole};
pub use document::{content_hash, document_id, AccessSpec, Document, Metadata, Source};
pub use search::{
    Candidate, Citation, DateRange, IndexFilter, IndexStats, RankedResult, SearchFilters,
    SearchQuery, SearchOutcome, SearchResultItem,
};
pub use sync::{SourceStatus, SyncState};
