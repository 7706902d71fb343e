mod conversations;
mod documents;
mod sync_state;

pub use conversations::ConversationRepository;
pub use documents::DocumentRepository;
pub use sync_state::SyncStateRepository;
