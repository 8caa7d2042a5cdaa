//! Custom extractors for message handlers.

mod chat_headers;
mod validated_json;

pub use chat_headers::{header_value, ChatAuthHeaders};
pub use validated_json::ValidatedJson;
