//! Relay Core - Data Types
//!
//! Pure data structures shared by the relay crates: authorities and roles,
//! tenant identity, message DTOs and alias payloads. No I/O lives here.

pub mod alias;
pub mod authority;
pub mod error;
pub mod message;
pub mod tenant;

pub use alias::{AliasMessageDto, ForwardAliasDto};
pub use authority::{granted_authorities, Authority, Role, UnknownAuthority};
pub use error::{AliasError, ConfigError, RelayError, RelayResult, ValidationError};
pub use message::{
    AliasOnlyMessageDto, ChatMessage, ChatUser, ForwardMessageDto, MasterKeyDto, MessageDto,
    MessageResponseDto, MessageStreamDto, MessageType, Validate, VideoCallEventType,
    VideoCallMessageDto,
};
pub use tenant::{TenantContext, TenantId};
