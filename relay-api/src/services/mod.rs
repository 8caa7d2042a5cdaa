//! Service Layer
//!
//! Business logic behind the message handlers. Handlers only extract and
//! validate input, then call into a [`MessageFacade`].

mod message_facade;

pub use message_facade::*;
