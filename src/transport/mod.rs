//! Chat transport seam
//!
//! The bot core talks to WhatsApp only through [`ChatTransport`] and
//! [`GroupAdmin`], so delivery and moderation can be driven by test doubles.

/// Group IQ queries (admin lookup, participant removal)
pub mod groups;
/// WhatsApp implementation over `whatsapp-rust`
pub mod whatsapp;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by chat transports
#[derive(Debug, Error)]
pub enum TransportError {
    /// The client is not connected yet or was logged out
    #[error("WhatsApp client is not connected")]
    NotConnected,
    /// The chat id could not be parsed as a JID
    #[error("Invalid chat id: {0}")]
    InvalidChat(String),
    /// Media upload failed
    #[error("Upload failed: {0}")]
    Upload(String),
    /// Message send failed after retries
    #[error("Send failed: {0}")]
    Send(String),
    /// Group query failed
    #[error("Group query failed: {0}")]
    Group(String),
}

/// A document attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingDocument {
    /// Raw file content
    pub bytes: Vec<u8>,
    /// File name shown to the recipient
    pub file_name: String,
    /// MIME type of the content
    pub mime_type: String,
}

/// Inbound chat message, already unwrapped to plain text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Message id
    pub id: String,
    /// Chat JID (group or private)
    pub chat_id: String,
    /// Sender JID
    pub sender: String,
    /// Sender display name
    pub push_name: String,
    /// Message text or caption
    pub text: String,
    /// True for group chats
    pub is_group: bool,
    /// True for messages sent by the bot account itself
    pub is_from_me: bool,
}

/// Outbound messaging
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a text message
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), TransportError>;

    /// Send a document attachment
    async fn send_document(
        &self,
        chat_id: &str,
        document: OutgoingDocument,
    ) -> Result<(), TransportError>;

    /// Delete a message in a chat (requires admin rights in groups)
    async fn delete_message(
        &self,
        chat_id: &str,
        message_id: &str,
        sender: &str,
    ) -> Result<(), TransportError>;
}

/// Group administration
#[async_trait]
pub trait GroupAdmin: Send + Sync {
    /// Returns true if `user` is an admin of `group`
    async fn is_group_admin(&self, group: &str, user: &str) -> Result<bool, TransportError>;

    /// Remove `user` from `group`
    async fn remove_participant(&self, group: &str, user: &str) -> Result<(), TransportError>;
}
