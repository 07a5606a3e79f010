use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    #[error("Could not deliver message to chat {chat_id}. {reason}")]
    SendFailed { chat_id: i64, reason: String },
    #[error("Could not delete message {message_id} in chat {chat_id}. {reason}")]
    DeleteFailed { chat_id: i64, message_id: i64, reason: String },
}

/// A file sent along with a message, such as the QR code of a payment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn new<S: Into<String>>(file_name: S, content: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), content }
    }
}

/// The messaging collaborator. The engine uses it to deliver paid orders and to retract payment requests that are no
/// longer valid. Failures are never fatal to the engine; they are logged and the operation carries on.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    /// Send `text` to the given chat, with any attachments. Returns the id of the sent message.
    async fn send(&self, chat_id: i64, text: &str, attachments: &[Attachment]) -> Result<i64, NotifierError>;

    /// Delete a previously sent message.
    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<(), NotifierError>;
}
