use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use crypto_payment_engine::{Attachment, Notifier, NotifierError};
use log::*;

/// A [`Notifier`] for running the engine without a chat front end. Messages are written to the log instead of being
/// delivered.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    next_message_id: Arc<AtomicI64>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for LogNotifier {
    async fn send(&self, chat_id: i64, text: &str, attachments: &[Attachment]) -> Result<i64, NotifierError> {
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        info!("📬️ [chat {chat_id}, message {message_id}] {text}");
        for attachment in attachments {
            let size = attachment.content.len();
            info!("📬️ [chat {chat_id}, message {message_id}] Attached {} ({size} bytes)", attachment.file_name);
        }
        Ok(message_id)
    }

    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<(), NotifierError> {
        info!("📬️ [chat {chat_id}] Message {message_id} retracted");
        Ok(())
    }
}
