use async_trait::async_trait;

use crate::{
    domain::{ChatId, FileRef, MessageRef},
    messaging::types::InlineKeyboard,
    Result,
};

/// Cross-messenger port.
///
/// Telegram is the first implementation; the shape is designed so another
/// platform adapter could fit behind the same interface.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;
    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()>;

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;

    /// Fetch the raw bytes of a platform-held file.
    async fn download_file(&self, file: &FileRef) -> Result<Vec<u8>>;

    /// Deliver bytes as a file attachment with the given filename.
    async fn send_document(
        &self,
        chat_id: ChatId,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<MessageRef>;
}
