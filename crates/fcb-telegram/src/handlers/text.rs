use std::sync::Arc;

use teloxide::prelude::*;

use fcb_core::{domain::ChatId, formats::normalize_format};

use crate::handlers::start_conversion;
use crate::router::AppState;

pub async fn handle_text(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = ChatId(msg.chat.id.0);

    if state.sessions.take_awaiting_format(chat_id).await {
        let format = normalize_format(text);
        if format.is_empty() {
            // Keep waiting rather than burning the prompt on a blank message.
            state.sessions.set_awaiting_format(chat_id, true).await;
            let _ = bot
                .send_message(msg.chat.id, "Please enter the output format (e.g., pdf, docx, jpg):")
                .await;
            return Ok(());
        }

        start_conversion(state, chat_id, format).await;
        return Ok(());
    }

    let _ = bot
        .send_message(
            msg.chat.id,
            "Please send me a file to convert or use /help to see available commands.",
        )
        .await;

    Ok(())
}
