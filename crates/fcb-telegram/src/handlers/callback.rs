use std::sync::Arc;

use teloxide::prelude::*;

use fcb_core::{
    config::is_authorized,
    domain::ChatId,
    formats::{normalize_format, parse_format_callback, OTHER_FORMAT_SENTINEL},
};

use crate::handlers::start_conversion;
use crate::router::AppState;

const ASK_FORMAT_TEXT: &str = "Please enter the output format (e.g., pdf, docx, jpg):";

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let data = q.data.clone().unwrap_or_default();
    let chat = q.message.as_ref().map(|m| m.chat.id.0);

    let Some(chat) = chat else {
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    };

    if !is_authorized(Some(q.from.id.0 as i64), &state.cfg.telegram_allowed_users) {
        let _ = bot
            .answer_callback_query(cb_id)
            .text("Unauthorized".to_string())
            .await;
        return Ok(());
    }

    let Some(choice) = parse_format_callback(&data) else {
        // Stale or foreign button; just dismiss the spinner.
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    };

    let _ = state.messenger.answer_callback_query(&cb_id, None).await;
    let chat_id = ChatId(chat);

    if choice == OTHER_FORMAT_SENTINEL {
        state.sessions.set_awaiting_format(chat_id, true).await;
        let _ = state.messenger.send_text(chat_id, ASK_FORMAT_TEXT).await;
        return Ok(());
    }

    start_conversion(state, chat_id, normalize_format(choice)).await;
    Ok(())
}
