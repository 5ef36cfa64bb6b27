//! Telegram update handlers.
//!
//! Each handler validates auth, translates the update into core types and
//! drives the session store / conversion service.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use fcb_core::{
    config::is_authorized,
    convert::ConvertRequest,
    domain::ChatId,
};

use crate::router::AppState;

mod callback;
mod commands;
mod document;
mod text;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| u.id.0 as i64);

    if !is_authorized(user_id, &state.cfg.telegram_allowed_users) {
        let _ = bot
            .send_message(
                msg.chat.id,
                "Unauthorized. Contact the bot owner for access.",
            )
            .await;
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(bot, msg, state).await;
        }
        return text::handle_text(bot, msg, state).await;
    }

    if msg.document().is_some() {
        return document::handle_document(bot, msg, state).await;
    }

    // Photos, stickers, voice notes: not convertible through this bot.
    let _ = bot
        .send_message(
            msg.chat.id,
            "Please send me a file as a document to convert it.",
        )
        .await;

    Ok(())
}

/// Shared entry point for both format-selection paths (button and free text).
///
/// Requires a pending file; its absence is a user error, reported inline with
/// session state untouched. The chat lock keeps a chat at one conversion at a
/// time; the request works on an owned copy of the pending file, so a new
/// upload arriving mid-conversion cannot corrupt this run.
pub(crate) async fn start_conversion(state: Arc<AppState>, chat_id: ChatId, output_format: String) {
    let _ = state
        .messenger
        .send_text(
            chat_id,
            &format!("Converting to {}...", output_format.to_uppercase()),
        )
        .await;

    let Some(file) = state.sessions.pending_file(chat_id).await else {
        let _ = state
            .messenger
            .send_text(chat_id, "Please send a file first.")
            .await;
        return;
    };

    let _guard = state.chat_locks.lock_chat(chat_id.0).await;

    let req = ConvertRequest {
        chat_id,
        file,
        output_format,
    };

    // run() already reported the outcome to the user; the error is for logs.
    if let Err(e) = state.converter.run(state.messenger.as_ref(), req).await {
        tracing::debug!(chat = chat_id.0, error = %e, "conversion request ended with error");
    }
}
