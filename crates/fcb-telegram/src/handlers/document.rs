use std::sync::Arc;

use teloxide::prelude::*;

use fcb_core::{
    domain::{ChatId, FileRef},
    formats::format_keyboard,
    session::PendingFile,
};

use crate::router::AppState;

pub async fn handle_document(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(doc) = msg.document() else {
        return Ok(());
    };
    let chat_id = ChatId(msg.chat.id.0);

    // Size gate before anything is stored or downloaded.
    if doc.file.size as u64 > state.cfg.max_file_size {
        let limit_mb = state.cfg.max_file_size / (1024 * 1024);
        let _ = bot
            .send_message(
                msg.chat.id,
                format!("File too large. Maximum size is {limit_mb}MB."),
            )
            .await;
        return Ok(());
    }

    let file_name = doc
        .file_name
        .clone()
        .unwrap_or_else(|| "document".to_string());

    // A new upload replaces whatever the chat had pending.
    state
        .sessions
        .set_pending_file(
            chat_id,
            PendingFile {
                file: FileRef(doc.file.id.clone()),
                file_name: file_name.clone(),
            },
        )
        .await;

    let text = format!("I received your file: {file_name}\nNow, select the output format:");
    let _ = state
        .messenger
        .send_inline_keyboard(chat_id, &text, format_keyboard())
        .await;

    Ok(())
}
