use std::sync::Arc;

use teloxide::prelude::*;

use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

const START_TEXT: &str = "Welcome! Send me a file to convert it to another format.\n\n\
Use /help to see available commands.";

const HELP_TEXT: &str = "This bot converts files using the Convertio API.\n\n\
Commands:\n\
/start - Start the bot\n\
/help - Show this help message\n\
/formats - Show available output formats\n\n\
How to use:\n\
1. Send a file\n\
2. Select the output format\n\
3. Wait for the conversion to complete\n\
4. Download your converted file";

const FORMATS_TEXT: &str = "Common formats:\n\
Documents: PDF, DOCX, DOC, ODT, RTF, TXT\n\
Images: JPG, PNG, GIF, BMP, TIFF, SVG\n\
Audio: MP3, WAV, OGG, FLAC, AAC\n\
Video: MP4, AVI, MOV, MKV, WEBM\n\
Archives: ZIP, RAR, 7Z, TAR\n\n\
For a complete list, visit: https://convertio.co/formats/";

pub async fn handle_command(bot: Bot, msg: Message, _state: Arc<AppState>) -> ResponseResult<()> {
    let (cmd, _args) = parse_command(msg.text().unwrap_or(""));

    let reply = match cmd.as_str() {
        "start" => START_TEXT,
        "help" => HELP_TEXT,
        "formats" => FORMATS_TEXT,
        _ => "Unknown command. Use /help to see available commands.",
    };

    let _ = bot.send_message(msg.chat.id, reply).await;
    Ok(())
}
