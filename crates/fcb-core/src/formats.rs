//! Output-format helpers: normalization, filename rewriting, and the
//! format-selection keyboard.

use crate::messaging::types::{InlineButton, InlineKeyboard};

/// Formats offered as one-tap buttons. Everything else goes through the
/// "Other format" free-text path.
pub const COMMON_FORMATS: &[&str] = &["pdf", "docx", "jpg", "png", "mp3", "mp4", "txt", "xlsx"];

pub const FORMAT_CALLBACK_PREFIX: &str = "format_";
pub const OTHER_FORMAT_SENTINEL: &str = "other";

const BUTTONS_PER_ROW: usize = 4;

/// Normalize a user-supplied format: trim, lowercase, strip a leading dot.
pub fn normalize_format(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_lowercase()
}

/// Replace the original extension with the output format.
///
/// The extension is only stripped when the name has a non-empty stem and a
/// non-empty extension, so `photo` becomes `photo.png` and `.env` becomes
/// `.env.pdf` rather than losing the whole name.
pub fn output_file_name(original: &str, output_format: &str) -> String {
    if let Some((stem, ext)) = original.rsplit_once('.') {
        if !stem.is_empty() && !ext.is_empty() {
            return format!("{stem}.{output_format}");
        }
    }
    format!("{original}.{output_format}")
}

/// The callback payload for a format button.
pub fn format_callback_data(format: &str) -> String {
    format!("{FORMAT_CALLBACK_PREFIX}{format}")
}

/// Parse a button payload back into a format choice. Returns `None` for
/// payloads that are not format selections.
pub fn parse_format_callback(data: &str) -> Option<&str> {
    data.strip_prefix(FORMAT_CALLBACK_PREFIX)
}

/// The format-selection keyboard: common formats in rows of four plus a
/// full-width "other" row.
pub fn format_keyboard() -> InlineKeyboard {
    let buttons = COMMON_FORMATS
        .iter()
        .map(|fmt| InlineButton::new(fmt.to_uppercase(), format_callback_data(fmt)))
        .collect();

    InlineKeyboard::grid(buttons, BUTTONS_PER_ROW).with_row(InlineButton::new(
        "Other format (type manually)",
        format_callback_data(OTHER_FORMAT_SENTINEL),
    ))
}
