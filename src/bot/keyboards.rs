//! Inline keyboards and the texts the bot sends.

use crate::bot::dialogue::ChatSettings;
use crate::config::ColorMode;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

pub const WELCOME_TEXT: &str = "Hi! I am the PDF to PNG bot.\n\n\
I turn every page of a PDF into a PNG image. \
Please choose an option to start:";

pub const NOT_A_DOCUMENT_TEXT: &str =
    "It seems you sent something other than a document. Please upload a PDF file.";

pub const NOT_A_PDF_TEXT: &str = "⚠️ This is not a PDF file. Please send a correct PDF file only.";

pub const CHOOSE_FIRST_TEXT: &str = "Please choose Color, Black or Both using the buttons above.";

pub const IDLE_TEXT: &str = "Send me a PDF, or use /start to choose a colour mode first.";

pub const RECEIVED_TEXT: &str = "✅ PDF received. Processing has started, this might take a moment...";

pub const QUEUED_TEXT: &str = "⏳ Other documents are being converted right now. Yours is queued and will start shortly.";

pub const DONE_TEXT: &str = "All done! Use /start to process another file.";

pub const CANCELLED_TEXT: &str = "Operation cancelled.";

pub const NOT_ALLOWED_TEXT: &str = "Sorry, this bot is private.";

pub const ADMIN_ONLY_TEXT: &str = "This command is only available to the bot admins.";

pub const OCR_UNAVAILABLE_TEXT: &str =
    "Note: OCR is not installed on this server, so only text stored in the PDF itself can be extracted.";

/// `[Color] [Black] [Both]`
pub fn mode_keyboard() -> InlineKeyboardMarkup {
    let buttons = [ColorMode::Color, ColorMode::Black, ColorMode::Both]
        .map(|mode| InlineKeyboardButton::callback(mode_button_label(mode), mode.label()));
    InlineKeyboardMarkup::new([buttons])
}

fn mode_button_label(mode: ColorMode) -> &'static str {
    match mode {
        ColorMode::Color => "Color",
        ColorMode::Black => "Black",
        ColorMode::Both => "Both",
    }
}

/// Interpret a button payload or typed reply as a colour mode.
///
/// Only the three offered choices are accepted; the looser spellings the CLI
/// takes (`gray`, `bw`) are not advertised here.
pub fn parse_mode_choice(text: &str) -> Option<ColorMode> {
    match text.trim().to_lowercase().as_str() {
        "color" | "colour" => Some(ColorMode::Color),
        "black" => Some(ColorMode::Black),
        "both" => Some(ColorMode::Both),
        _ => None,
    }
}

pub fn mode_chosen_text(mode: ColorMode) -> String {
    format!(
        "Excellent! You chose \"{}\".\nNow, please upload your PDF file.",
        mode_button_label(mode)
    )
}

pub fn too_many_pages_text(total: usize, max: usize) -> String {
    format!("This PDF has {total} pages; only the first {max} will be converted.")
}

pub fn progress_text(done: usize, total: usize) -> String {
    format!("⚙️ Converting… page {done} of {total}")
}

pub fn partial_failure_text(failed: &[usize]) -> String {
    let pages: Vec<String> = failed.iter().map(|p| p.to_string()).collect();
    format!("⚠️ Some pages could not be converted: {}", pages.join(", "))
}

pub fn ocr_failure_text(failed: &[usize]) -> String {
    let pages: Vec<String> = failed.iter().map(|p| p.to_string()).collect();
    format!(
        "⚠️ OCR failed on page(s) {}; their text is missing from the .txt file.",
        pages.join(", ")
    )
}

pub fn toggle_text(name: &str, enabled: bool) -> String {
    format!("{name} is now {}.", on_off(enabled))
}

pub fn settings_text(mode: Option<ColorMode>, settings: &ChatSettings) -> String {
    let mode = mode.map(mode_button_label).unwrap_or("not chosen (Color by default)");
    format!(
        "Current settings:\n\
         • Mode: {mode}\n\
         • Text / OCR: {}\n\
         • Flip: {}\n\
         • Transparent background: {}\n\
         • Embedded images: {}\n\
         • A4 print sheet: {}",
        on_off(settings.ocr),
        on_off(settings.flip),
        on_off(settings.transparent),
        on_off(settings.images),
        on_off(settings.a4),
    )
}

fn on_off(v: bool) -> &'static str {
    if v {
        "on"
    } else {
        "off"
    }
}
