//! Slash commands understood by the bot.

use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "choose Color, Black or Both and convert a PDF.")]
    Start,
    #[command(description = "show this text.")]
    Help,
    #[command(description = "abort the current operation.")]
    Cancel,
    #[command(description = "toggle text extraction with OCR fallback.")]
    Ocr,
    #[command(description = "toggle mirroring pages horizontally.")]
    Flip,
    #[command(description = "toggle turning white backgrounds transparent.")]
    Transparent,
    #[command(description = "toggle exporting images embedded in the PDF.")]
    Images,
    #[command(description = "toggle the mirrored A4 print sheet.")]
    A4,
    #[command(description = "show the current conversion settings.")]
    Settings,
    #[command(description = "bot statistics (admins only).")]
    Stats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", "pdf2png_bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/ocr", "pdf2png_bot").unwrap(), Command::Ocr);
        assert_eq!(Command::parse("/a4", "pdf2png_bot").unwrap(), Command::A4);
        assert_eq!(
            Command::parse("/cancel@pdf2png_bot", "pdf2png_bot").unwrap(),
            Command::Cancel
        );
        assert!(Command::parse("/convert", "pdf2png_bot").is_err());
    }

    #[test]
    fn test_descriptions_list_every_command() {
        let text = Command::descriptions().to_string();
        for cmd in ["/start", "/help", "/cancel", "/ocr", "/flip", "/transparent", "/images", "/a4", "/settings", "/stats"] {
            assert!(text.contains(cmd), "missing {cmd} in:\n{text}");
        }
    }
}
