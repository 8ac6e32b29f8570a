//! Endpoints of the dispatcher schema.

use crate::bot::commands::Command;
use crate::bot::delivery;
use crate::bot::dialogue::{BotDialogue, State, Toggle};
use crate::bot::error::BotError;
use crate::bot::keyboards;
use crate::bot::BotContext;
use crate::config::ColorMode;
use crate::pipeline::input;
use std::sync::Arc;
use std::time::Instant;
use teloxide::prelude::*;
use teloxide::types::{Document, UserId};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

pub type HandlerResult = Result<(), BotError>;

fn sender(msg: &Message) -> Option<UserId> {
    msg.from.as_ref().map(|u| u.id)
}

pub async fn start(
    bot: Bot,
    dialogue: BotDialogue,
    msg: Message,
    ctx: Arc<BotContext>,
) -> HandlerResult {
    if !ctx.access.can_convert(sender(&msg)) {
        bot.send_message(msg.chat.id, keyboards::NOT_ALLOWED_TEXT).await?;
        return Ok(());
    }
    bot.send_message(msg.chat.id, keyboards::WELCOME_TEXT)
        .reply_markup(keyboards::mode_keyboard())
        .await?;
    dialogue.update(State::ChoosingMode).await?;
    Ok(())
}

pub async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

pub async fn cancel(bot: Bot, dialogue: BotDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, keyboards::CANCELLED_TEXT).await?;
    dialogue.exit().await?;
    Ok(())
}

pub async fn stats(bot: Bot, msg: Message, ctx: Arc<BotContext>) -> HandlerResult {
    let text = if ctx.access.is_admin(sender(&msg)) {
        ctx.stats.snapshot().render()
    } else {
        keyboards::ADMIN_ONLY_TEXT.to_string()
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// `/ocr`, `/flip`, `/transparent`, `/images`, `/a4` and `/settings`.
pub async fn settings_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: State,
    ctx: Arc<BotContext>,
) -> HandlerResult {
    let chat_id = msg.chat.id;
    let (toggle, name) = match cmd {
        Command::Ocr => (Toggle::Ocr, "Text extraction / OCR"),
        Command::Flip => (Toggle::Flip, "Flip"),
        Command::Transparent => (Toggle::Transparent, "Transparent background"),
        Command::Images => (Toggle::Images, "Embedded image export"),
        Command::A4 => (Toggle::A4, "A4 print sheet"),
        _ => {
            let mode = match state {
                State::AwaitingPdf { mode } => Some(mode),
                _ => None,
            };
            let settings = ctx.settings.get(chat_id).await;
            bot.send_message(chat_id, keyboards::settings_text(mode, &settings))
                .await?;
            return Ok(());
        }
    };

    let enabled = ctx.settings.toggle(chat_id, toggle).await;
    let mut reply = keyboards::toggle_text(name, enabled);
    if toggle == Toggle::Ocr && enabled && !ctx.ocr_available {
        reply.push_str("\n\n");
        reply.push_str(keyboards::OCR_UNAVAILABLE_TEXT);
    }
    bot.send_message(chat_id, reply).await?;
    Ok(())
}

/// A typed reply while the mode keyboard is showing.
pub async fn receive_mode_text(bot: Bot, dialogue: BotDialogue, msg: Message) -> HandlerResult {
    match msg.text().and_then(keyboards::parse_mode_choice) {
        Some(mode) => choose_mode(&bot, &dialogue, mode).await,
        None => {
            bot.send_message(msg.chat.id, keyboards::CHOOSE_FIRST_TEXT)
                .reply_markup(keyboards::mode_keyboard())
                .await?;
            Ok(())
        }
    }
}

/// A press on one of the mode buttons.
pub async fn receive_mode_button(
    bot: Bot,
    dialogue: BotDialogue,
    state: State,
    q: CallbackQuery,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;

    // Buttons of an old keyboard are ignored once a PDF is being waited for
    // or the conversation has ended.
    if state != State::ChoosingMode {
        return Ok(());
    }
    if let Some(mode) = q.data.as_deref().and_then(keyboards::parse_mode_choice) {
        choose_mode(&bot, &dialogue, mode).await?;
    }
    Ok(())
}

async fn choose_mode(bot: &Bot, dialogue: &BotDialogue, mode: ColorMode) -> HandlerResult {
    bot.send_message(dialogue.chat_id(), keyboards::mode_chosen_text(mode))
        .await?;
    dialogue.update(State::AwaitingPdf { mode }).await?;
    Ok(())
}

/// Anything sent while a PDF is expected.
pub async fn receive_pdf(
    bot: Bot,
    dialogue: BotDialogue,
    mode: ColorMode,
    msg: Message,
    ctx: Arc<BotContext>,
) -> HandlerResult {
    let Some(document) = msg.document() else {
        bot.send_message(msg.chat.id, keyboards::NOT_A_DOCUMENT_TEXT)
            .await?;
        return Ok(());
    };
    convert_document(&bot, &dialogue, &msg, document, mode, &ctx).await
}

/// Messages outside a conversation. A PDF is converted in colour right away.
pub async fn receive_idle(
    bot: Bot,
    dialogue: BotDialogue,
    msg: Message,
    ctx: Arc<BotContext>,
) -> HandlerResult {
    match msg.document() {
        Some(document) => {
            convert_document(&bot, &dialogue, &msg, document, ColorMode::default(), &ctx).await
        }
        None => {
            bot.send_message(msg.chat.id, keyboards::IDLE_TEXT).await?;
            Ok(())
        }
    }
}

/// Validate an upload, run the job and report the outcome.
///
/// Uploads that fail the cheap checks (access, type, size) leave the dialogue
/// where it is so the user can simply send another file. Once a job has run,
/// successful or not, the conversation is over.
async fn convert_document(
    bot: &Bot,
    dialogue: &BotDialogue,
    msg: &Message,
    document: &Document,
    mode: ColorMode,
    ctx: &BotContext,
) -> HandlerResult {
    let chat_id = msg.chat.id;

    if !ctx.access.can_convert(sender(msg)) {
        bot.send_message(chat_id, keyboards::NOT_ALLOWED_TEXT).await?;
        return Ok(());
    }

    let mime = document.mime_type.as_ref().map(|m| m.essence_str());
    let file_name = document.file_name.as_deref();
    if !input::is_pdf_document(mime, file_name) {
        bot.send_message(chat_id, keyboards::NOT_A_PDF_TEXT).await?;
        return Ok(());
    }

    if let Err(e) = delivery::check_size(u64::from(document.file.size), &ctx.config) {
        bot.send_message(chat_id, e.user_message()).await?;
        return Ok(());
    }

    ctx.stats.document_received();
    let started = Instant::now();
    info!(
        "chat {}: received '{}' ({} bytes, mode={})",
        chat_id,
        file_name.unwrap_or("<unnamed>"),
        document.file.size,
        mode
    );

    match delivery::run_job(bot, ctx, chat_id, document, mode).await {
        Ok(report) => {
            ctx.stats.conversion_finished(true);
            info!(
                "chat {}: sent {} files for {}/{} pages in {}ms",
                chat_id,
                report.files_sent,
                report.pages_sent,
                report.total_pages,
                started.elapsed().as_millis()
            );
            bot.send_message(chat_id, keyboards::DONE_TEXT).await?;
        }
        Err(e) => {
            ctx.stats.conversion_finished(false);
            match &e {
                BotError::Conversion(_) => warn!("chat {}: conversion failed: {}", chat_id, e),
                _ => error!("chat {}: job failed: {}", chat_id, e),
            }
            bot.send_message(chat_id, e.user_message()).await?;
        }
    }

    dialogue.exit().await?;
    Ok(())
}
