//! Running a conversion job for a chat: download, convert, send.
//!
//! A job owns a private `TempDir`; the downloaded PDF and every intermediate
//! file live there and vanish when the job ends, whether it succeeded,
//! failed or panicked. Rendered pages are never written to disk: each PNG goes
//! from the page stream straight into `send_document`.
//!
//! Every file and notice is sent through [`retry_after`]: when Telegram
//! answers 429 the call sleeps for the requested time and tries again, so a
//! long document does not die halfway through on flood control.

use crate::bot::config::BotConfig;
use crate::bot::dialogue::ChatSettings;
use crate::bot::error::{BotError, Result};
use crate::bot::keyboards;
use crate::bot::BotContext;
use crate::config::{ColorMode, ConversionConfig, OcrConfig};
use crate::error::Pdf2PngError;
use crate::output::PageText;
use crate::pipeline::{input, text};
use crate::stream::{self, sanitize_stem};
use futures::StreamExt;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::requests::Request;
use teloxide::types::{Document, InputFile};
use teloxide::RequestError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Tries per Bot API call while Telegram keeps answering "retry after".
pub const MAX_SEND_ATTEMPTS: u32 = 4;

/// Minimum gap between two edits of the progress message.
pub const PROGRESS_EDIT_INTERVAL: Duration = Duration::from_secs(2);

/// What a finished job delivered.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub total_pages: usize,
    pub pages_sent: usize,
    pub files_sent: usize,
    pub bytes_sent: usize,
    /// 1-based pages that failed to render.
    pub failed_pages: Vec<usize>,
    /// 1-based pages whose OCR failed; their images were still sent.
    pub ocr_failed_pages: Vec<usize>,
    pub text_sent: bool,
}

/// Reject uploads the Bot API would refuse to hand us anyway.
pub fn check_size(size: u64, config: &BotConfig) -> Result<()> {
    let limit = config.max_file_bytes();
    if size > limit {
        Err(BotError::FileTooLarge { size, limit })
    } else {
        Ok(())
    }
}

/// Build the conversion settings for one job.
pub fn job_config(
    config: &BotConfig,
    settings: ChatSettings,
    mode: ColorMode,
    ocr_available: bool,
) -> std::result::Result<ConversionConfig, Pdf2PngError> {
    ConversionConfig::builder()
        .dpi(config.dpi)
        .max_pages(Some(config.max_pages))
        .mode(mode)
        .flip(settings.flip)
        .transparent_background(settings.transparent)
        .extract_text(settings.ocr)
        .ocr(OcrConfig {
            enabled: settings.ocr && ocr_available,
            language: config.ocr_lang.clone(),
            binary: config.tesseract_bin.clone(),
            ..OcrConfig::default()
        })
        .extract_images(settings.images)
        .print_sheet(settings.a4)
        .build()
}

/// Name of the uploaded file without extension, made safe for output names.
pub fn upload_stem(file_name: Option<&str>) -> String {
    let stem = file_name
        .map(Path::new)
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_stem(&stem)
}

/// Download, convert and deliver one PDF.
pub async fn run_job(
    bot: &Bot,
    ctx: &BotContext,
    chat_id: ChatId,
    document: &Document,
    mode: ColorMode,
) -> Result<JobReport> {
    let _permit = match ctx.jobs.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            bot.send_message(chat_id, keyboards::QUEUED_TEXT).await?;
            ctx.jobs
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Pdf2PngError::Internal("job queue closed".to_string()))?
        }
    };
    let _active = ctx.stats.job_started();

    bot.send_message(chat_id, keyboards::RECEIVED_TEXT).await?;

    let workdir = tempfile::Builder::new().prefix("pdf2png-job-").tempdir()?;
    let stem = upload_stem(document.file_name.as_deref());
    let pdf_path = workdir.path().join(format!("{stem}.pdf"));

    let file = bot.get_file(document.file.id.clone()).await?;
    let mut dst = tokio::fs::File::create(&pdf_path).await?;
    bot.download_file(&file.path, &mut dst).await?;
    dst.flush().await?;
    drop(dst);
    debug!("Downloaded {} to {}", file.path, pdf_path.display());

    ensure_pdf_magic(&pdf_path).await?;

    let settings = ctx.settings.get(chat_id).await;
    let config = job_config(&ctx.config, settings, mode, ctx.ocr_available)?;
    let mut conversion = stream::convert_stream_from_path(&pdf_path, &config).await?;

    let total = conversion.selected_pages.len();
    let mut report = JobReport {
        total_pages: conversion.metadata.page_count,
        ..JobReport::default()
    };
    info!(
        "chat {}: converting {} of {} pages ({})",
        chat_id, total, report.total_pages, mode
    );
    if report.total_pages > total {
        bot.send_message(chat_id, keyboards::too_many_pages_text(report.total_pages, total))
            .await?;
    }

    let status = bot
        .send_message(chat_id, keyboards::progress_text(0, total))
        .await?;

    let mut texts: Vec<PageText> = Vec::new();
    let mut first_error = None;
    let mut done = 0;
    let mut last_edit = Instant::now();
    while let Some(page) = conversion.pages.next().await {
        done += 1;
        match page {
            Ok(page) => {
                if page.ocr_failed() {
                    report.ocr_failed_pages.push(page.page_num);
                }
                let page_bytes = page.png_bytes();
                for img in page.images {
                    send_png(bot, chat_id, img.file_name, img.png).await?;
                    report.files_sent += 1;
                }
                for img in page.embedded {
                    send_png(bot, chat_id, img.file_name, img.png).await?;
                    report.files_sent += 1;
                }
                ctx.stats.page_sent(page_bytes);
                report.bytes_sent += page_bytes;
                report.pages_sent += 1;
                texts.extend(page.text);
            }
            Err(e) => {
                report.failed_pages.push(e.page());
                first_error.get_or_insert_with(|| e.to_string());
            }
        }

        if done < total && last_edit.elapsed() < PROGRESS_EDIT_INTERVAL {
            continue;
        }
        last_edit = Instant::now();
        // progress edits are cosmetic; errors here never fail the job
        if let Err(e) = bot
            .edit_message_text(chat_id, status.id, keyboards::progress_text(done, total))
            .await
        {
            debug!("Could not update progress message: {}", e);
        }
    }

    if report.pages_sent == 0 {
        return Err(Pdf2PngError::AllPagesFailed {
            total,
            first_error: first_error.unwrap_or_else(|| "no page produced output".to_string()),
        }
        .into());
    }

    if !texts.is_empty() {
        let body = text::assemble_text(&texts, &config.page_separator).into_bytes();
        let len = body.len();
        let file = InputFile::memory(body).file_name(format!("{stem}.txt"));
        retry_after(|| bot.send_document(chat_id, file.clone()).send()).await?;
        ctx.stats.bytes_sent(len);
        report.bytes_sent += len;
        report.files_sent += 1;
        report.text_sent = true;
    }

    if !report.failed_pages.is_empty() {
        let notice = keyboards::partial_failure_text(&report.failed_pages);
        retry_after(|| bot.send_message(chat_id, notice.clone()).send()).await?;
    }
    if !report.ocr_failed_pages.is_empty() {
        let notice = keyboards::ocr_failure_text(&report.ocr_failed_pages);
        retry_after(|| bot.send_message(chat_id, notice.clone()).send()).await?;
    }

    Ok(report)
}

/// Run a Bot API call, waiting out Telegram's flood control.
///
/// `RetryAfter` answers are retried up to [`MAX_SEND_ATTEMPTS`] times in
/// total; any other outcome is returned as is.
pub async fn retry_after<T, F, Fut>(mut call: F) -> std::result::Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RequestError>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Err(RequestError::RetryAfter(wait)) if attempt < MAX_SEND_ATTEMPTS => {
                warn!(
                    "Telegram flood control: retrying in {}s (attempt {}/{})",
                    wait.seconds(),
                    attempt,
                    MAX_SEND_ATTEMPTS
                );
                tokio::time::sleep(wait.duration()).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

async fn send_png(bot: &Bot, chat_id: ChatId, file_name: String, png: Vec<u8>) -> Result<()> {
    let file = InputFile::memory(png).file_name(file_name);
    retry_after(|| bot.send_document(chat_id, file.clone()).send()).await?;
    Ok(())
}

/// Check the downloaded file really is a PDF before handing it to pdfium.
async fn ensure_pdf_magic(path: &Path) -> Result<()> {
    let mut head = Vec::with_capacity(input::PDF_MAGIC.len());
    tokio::fs::File::open(path)
        .await?
        .take(input::PDF_MAGIC.len() as u64)
        .read_to_end(&mut head)
        .await?;
    input::validate_pdf_bytes(&head, path)?;
    Ok(())
}
