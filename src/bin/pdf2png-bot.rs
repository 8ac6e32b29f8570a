//! CLI binary for pdf2png-bot.
//!
//! `run` starts the Telegram bot; `convert` and `inspect` expose the same
//! conversion pipeline on the command line.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2png_bot::bot::{self, BotConfig};
use pdf2png_bot::{
    convert_to_dir, inspect, ColorMode, ConversionConfig, ConversionProgressCallback, OcrConfig,
    PageSelection, PageSeparator, ProgressCallback,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar with one log line per finished page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, png_bytes: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{:>6} KiB", png_bytes / 1024)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_pages.saturating_sub(success_count);
        if failed == 0 {
            eprintln!(
                "{} {} pages rendered",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages rendered  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Start the Telegram bot (token from TELEGRAM_BOT_TOKEN or .env)
  pdf2png-bot run

  # Render every page in colour into ./out
  pdf2png-bot convert document.pdf -o out

  # Pages 1-5, colour and grayscale, mirrored
  pdf2png-bot convert --pages 1-5 --mode both --flip scan.pdf -o out

  # Extract text, falling back to OCR on scanned pages
  pdf2png-bot convert --text --ocr --ocr-lang eng+amh scan.pdf -o out

  # Convert from URL
  pdf2png-bot convert https://arxiv.org/pdf/1706.03762 -o attention

  # Metadata only
  pdf2png-bot inspect --json document.pdf

ENVIRONMENT VARIABLES:
  TELEGRAM_BOT_TOKEN       Bot token (required by `run`)
  BOT_ADMIN_IDS            Admin user ids: "1,2,3" or "[1,2,3]"
  BOT_PUBLIC               false = only admins may convert (default true)
  BOT_MAX_FILE_MB          Upload limit in MB, at most 20 (default 20)
  BOT_MAX_PAGES            Pages converted per document (default 50)
  BOT_MAX_CONCURRENT_JOBS  Conversions running at once (default 2)
  BOT_DPI                  Render resolution for the bot (default 150)
  BOT_OCR_LANG             Tesseract language(s) (default eng)
  TESSERACT_BIN            Tesseract binary (default tesseract)
  PDFIUM_LIB_PATH          Path to libpdfium, or the directory holding it
  RUST_LOG                 Overrides the log filter
"#;

/// Convert PDF documents to PNG images, on the command line or over Telegram.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2png-bot",
    version,
    about = "Convert PDF documents to PNG images, on the command line or as a Telegram bot",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2PNG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2PNG_QUIET", conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the Telegram bot (long polling until Ctrl-C).
    Run,
    /// Render a PDF into a directory of PNG files.
    Convert(ConvertArgs),
    /// Print PDF metadata without rendering.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Output directory.
    #[arg(short, long, env = "PDF2PNG_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2PNG_PAGES", default_value = "all")]
    pages: String,

    /// Colour mode: color, black, or both.
    #[arg(short, long, env = "PDF2PNG_MODE", default_value = "color")]
    mode: String,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2PNG_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Mirror every page horizontally.
    #[arg(long)]
    flip: bool,

    /// Turn near-white pixels transparent.
    #[arg(long)]
    transparent: bool,

    /// Write the PDF text layer to <stem>.txt.
    #[arg(long)]
    text: bool,

    /// OCR pages without a text layer (implies --text).
    #[arg(long)]
    ocr: bool,

    /// Tesseract language(s), e.g. eng or eng+amh.
    #[arg(long, env = "BOT_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Tesseract binary.
    #[arg(long, env = "TESSERACT_BIN", default_value = "tesseract")]
    tesseract: String,

    /// Also export images embedded in each page.
    #[arg(long)]
    images: bool,

    /// Also write a mirrored A4 print sheet per page (<stem>_p001_color_a4.png).
    #[arg(long)]
    a4: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PNG_PASSWORD")]
    password: Option<String>,

    /// Text page separator: none, rule, header, or a custom string.
    #[arg(long, default_value = "header")]
    separator: String,

    /// HTTP download timeout in seconds.
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Print metadata as JSON.
    #[arg(long)]
    json: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2PNG_PASSWORD")]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let show_progress = match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.no_progress,
        _ => false,
    };
    init_tracing(&cli, show_progress);

    match cli.command {
        Command::Run => run_bot().await,
        Command::Convert(ref args) => run_convert(args, cli.quiet, show_progress).await,
        Command::Inspect(ref args) => run_inspect(args).await,
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the flags.
fn init_tracing(cli: &Cli, show_progress: bool) {
    // The progress bar already reports per-page results.
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{level},teloxide=warn"))),
        )
        .with_writer(io::stderr)
        .init();
}

async fn run_bot() -> Result<()> {
    // A missing .env is fine; real environment variables still apply.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to read .env");
        }
    }
    let config = BotConfig::from_env().context("Invalid bot configuration")?;
    bot::run(config).await.context("Bot stopped with an error")
}

async fn run_convert(args: &ConvertArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress)?;

    let stats = convert_to_dir(&args.input, &args.output, &config)
        .await
        .context("Conversion failed")?;

    if !quiet {
        eprintln!(
            "{}  {}/{} pages  {} files  {}  {}ms  →  {}",
            if stats.failed_pages == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.rendered_pages,
            stats.selected_pages,
            stats.images_produced,
            dim(&format!("{} KiB", stats.png_bytes / 1024)),
            stats.total_duration_ms,
            bold(&args.output.display().to_string()),
        );
        if stats.ocr_pages > 0 {
            eprintln!("   {} pages read with OCR", dim(&stats.ocr_pages.to_string()));
        }
        if stats.ocr_failed_pages > 0 {
            eprintln!(
                "   {} pages failed OCR (see the log for details)",
                red(&stats.ocr_failed_pages.to_string())
            );
        }
    }
    Ok(())
}

async fn run_inspect(args: &InspectArgs) -> Result<()> {
    let meta = inspect(&args.input, args.password.as_deref())
        .await
        .context("Failed to inspect PDF")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    println!("File:         {}", args.input);
    let fields = [
        ("Title", &meta.title),
        ("Author", &meta.author),
        ("Subject", &meta.subject),
    ];
    for (label, value) in fields {
        if let Some(v) = value {
            println!("{:<14}{}", format!("{label}:"), v);
        }
    }
    println!("Pages:        {}", meta.page_count);
    println!("PDF Version:  {}", meta.pdf_version);
    let fields = [
        ("Producer", &meta.producer),
        ("Creator", &meta.creator),
        ("Created", &meta.creation_date),
        ("Modified", &meta.modification_date),
    ];
    for (label, value) in fields {
        if let Some(v) = value {
            println!("{:<14}{}", format!("{label}:"), v);
        }
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(args: &ConvertArgs, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let pages: PageSelection = args.pages.parse().context("Invalid --pages")?;
    let mode: ColorMode = args.mode.parse().context("Invalid --mode")?;
    let separator: PageSeparator = match args.separator.parse() {
        Ok(sep) => sep,
        Err(never) => match never {},
    };

    let mut builder = ConversionConfig::builder()
        .dpi(args.dpi)
        .pages(pages)
        .mode(mode)
        .flip(args.flip)
        .transparent_background(args.transparent)
        .extract_text(args.text || args.ocr)
        .ocr(OcrConfig {
            enabled: args.ocr,
            language: args.ocr_lang.clone(),
            binary: args.tesseract.clone(),
            ..OcrConfig::default()
        })
        .extract_images(args.images)
        .print_sheet(args.a4)
        .page_separator(separator)
        .download_timeout_secs(args.download_timeout);

    if let Some(ref password) = args.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
