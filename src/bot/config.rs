use crate::bot::error::{BotError, Result};
use crate::config::OcrConfig;
use std::fmt;

/// Telegram's download limit for bots using the public Bot API.
pub const TELEGRAM_DOWNLOAD_LIMIT_MB: u64 = 20;

/// Runtime configuration of the bot.
#[derive(Clone)]
pub struct BotConfig {
    /// Bot token in the `123456:ABC-DEF...` format.
    pub token: String,
    /// Telegram user ids allowed to run admin commands.
    pub admin_ids: Vec<u64>,
    /// When false only admins may convert documents.
    pub public: bool,
    /// Largest accepted upload in megabytes.
    pub max_file_mb: u64,
    /// Pages converted per document; the rest are skipped.
    pub max_pages: usize,
    /// Conversions allowed to run at the same time.
    pub max_concurrent_jobs: usize,
    /// Render resolution.
    pub dpi: u32,
    /// Tesseract language(s) used when a chat turns OCR on.
    pub ocr_lang: String,
    /// Tesseract binary.
    pub tesseract_bin: String,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("admin_ids", &self.admin_ids)
            .field("public", &self.public)
            .field("max_file_mb", &self.max_file_mb)
            .field("max_pages", &self.max_pages)
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field("dpi", &self.dpi)
            .field("ocr_lang", &self.ocr_lang)
            .field("tesseract_bin", &self.tesseract_bin)
            .finish()
    }
}

impl BotConfig {
    /// Creates a new config with defaults for everything but the token.
    pub fn new(token: impl Into<String>) -> Self {
        let ocr = OcrConfig::default();
        Self {
            token: token.into(),
            admin_ids: Vec::new(),
            public: true,
            max_file_mb: TELEGRAM_DOWNLOAD_LIMIT_MB,
            max_pages: 50,
            max_concurrent_jobs: 2,
            dpi: 150,
            ocr_lang: ocr.language,
            tesseract_bin: ocr.binary,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Required:
    /// - `TELEGRAM_BOT_TOKEN`
    ///
    /// Optional:
    /// - `BOT_ADMIN_IDS` (comma/space separated ids, or a JSON array)
    /// - `BOT_PUBLIC` (`true`/`false`, default `true`)
    /// - `BOT_MAX_FILE_MB` (default 20)
    /// - `BOT_MAX_PAGES` (default 50)
    /// - `BOT_MAX_CONCURRENT_JOBS` (default 2)
    /// - `BOT_DPI` (default 150)
    /// - `BOT_OCR_LANG` (default `eng`)
    /// - `TESSERACT_BIN` (default `tesseract`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] but reading from an arbitrary source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = get("TELEGRAM_BOT_TOKEN")
            .ok_or_else(|| BotError::MissingSetting("TELEGRAM_BOT_TOKEN".to_string()))?;
        let mut config = Self::new(token.trim());

        if let Some(ids) = get("BOT_ADMIN_IDS") {
            config.admin_ids = parse_admin_ids(&ids)?;
        }
        if let Some(v) = get("BOT_PUBLIC") {
            config.public = parse_bool("BOT_PUBLIC", &v)?;
        }
        if let Some(v) = get("BOT_MAX_FILE_MB") {
            config.max_file_mb = parse_number("BOT_MAX_FILE_MB", &v)?;
        }
        if let Some(v) = get("BOT_MAX_PAGES") {
            config.max_pages = parse_number("BOT_MAX_PAGES", &v)?;
        }
        if let Some(v) = get("BOT_MAX_CONCURRENT_JOBS") {
            config.max_concurrent_jobs = parse_number("BOT_MAX_CONCURRENT_JOBS", &v)?;
        }
        if let Some(v) = get("BOT_DPI") {
            config.dpi = parse_number("BOT_DPI", &v)?;
        }
        if let Some(v) = get("BOT_OCR_LANG").filter(|v| !v.trim().is_empty()) {
            config.ocr_lang = v.trim().to_string();
        }
        if let Some(v) = get("TESSERACT_BIN").filter(|v| !v.trim().is_empty()) {
            config.tesseract_bin = v.trim().to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_admin_ids(mut self, ids: Vec<u64>) -> Self {
        self.admin_ids = ids;
        self
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(BotError::Config("Bot token cannot be empty".to_string()));
        }
        if !self.token.contains(':') {
            return Err(BotError::Config(
                "Bot token format is invalid (should contain ':')".to_string(),
            ));
        }
        if self.max_file_mb == 0 || self.max_file_mb > TELEGRAM_DOWNLOAD_LIMIT_MB {
            return Err(BotError::Config(format!(
                "BOT_MAX_FILE_MB must be 1–{TELEGRAM_DOWNLOAD_LIMIT_MB}, got {}",
                self.max_file_mb
            )));
        }
        if self.max_pages == 0 {
            return Err(BotError::Config("BOT_MAX_PAGES must be ≥ 1".to_string()));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(BotError::Config(
                "BOT_MAX_CONCURRENT_JOBS must be ≥ 1".to_string(),
            ));
        }
        if !(72..=400).contains(&self.dpi) {
            return Err(BotError::Config(format!(
                "BOT_DPI must be 72–400, got {}",
                self.dpi
            )));
        }
        if !self.public && self.admin_ids.is_empty() {
            return Err(BotError::Config(
                "BOT_PUBLIC=false needs at least one id in BOT_ADMIN_IDS".to_string(),
            ));
        }
        Ok(())
    }

    /// Upload limit in bytes.
    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_mb * 1024 * 1024
    }
}

/// Parse an admin id list: `"1, 2 3"` or `"[1, 2, 3]"`.
pub fn parse_admin_ids(raw: &str) -> Result<Vec<u64>> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        return serde_json::from_str(raw)
            .map_err(|e| BotError::Config(format!("BOT_ADMIN_IDS is not a JSON id list: {e}")));
    }
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| BotError::Config(format!("BOT_ADMIN_IDS: '{s}' is not a user id")))
        })
        .collect()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(BotError::Config(format!("{key}: '{other}' is not a boolean"))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| BotError::Config(format!("{key}: '{}' is not a number", raw.trim())))
}
