//! Telegram front-end.
//!
//! Built on teloxide's dispatcher: updates are routed through a dptree
//! [`schema`] into the endpoints in [`handlers`], with per-chat dialogue state
//! kept in memory. The dispatcher already serialises updates per chat and runs
//! different chats concurrently; a semaphore in [`BotContext`] caps how many
//! conversions run at once.

pub mod access;
pub mod commands;
pub mod config;
pub mod delivery;
pub mod dialogue;
pub mod error;
pub mod handlers;
pub mod keyboards;
pub mod stats;

pub use config::BotConfig;
pub use error::BotError;

use crate::pipeline::ocr;
use access::AccessPolicy;
use commands::Command;
use dialogue::{SettingsStore, State};
use stats::BotStats;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{dialogue as td, UpdateHandler};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Shared state handed to every handler.
#[derive(Debug)]
pub struct BotContext {
    pub config: BotConfig,
    pub access: AccessPolicy,
    pub stats: BotStats,
    pub settings: SettingsStore,
    /// One permit per conversion allowed to run.
    pub jobs: Arc<Semaphore>,
    /// Whether the tesseract binary answered at start-up.
    pub ocr_available: bool,
}

impl BotContext {
    pub fn new(config: BotConfig, ocr_available: bool) -> Self {
        Self {
            access: AccessPolicy::from_config(&config),
            jobs: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            stats: BotStats::default(),
            settings: SettingsStore::default(),
            ocr_available,
            config,
        }
    }
}

/// The dptree routing table.
pub fn schema() -> UpdateHandler<BotError> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handlers::start))
        .branch(case![Command::Help].endpoint(handlers::help))
        .branch(case![Command::Cancel].endpoint(handlers::cancel))
        .branch(case![Command::Stats].endpoint(handlers::stats))
        .branch(dptree::endpoint(handlers::settings_command));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(case![State::ChoosingMode].endpoint(handlers::receive_mode_text))
        .branch(case![State::AwaitingPdf { mode }].endpoint(handlers::receive_pdf))
        .branch(case![State::Start].endpoint(handlers::receive_idle));

    let callback_handler = Update::filter_callback_query().endpoint(handlers::receive_mode_button);

    td::enter::<Update, InMemStorage<State>, State, _>()
        .branch(message_handler)
        .branch(callback_handler)
}

/// Connect to Telegram and serve updates until Ctrl-C.
pub async fn run(config: BotConfig) -> Result<(), BotError> {
    config.validate()?;

    // Fail at start-up rather than on the first upload.
    crate::pdfium::bind()?;

    let ocr_available = ocr::detect_version(&config.tesseract_bin).await.is_some();
    if !ocr_available {
        warn!(
            "tesseract ('{}') not found; /ocr will only read PDF text layers",
            config.tesseract_bin
        );
    }

    let bot = Bot::new(&config.token);
    let me = bot.get_me().await?;
    bot.set_my_commands(Command::bot_commands()).await?;
    info!(
        "Starting bot @{} (public={}, admins={}, max_pages={}, jobs={})",
        me.username(),
        config.public,
        config.admin_ids.len(),
        config.max_pages,
        config.max_concurrent_jobs
    );

    let ctx = Arc::new(BotContext::new(config, ocr_available));

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![InMemStorage::<State>::new(), ctx])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_from_config() {
        let config = BotConfig::new("1:x").with_admin_ids(vec![5]);
        let ctx = BotContext::new(config, false);
        assert_eq!(ctx.jobs.available_permits(), 2);
        assert!(ctx.access.is_admin(Some(UserId(5))));
        assert!(!ctx.ocr_available);
    }

    #[test]
    fn test_schema_builds() {
        let _ = schema();
    }
}
