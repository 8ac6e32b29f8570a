//! Who may use the bot.

use crate::bot::config::BotConfig;
use std::collections::HashSet;
use teloxide::types::UserId;

/// Access policy derived from [`BotConfig`].
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    admins: HashSet<u64>,
    public: bool,
}

impl AccessPolicy {
    pub fn new(admin_ids: impl IntoIterator<Item = u64>, public: bool) -> Self {
        Self {
            admins: admin_ids.into_iter().collect(),
            public,
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(config.admin_ids.iter().copied(), config.public)
    }

    /// Returns `true` if the user may run admin commands.
    pub fn is_admin(&self, user: Option<UserId>) -> bool {
        user.is_some_and(|u| self.admins.contains(&u.0))
    }

    /// Returns `true` if the user may convert documents.
    ///
    /// Anonymous senders (channel posts, anonymous group admins) are only
    /// served by a public bot.
    pub fn can_convert(&self, user: Option<UserId>) -> bool {
        self.public || self.is_admin(user)
    }
}
