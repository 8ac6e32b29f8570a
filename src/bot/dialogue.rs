//! Per-chat conversation state.
//!
//! ```text
//! Start ──/start──▶ ChoosingMode ──choice──▶ AwaitingPdf { mode } ──PDF──▶ Start
//!   ▲                    │                          │
//!   └──────/cancel───────┴──────────────────────────┘
//! ```

use crate::config::ColorMode;
use std::collections::HashMap;
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::types::ChatId;
use tokio::sync::RwLock;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Start,
    ChoosingMode,
    AwaitingPdf {
        mode: ColorMode,
    },
}

pub type BotDialogue = Dialogue<State, InMemStorage<State>>;

/// Conversion options a chat has toggled with slash commands.
///
/// Settings outlive a single conversation; `/cancel` does not reset them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChatSettings {
    /// Extract text (text layer, then OCR) and send it as a `.txt` file.
    pub ocr: bool,
    pub flip: bool,
    pub transparent: bool,
    /// Also send the images embedded in each page.
    pub images: bool,
    /// Also send a mirrored A4 print sheet of every page.
    pub a4: bool,
}

/// Which [`ChatSettings`] flag a command toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    Ocr,
    Flip,
    Transparent,
    Images,
    A4,
}

impl ChatSettings {
    /// Flip one flag and return its new value.
    pub fn toggle(&mut self, which: Toggle) -> bool {
        let flag = match which {
            Toggle::Ocr => &mut self.ocr,
            Toggle::Flip => &mut self.flip,
            Toggle::Transparent => &mut self.transparent,
            Toggle::Images => &mut self.images,
            Toggle::A4 => &mut self.a4,
        };
        *flag = !*flag;
        *flag
    }
}

/// In-memory settings of every chat.
#[derive(Debug, Default)]
pub struct SettingsStore {
    chats: RwLock<HashMap<ChatId, ChatSettings>>,
}

impl SettingsStore {
    pub async fn get(&self, chat: ChatId) -> ChatSettings {
        self.chats.read().await.get(&chat).copied().unwrap_or_default()
    }

    pub async fn toggle(&self, chat: ChatId, which: Toggle) -> bool {
        self.chats.write().await.entry(chat).or_default().toggle(which)
    }
}
