use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};

use fcb_core::{
    config::Config,
    convert::{ConvertService, PollPolicy},
    messaging::port::MessagingPort,
    messaging::throttled::{ThrottleConfig, ThrottledMessenger},
    ports::ConversionPort,
    session::{InMemorySessionStore, SessionStore},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub sessions: Arc<dyn SessionStore>,
    pub converter: Arc<ConvertService>,
    pub chat_locks: Arc<ChatLocks>,
}

/// Per-chat mutexes so a chat runs at most one conversion at a time.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(cfg: Arc<Config>, provider: Arc<dyn ConversionPort>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!("bot started: @{}", me.username()),
        Err(e) => anyhow::bail!("failed to reach Telegram (bad token?): {e}"),
    }
    if cfg.telegram_allowed_users.is_empty() {
        tracing::info!("no allow-list configured, answering all users");
    } else {
        tracing::info!(users = cfg.telegram_allowed_users.len(), "allow-list active");
    }

    // Wrap the raw Telegram messenger with a throttling decorator: the status
    // message is edited on every pipeline step, which adds up on slow jobs.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(cfg.session_ttl));
    let converter = Arc::new(ConvertService::new(
        provider,
        PollPolicy {
            max_attempts: cfg.poll_max_attempts,
            interval: cfg.poll_interval,
        },
    ));

    let state = Arc::new(AppState {
        cfg,
        messenger,
        sessions,
        converter,
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
