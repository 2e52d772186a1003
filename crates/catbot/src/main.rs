use std::sync::Arc;

use anyhow::Context;
use catbot_core::{
    config::Config,
    engine::{Engine, EngineConfig},
    model::{InlineKeyboard, InlineKeyboardButton},
    record::RecordStore,
    registry::StaticArgs,
};
use catbot_telegram::{AnswerOptions, Bot, HttpTransport, SendOptions};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    catbot_core::logging::init("catbot")?;

    let cfg = match std::env::var_os("CATBOT_CONFIG") {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path.to_string_lossy()))?,
        None => Config::load()?,
    };

    let record = match &cfg.record_path {
        Some(path) => Some(Arc::new(RecordStore::load(path)?)),
        None => None,
    };

    let transport = Arc::new(HttpTransport::from_config(&cfg)?);
    let bot = Bot::connect(transport.clone())
        .await
        .context("getMe failed; check the bot token")?;

    let mut engine = Engine::new(transport, EngineConfig::from(&cfg));
    register_tasks(&mut engine, &bot, &cfg, record.clone());

    let stop = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(stop.clone()));

    let finalize = move || {
        if let Some(record) = &record {
            if let Err(e) = record.save() {
                warn!("failed to save record: {e}");
            }
        }
        if let Err(e) = cfg.save() {
            warn!("failed to save config: {e}");
        }
        info!("state saved");
    };

    let cursor = engine.run(stop, finalize).await;
    info!(cursor, "catbot stopped");
    Ok(())
}

fn register_tasks(engine: &mut Engine, bot: &Bot, cfg: &Config, record: Option<Arc<RecordStore>>) {
    let greeting = cfg
        .extra
        .get("greeting")
        .and_then(|v| v.as_str())
        .unwrap_or("Hi! I am alive.")
        .to_string();

    let (b_pred, b_run) = (bot.clone(), bot.clone());
    engine.tasks().on_message(
        move |m| b_pred.detect_command("/start", m, false),
        move |m, args| {
            let bot = b_run.clone();
            async move {
                let text = args.get_str("greeting").unwrap_or_default().to_string();
                let keyboard =
                    InlineKeyboard::new(vec![vec![InlineKeyboardButton::callback("Ping", "ping")]]);
                let opts = SendOptions::default().keyboard(keyboard);
                if let Err(e) = bot.send_message(m.chat.id, &text, &opts).await {
                    warn!(chat_id = m.chat.id.0, "/start reply failed: {e}");
                }
            }
        },
        StaticArgs::new().with("greeting", greeting),
    );

    let (b_pred, b_run) = (bot.clone(), bot.clone());
    engine.tasks().on_message(
        move |m| b_pred.detect_command("/ping", m, false),
        move |m, _| {
            let bot = b_run.clone();
            async move {
                let opts = SendOptions::default().reply_to(m.id);
                if let Err(e) = bot.send_message(m.chat.id, "pong", &opts).await {
                    warn!(chat_id = m.chat.id.0, "/ping reply failed: {e}");
                }
            }
        },
        StaticArgs::new(),
    );

    let b_run = bot.clone();
    engine.tasks().on_callback_query(
        |q| q.data() == "ping",
        move |q, _| {
            let bot = b_run.clone();
            let record = record.clone();
            async move {
                let count = record.as_ref().map(|r| {
                    r.update("pings", 0, |v| {
                        let next = v.as_i64().unwrap_or(0) + 1;
                        *v = json!(next);
                        next
                    })
                });
                let text = match count {
                    Some(n) => format!("pong #{n}"),
                    None => "pong".to_string(),
                };
                if let Err(e) = bot
                    .answer_callback_query(&q.id, &AnswerOptions::text(text))
                    .await
                {
                    warn!("answering callback query failed: {e}");
                }
            }
        },
        StaticArgs::new(),
    );

    let b_run = bot.clone();
    engine.tasks().on_chat_join_request(
        |_| true,
        move |req, _| {
            let bot = b_run.clone();
            async move {
                let chat_id = req.chat.id.0;
                match bot.approve_chat_join_request(req.chat.id, req.from.id).await {
                    Ok(_) => info!(chat_id, user = %req.from.name(), "join request approved"),
                    Err(e) => warn!(chat_id, "join approval failed: {e}"),
                }
            }
        },
        StaticArgs::new(),
    );
}

/// Cancel `stop` on Ctrl-C (or SIGTERM on unix). The poller exits after its
/// current long-poll returns.
async fn cancel_on_shutdown(stop: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, finishing current poll"),
        _ = terminate => info!("received terminate signal, finishing current poll"),
    }
    stop.cancel();
}
