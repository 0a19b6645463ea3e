use std::sync::Arc;

use kwork_bot::{Bot, BotConfig, KworkClient};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export KWORK_LOGIN=... KWORK_PASSWORD=...");
        std::process::exit(1);
    });

    eprintln!("🤖 Kwork Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Login: {}", config.login);
    eprintln!("   API: {}", config.api_host);
    eprintln!("   Channel: {}", config.channel_url);
    if let Some(proxy) = &config.proxy_url {
        eprintln!("   Proxy: {proxy}");
    }
    eprintln!();

    let client = Arc::new(KworkClient::new(&config)?);
    let mut bot = Bot::new(client, &config);

    bot.on_first_message(|msg| async move {
        msg.answer_simulation(
            "Здравствуйте! Спасибо за ваше сообщение, я отвечу вам в ближайшее время.",
        )
        .await?;
        anyhow::Ok(())
    });

    bot.on_text_contains("бот", |msg| async move {
        msg.answer_simulation("Вам нужен бот? Расскажите подробнее, что он должен уметь.")
            .await?;
        anyhow::Ok(())
    });

    bot.on_text("привет", |msg| async move {
        msg.answer_simulation("И вам привет!").await?;
        anyhow::Ok(())
    });

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            shutdown.cancel();
        }
    });

    match bot.run(cancel).await {
        Err(e) if e.is_cancelled() => Ok(()),
        result => Ok(result?),
    }
}
