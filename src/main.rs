// Entrypoint for the CLI application.
// - Keeps `main` small: set up logging, load settings, hand off to the menu.
// - Log level comes from `RUST_LOG` (default `warn` so logs stay out of
//   the way of the prompts).

use anyhow::Context;
use tcstore_cli::{config::Settings, ui::main_menu};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let settings_path = Settings::default_path();
    let mut settings = Settings::load(&settings_path)
        .with_context(|| format!("Loading settings from {}", settings_path.display()))?;
    settings.apply_env();

    main_menu(settings, settings_path).await?;
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {e}"))?;
    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    Ok(())
}
