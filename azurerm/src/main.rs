use azurerm::AzureLbProvider;
use std::env;
use tfplug::{LogLevel, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // stdout carries the plugin handshake
    let filter = env::var("RUST_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| {
            let level = env::var("TF_LOG")
                .ok()
                .and_then(|value| LogLevel::from_tf_log(&value))
                .unwrap_or(LogLevel::Info);
            EnvFilter::new(level.as_str())
        });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut config = ServerConfig::default();
    if let (Ok(cert_path), Ok(key_path)) = (env::var("TF_PLUGIN_CERT"), env::var("TF_PLUGIN_KEY")) {
        config = config.with_tls(cert_path.into(), key_path.into());
    }

    if let Err(e) = tfplug::serve(AzureLbProvider::new(), config).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    Ok(())
}
