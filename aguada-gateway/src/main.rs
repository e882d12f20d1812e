use std::sync::Arc;

use aguada_gateway::configs::Settings;
use aguada_gateway::run;

#[tokio::main]
async fn main() {
    let settings = Arc::new(Settings::new().expect("Failed to load settings."));

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
            let level = settings.logger.level.as_str();

            format!("{app_name}={level},aguada_embedded={level}").into()
        }))
        .init();

    if let Err(e) = run(&settings).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
