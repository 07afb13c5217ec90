use buzzroom::buzzer::BuzzerServer;
use buzzroom::config::Config;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = Config::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let bind_addr = config.bind_addr();
    info!("Buzzroom server binding to {}", bind_addr);

    let server = BuzzerServer::new(config.engine(), config.keepalive());

    tokio::select! {
        result = server.run(&bind_addr) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
            Ok(())
        }
    }
}
