use std::process::ExitCode;

use tidal_server::{Server, ServerConfig, default_router};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> ExitCode {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
        return ExitCode::FAILURE;
    }

    info!("starting tidal server");

    let server = match Server::builder().config(ServerConfig::default()).router(default_router()).build() {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "build server error");
            return ExitCode::FAILURE;
        }
    };

    match server.start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
