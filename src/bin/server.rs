use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info, warn};

use parlor::config::ServerConfig;
use parlor::core::server::ChatServer;
use parlor::handlers::chat_routes;

#[tokio::main]
async fn main() {
    // Initialize env
    match dotenvy::dotenv() {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Initialize logging
    env_logger::init();

    // Load config from .env
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, bot={}",
        config.host, config.port, config.room.bot_name
    );

    // Create the room coordinator. No reply pipeline is wired here:
    // the responder and synthesizer are external collaborators, and
    // the room runs fine without them (mentions stay ordinary
    // messages).
    let server = Arc::new(ChatServer::new(config.room.clone()));
    server
        .clone()
        .start_sweep_task(config.sweep_interval, config.connection_timeout);

    let routes = chat_routes(server, None);

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    // Start the server
    info!("Starting Parlor chat server on {}", addr);

    warp::serve(routes).run(addr).await;
}
