use std::sync::Arc;

use lyra_agid::config::Config;
use lyra_agid::handler::HandlerRegistry;
use lyra_agid::modules;
use lyra_agid::server::Server;
use tracing::error;

#[tokio::main]
async fn main() {
    lyra_log::init();

    let mut registry = HandlerRegistry::new();
    if let Err(e) = modules::register_all(&mut registry) {
        error!("handler registration failed: {:?}", e);
        std::process::exit(1);
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("could not load configuration: {:?}", e);
            std::process::exit(1);
        }
    };

    match Server::new(config, Arc::new(registry)).await {
        Ok(server) => {
            if let Err(e) = server.run().await {
                error!("server exited: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("startup failed: {:?}", e);
            std::process::exit(1);
        }
    }
}
