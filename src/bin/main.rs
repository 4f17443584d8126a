use std::env;
use std::net::TcpListener;

use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gamgyul::config::Config;
use gamgyul::state::AppState;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gamgyul=info,actix_web=info"));
    let registry = tracing_subscriber::registry().with(filter);

    if env::var("LOG_FORMAT").unwrap_or_default() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true).compact())
            .init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = Config::load();
    let state = AppState::from_config(&config)?;
    info!("Datastore: {}", config.db_path.display());

    let listener = TcpListener::bind(&config.bind_addr)?;
    info!("Server listening on http://{}", listener.local_addr()?);

    gamgyul::run(listener, state)?.await?;
    Ok(())
}
