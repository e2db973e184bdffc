use tokio::net::TcpListener;

use portal_server::config::{generate_config_template, Config};
use portal_server::{auth, db, routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("portal_server=info"));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(env_filter).init();
    }

    tracing::info!("Portal server v{} starting", env!("CARGO_PKG_VERSION"));

    let db = db::init_db(&config.data_dir)?;

    // Shared with the account service, which issues the tokens we validate
    let jwt_secret = auth::jwt::load_or_generate_jwt_secret(&config.data_dir)?;

    let realtime = config.realtime();
    tracing::info!(
        rebind_policy = ?realtime.rebind_policy,
        require_ws_auth = realtime.require_ws_auth,
        broadcast_role = %realtime.broadcast_role,
        "Realtime gateway configured"
    );

    let app_state = state::AppState::new(db, jwt_secret, realtime);
    let app = routes::build_router_with_cors(app_state, config.cors_origin.as_deref());

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
