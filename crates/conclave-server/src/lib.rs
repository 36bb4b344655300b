pub mod config;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod fanout;
pub mod registry;
pub mod state;
pub mod ws;

use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
///
/// `/ws` carries the session protocol; everything else falls back to the
/// static presentation bundle, served compressed.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .fallback_service(ServeDir::new(&web_root))
        .layer(CompressionLayer::new())
        .with_state(state.clone());

    (app, state)
}
