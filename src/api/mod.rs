use std::net::SocketAddr;

use axum::routing::{delete, get, post};
use axum::Router;
use derive_new::new;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod error;
mod state;
pub mod statistics;

pub use error::*;
pub use state::*;

use crate::error::{ApplicationError, BindAddressSnafu, WebServerSnafu};

/// The body of every response that only carries a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, new)]
pub struct Detail {
    pub detail: String,
}

pub fn create_router(app: App) -> Router {
    let statistic = Router::new()
        .route("/create", post(statistics::create))
        .route("/get_all", get(statistics::get_all))
        .route("/search", get(statistics::search))
        .route("/delete_all", delete(statistics::delete_all))
        .route("/:date", delete(statistics::remove));

    Router::new()
        .nest("/statistic", statistic)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app)
}

pub async fn serve(address: SocketAddr, app: App) -> Result<(), ApplicationError> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .context(BindAddressSnafu { address })?;

    tracing::info!(%address, "listening for requests");
    axum::serve(listener, create_router(app))
        .await
        .context(WebServerSnafu)
}
