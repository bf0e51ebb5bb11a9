// src/server.rs

//! HTTP surface serving the materialized feeds.
//!
//! Handlers only hand out the current snapshot; a harvest-side failure is
//! never visible here, consumers always get the last good documents.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::feed::FeedMaterializer;

/// Build the feed router.
pub fn build_router(materializer: Arc<FeedMaterializer>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/rss", get(rss_handler))
        .route("/atom", get(atom_handler))
        .route("/json", get(json_handler))
        .with_state(materializer)
}

async fn root_handler() -> Redirect {
    Redirect::to("/rss")
}

async fn rss_handler(State(materializer): State<Arc<FeedMaterializer>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        materializer.rss().await,
    )
}

async fn atom_handler(State(materializer): State<Arc<FeedMaterializer>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/atom+xml; charset=utf-8")],
        materializer.atom().await,
    )
}

async fn json_handler(State(materializer): State<Arc<FeedMaterializer>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        materializer.json().await,
    )
}

/// Bind and serve until the token is cancelled.
pub async fn serve(
    port: u16,
    materializer: Arc<FeedMaterializer>,
    cancel: CancellationToken,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Serving feeds on http://{}", addr);

    axum::serve(listener, build_router(materializer))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
