//! Client HTTP API
//!
//! A thin axum surface over one node's `Dynamo`, served beside the peer
//! listener (conventionally on the node port + 1000). Every route maps onto a
//! single client operation; there is no internode traffic over HTTP.
//!
//! ## Routes
//! - `POST /kv` with `{key, value}`: `put`.
//! - `GET /kv/:key`: read a key, `*` (cluster) or `@` (this node).
//! - `DELETE /kv/:key`: delete a key, `*` or `@`.
//! - `GET /status`: node id, ring order, offline peers, recovery state.

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::dynamo::engine::Dynamo;
use handlers::{handle_delete, handle_get, handle_put, handle_status};
use protocol::{ENDPOINT_KEY, ENDPOINT_PUT, ENDPOINT_STATUS};

pub mod handlers;
pub mod protocol;

pub fn router(dynamo: Arc<Dynamo>) -> Router {
    Router::new()
        .route(ENDPOINT_PUT, post(handle_put))
        .route(ENDPOINT_KEY, get(handle_get).delete(handle_delete))
        .route(ENDPOINT_STATUS, get(handle_status))
        .layer(Extension(dynamo))
}
