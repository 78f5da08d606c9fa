use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::protocol::{ErrorResponse, PutRequest, PutResponse, RemoveResponse, RowsResponse, StatusResponse};
use crate::dynamo::engine::Dynamo;
use crate::dynamo::protocol::Selector;
use crate::error::DynamoError;

fn failure(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn store_failure(operation: &str, e: DynamoError) -> Response {
    tracing::error!("Failed to {}: {}", operation, e);
    failure(StatusCode::INTERNAL_SERVER_ERROR, e)
}

pub async fn handle_put(
    Extension(dynamo): Extension<Arc<Dynamo>>,
    Json(req): Json<PutRequest>,
) -> Response {
    // Sentinels address row sets, never a single row
    if req.key.is_empty() || !matches!(Selector::parse(&req.key), Selector::Key(_)) {
        tracing::warn!("Rejected PUT with reserved key {:?}", req.key);
        return failure(StatusCode::BAD_REQUEST, format!("key {:?} is reserved", req.key));
    }

    match dynamo.put(&req.key, &req.value).await {
        Ok(outcome) => {
            tracing::debug!("PUT {} -> {:?}", req.key, outcome);
            (
                StatusCode::OK,
                Json(PutResponse {
                    key: req.key,
                    outcome,
                }),
            )
                .into_response()
        }
        Err(e) => store_failure("put", e),
    }
}

pub async fn handle_get(
    Extension(dynamo): Extension<Arc<Dynamo>>,
    Path(key): Path<String>,
) -> Response {
    let selector = Selector::parse(&key);
    match dynamo.query(&selector).await {
        Ok(rows) if rows.is_empty() && matches!(selector, Selector::Key(_)) => {
            (StatusCode::NOT_FOUND, Json(RowsResponse { rows })).into_response()
        }
        Ok(rows) => (StatusCode::OK, Json(RowsResponse { rows })).into_response(),
        Err(e) => store_failure("get", e),
    }
}

pub async fn handle_delete(
    Extension(dynamo): Extension<Arc<Dynamo>>,
    Path(key): Path<String>,
) -> Response {
    match dynamo.remove(&Selector::parse(&key)).await {
        Ok(removed) => (StatusCode::OK, Json(RemoveResponse { removed })).into_response(),
        Err(e) => store_failure("delete", e),
    }
}

pub async fn handle_status(Extension(dynamo): Extension<Arc<Dynamo>>) -> Response {
    let local_rows = match dynamo.local_row_count() {
        Ok(count) => count,
        Err(e) => return store_failure("count rows", e),
    };

    (
        StatusCode::OK,
        Json(StatusResponse {
            node: dynamo.node(),
            ring: dynamo.ring().ring_order(),
            offline: dynamo.liveness().offline_nodes(),
            recovery: dynamo.recovery_state(),
            local_rows,
        }),
    )
        .into_response()
}
