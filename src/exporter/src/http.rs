// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! HTTP endpoints.

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing;
use prometheus::{Encoder, Registry, TextEncoder};

/// Routes `/metrics` and `/api/livez`.
pub fn router(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", routing::get(handle_prometheus))
        .route("/api/livez", routing::get(handle_liveness_check))
        .with_state(registry)
}

/// Serves the text exposition of every metric in `registry`.
///
/// Gathering runs every registered collector, so this is where the operation
/// snapshots are actually read.
#[allow(clippy::unused_async)]
pub async fn handle_prometheus(State(registry): State<Registry>) -> Response {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    match encoder.encode(&registry.gather(), &mut buffer) {
        Ok(()) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], buffer).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("encoding metrics: {err}"),
        )
            .into_response(),
    }
}

#[allow(clippy::unused_async)]
pub async fn handle_liveness_check() -> impl IntoResponse {
    (StatusCode::OK, "Liveness check successful!")
}
