// This file is part of tao-dividends.
// Copyright (C) 2025 TAO Dividends Contributors
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod v1;

use crate::domain::{Api, DividendQuery, storage::Storage};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use dividends_common::error::StdErrorExt;
use log::{info, warn};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use std::{io, net::IpAddr};
use thiserror::Error;
use tokio::signal::unix::{SignalKind, signal};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

/// Axum based implementation of [Api].
pub struct AxumApi {
    config: Config,
}

impl AxumApi {
    /// Create a new [AxumApi] with the given [Config].
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl Api for AxumApi {
    type Error = AxumApiError;

    async fn serve(
        self,
        query: impl DividendQuery,
        storage: impl Storage,
    ) -> Result<(), Self::Error> {
        let Config {
            address,
            port,
            request_body_limit,
            api_key,
        } = self.config;

        let app = make_app(query, storage, api_key, request_body_limit as usize);

        let listener = tokio::net::TcpListener::bind((address, port))
            .await
            .map_err(AxumApiError::Bind)?;
        info!(address:?, port; "listening to TCP connections");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(AxumApiError::Serve)
    }
}

/// Config for the [AxumApi].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub address: IpAddr,

    pub port: u16,

    #[serde(with = "byte_unit_serde")]
    pub request_body_limit: u64,

    /// Bearer token required by all routes except `/ready`.
    pub api_key: SecretString,
}

/// Error possibly returned by [AxumApi::serve].
#[derive(Debug, Error)]
pub enum AxumApiError {
    #[error("cannot bind tcp listener")]
    Bind(#[source] io::Error),

    #[error("cannot serve API")]
    Serve(#[source] io::Error),
}

/// Routes are served both at the root and nested under `/api/v1`.
fn make_app<D, S>(query: D, storage: S, api_key: SecretString, request_body_limit: usize) -> Router
where
    D: DividendQuery,
    S: Storage,
{
    let v1_app = v1::make_app(query, storage.clone(), api_key);

    Router::new()
        .route("/ready", get(ready::<S>))
        .with_state(storage)
        .merge(v1_app.clone())
        .nest("/api/v1", v1_app)
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(request_body_limit))
                .layer(CorsLayer::permissive()),
        )
}

async fn ready<S>(State(storage): State<S>) -> Response
where
    S: Storage,
{
    match storage.ping().await {
        Ok(()) => StatusCode::OK.into_response(),

        Err(error) => {
            warn!(error = error.as_chain(); "storage not ready");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "detail": "storage not ready" })),
            )
                .into_response()
        }
    }
}

async fn shutdown_signal() {
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }

        Err(error) => {
            warn!(error:%; "cannot install SIGTERM handler, serving without graceful shutdown");
            std::future::pending::<()>().await;
        }
    }
}
