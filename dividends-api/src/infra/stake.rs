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

use crate::domain::stake::{StakeClient, StakeDirection};
use dividends_common::domain::{Hotkey, NetUid};
use fastrace::trace;
use reqwest::{Client as HttpClient, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Config for the wallet signer service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub url: String,

    pub api_key: SecretString,

    pub wallet_name: String,

    pub wallet_hotkey: String,

    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// A [StakeClient] delegating signing and submission to a wallet signer service.
#[derive(Debug, Clone)]
pub struct HttpStakeClient {
    url: String,
    api_key: SecretString,
    wallet_name: String,
    wallet_hotkey: String,
    http: HttpClient,
}

impl HttpStakeClient {
    /// Create a new [HttpStakeClient] with the given [Config].
    pub fn new(config: Config) -> Result<Self, HttpStakeClientError> {
        let Config {
            url,
            api_key,
            wallet_name,
            wallet_hotkey,
            request_timeout,
        } = config;

        let http = HttpClient::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(HttpStakeClientError::Client)?;

        Ok(Self {
            url: url.trim_end_matches('/').to_owned(),
            api_key,
            wallet_name,
            wallet_hotkey,
            http,
        })
    }
}

impl StakeClient for HttpStakeClient {
    type Error = HttpStakeClientError;

    #[trace(properties = {
        "netuid": "{netuid}",
        "hotkey": "{hotkey}",
        "direction": "{direction}",
        "amount": "{amount}"
    })]
    async fn submit(
        &self,
        netuid: NetUid,
        hotkey: &Hotkey,
        direction: StakeDirection,
        amount: Decimal,
    ) -> Result<String, Self::Error> {
        let url = format!("{}/{direction}", self.url);

        let request = SubmitRequest {
            netuid,
            hotkey,
            amount,
            wallet_name: &self.wallet_name,
            wallet_hotkey: &self.wallet_hotkey,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| HttpStakeClientError::Request(url.clone(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpStakeClientError::Rejected(url, status, body));
        }

        let SubmitResponse { transaction_hash } = response
            .json::<SubmitResponse>()
            .await
            .map_err(|error| HttpStakeClientError::Decode(url, error))?;

        Ok(transaction_hash)
    }
}

#[derive(Debug, Error)]
pub enum HttpStakeClientError {
    #[error("cannot create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("cannot send request to {0}")]
    Request(String, #[source] reqwest::Error),

    #[error("stake transaction rejected by {0} with status {1}: {2}")]
    Rejected(String, StatusCode, String),

    #[error("cannot decode response from {0}")]
    Decode(String, #[source] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    netuid: NetUid,
    hotkey: &'a Hotkey,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
    wallet_name: &'a str,
    wallet_hotkey: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    transaction_hash: String,
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::stake::{StakeClient, StakeDirection},
        infra::{
            stake::{Config, HttpStakeClient, HttpStakeClientError},
            tests::serve,
        },
    };
    use assert_matches::assert_matches;
    use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
    use dividends_common::domain::NetUid;
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use std::time::Duration;

    async fn stake(Json(request): Json<Value>) -> impl IntoResponse {
        let valid = request["netuid"] == 18
            && request["hotkey"] == "5Fa"
            && request["amount"] == "4.2"
            && request["wallet_name"] == "default";

        if valid {
            Json(json!({ "transaction_hash": "0xabc" })).into_response()
        } else {
            (StatusCode::BAD_REQUEST, "invalid stake request").into_response()
        }
    }

    #[tokio::test]
    async fn test_http_stake_client() -> anyhow::Result<()> {
        let router = Router::new()
            .route("/stake", post(stake))
            .route(
                "/unstake",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "insufficient stake") }),
            );
        let url = serve(router).await?;

        let client = HttpStakeClient::new(Config {
            url,
            api_key: "signer-secret".into(),
            wallet_name: "default".to_owned(),
            wallet_hotkey: "default".to_owned(),
            request_timeout: Duration::from_secs(5),
        })?;

        let transaction_hash = client
            .submit(
                NetUid(18),
                &"5Fa".parse()?,
                StakeDirection::Stake,
                Decimal::new(42, 1),
            )
            .await?;
        assert_eq!(transaction_hash, "0xabc");

        let transaction_hash = client
            .submit(
                NetUid(18),
                &"5Fa".parse()?,
                StakeDirection::Unstake,
                Decimal::ONE,
            )
            .await;
        assert_matches!(
            transaction_hash,
            Err(HttpStakeClientError::Rejected(_, _, body)) if body == "insufficient stake"
        );

        Ok(())
    }
}
