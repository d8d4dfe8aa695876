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

use crate::domain::chain::ChainClient;
use dividends_common::domain::{Hotkey, NetUid};
use fastrace::trace;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use thiserror::Error;

/// Config for the chain query service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub url: String,

    #[serde(default)]
    pub api_key: Option<SecretString>,

    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// A [ChainClient] for a REST chain query service serving subnet registries and dividends.
#[derive(Debug, Clone)]
pub struct HttpChainClient {
    url: String,
    api_key: Option<SecretString>,
    http: HttpClient,
}

impl HttpChainClient {
    /// Create a new [HttpChainClient] with the given [Config].
    pub fn new(config: Config) -> Result<Self, HttpChainClientError> {
        let Config {
            url,
            api_key,
            request_timeout,
        } = config;

        let http = HttpClient::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(HttpChainClientError::Client)?;

        Ok(Self {
            url: url.trim_end_matches('/').to_owned(),
            api_key,
            http,
        })
    }

    async fn get<T>(&self, path: &str) -> Result<Option<T>, HttpChainClientError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{path}", self.url);

        let response = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(|error| HttpChainClientError::Request(url.clone(), error))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),

            status if status.is_success() => response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|error| HttpChainClientError::Decode(url, error)),

            status => Err(HttpChainClientError::Status(url, status)),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(api_key) => request.bearer_auth(api_key.expose_secret()),
            None => request,
        }
    }
}

impl ChainClient for HttpChainClient {
    type Error = HttpChainClientError;

    #[trace]
    async fn netuids(&self) -> Result<Vec<NetUid>, Self::Error> {
        let netuids = self.get::<NetUidsResponse>("/subnets").await?;
        Ok(netuids.map(|response| response.netuids).unwrap_or_default())
    }

    #[trace(properties = { "netuid": "{netuid}" })]
    async fn hotkeys(&self, netuid: NetUid) -> Result<Vec<Hotkey>, Self::Error> {
        let hotkeys = self
            .get::<HotkeysResponse>(&format!("/subnets/{netuid}/hotkeys"))
            .await?;
        Ok(hotkeys.map(|response| response.hotkeys).unwrap_or_default())
    }

    #[trace(properties = { "netuid": "{netuid}", "hotkey": "{hotkey}" })]
    async fn get_dividend(
        &self,
        netuid: NetUid,
        hotkey: &Hotkey,
    ) -> Result<Option<Decimal>, Self::Error> {
        let dividend = self
            .get::<DividendResponse>(&format!("/subnets/{netuid}/dividends/{hotkey}"))
            .await?;
        Ok(dividend.and_then(|response| response.dividend))
    }
}

#[derive(Debug, Error)]
pub enum HttpChainClientError {
    #[error("cannot create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("cannot send request to {0}")]
    Request(String, #[source] reqwest::Error),

    #[error("unexpected status {1} from {0}")]
    Status(String, StatusCode),

    #[error("cannot decode response from {0}")]
    Decode(String, #[source] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct NetUidsResponse {
    netuids: Vec<NetUid>,
}

#[derive(Debug, Deserialize)]
struct HotkeysResponse {
    hotkeys: Vec<Hotkey>,
}

#[derive(Debug, Deserialize)]
struct DividendResponse {
    dividend: Option<Decimal>,
}
