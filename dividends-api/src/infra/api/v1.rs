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

use crate::domain::{
    DividendObservation, DividendQuery, QueryEntry, QueryError, ResolveError,
    SentimentStakeOperation, storage::Storage,
};
use axum::{
    Json, Router,
    extract::{Query, Request, State, rejection::QueryRejection},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use dividends_common::{
    domain::{Hotkey, NetUid},
    error::StdErrorExt,
};
use fastrace::trace;
use log::{error, warn};
use metrics::{Counter, counter};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error as _, Unexpected},
};
use serde_json::json;
use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Clone)]
struct AppState<D, S> {
    query: D,
    storage: S,
    tao_dividends_calls: Counter,
    dividends_and_stakes_calls: Counter,
}

pub fn make_app<D, S>(query: D, storage: S, api_key: SecretString) -> Router
where
    D: DividendQuery,
    S: Storage,
{
    let state = AppState {
        query,
        storage,
        tao_dividends_calls: counter!("dividends_api_calls", "route" => "tao_dividends"),
        dividends_and_stakes_calls: counter!(
            "dividends_api_calls",
            "route" => "dividends_and_stakes"
        ),
    };

    Router::new()
        .route("/tao-dividends", get(tao_dividends::<D, S>))
        .route("/dividends-and-stakes", get(dividends_and_stakes::<D, S>))
        .route_layer(middleware::from_fn_with_state(
            Arc::new(api_key),
            authorize,
        ))
        .with_state(state)
}

async fn authorize(
    State(api_key): State<Arc<SecretString>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| {
            token
                .as_bytes()
                .ct_eq(api_key.expose_secret().as_bytes())
                .into()
        });

    if authorized {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Unauthorized" })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
struct TaoDividendsParams {
    #[serde(default, alias = "netuid")]
    network_id: Option<NetUid>,

    #[serde(default)]
    hotkey: Option<String>,

    #[serde(default, deserialize_with = "deserialize_flag")]
    trade: bool,
}

/// Lenient boolean query flag: `true`/`false`, `1`/`0`, `yes`/`no` or `on`/`off`, ignoring case.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let flag = String::deserialize(deserializer)?;

    match flag.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(D::Error::invalid_value(
            Unexpected::Str(&flag),
            &"one of true, false, 1, 0, yes, no, on or off",
        )),
    }
}

#[derive(Debug, Serialize)]
struct TaoDividendsResponse {
    success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,

    result: Vec<TaoDividend>,
}

#[derive(Debug, Serialize)]
struct TaoDividend {
    network_id: NetUid,

    hotkey: Hotkey,

    #[serde(with = "rust_decimal::serde::float_option")]
    dividend: Option<Decimal>,

    stake_tx_triggered: bool,

    cached: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<QueryEntry> for TaoDividend {
    fn from(entry: QueryEntry) -> Self {
        let QueryEntry {
            netuid,
            hotkey,
            dividend,
            stake_tx_triggered,
        } = entry;

        match dividend {
            Ok(dividend) => Self {
                network_id: netuid,
                hotkey,
                dividend: Some(dividend.amount),
                stake_tx_triggered,
                cached: dividend.cached,
                error: None,
            },

            Err(error) => Self {
                network_id: netuid,
                hotkey,
                dividend: None,
                stake_tx_triggered,
                cached: false,
                error: Some(error.as_chain()),
            },
        }
    }
}

#[trace]
async fn tao_dividends<D, S>(
    State(state): State<AppState<D, S>>,
    params: Result<Query<TaoDividendsParams>, QueryRejection>,
) -> Response
where
    D: DividendQuery,
    S: Storage,
{
    state.tao_dividends_calls.increment(1);

    let TaoDividendsParams {
        network_id,
        hotkey,
        trade,
    } = match params {
        Ok(Query(params)) => params,
        Err(rejection) => return failure(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let hotkey = match hotkey.filter(|hotkey| !hotkey.is_empty()).map(Hotkey::try_from) {
        Some(Ok(hotkey)) => Some(hotkey),
        Some(Err(error)) => return failure(StatusCode::BAD_REQUEST, error.as_chain()),
        None => None,
    };

    match state.query.query(network_id, hotkey, trade).await {
        Ok(entries) => Json(TaoDividendsResponse {
            success: true,
            msg: None,
            result: entries.into_iter().map(Into::into).collect(),
        })
        .into_response(),

        Err(error) => query_error_response(error),
    }
}

fn query_error_response(error: QueryError) -> Response {
    let msg = error.as_chain();

    let (status, entries) = match error {
        QueryError::Expansion(_) => (StatusCode::BAD_GATEWAY, vec![]),

        QueryError::NoMatch => (StatusCode::NOT_FOUND, vec![]),

        QueryError::AllFailed(entries) => {
            let dependency_failed = entries
                .iter()
                .any(|entry| matches!(entry.dividend, Err(ResolveError::Dependency(_))));
            let status = if dependency_failed {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::NOT_FOUND
            };
            (status, entries)
        }

        QueryError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, vec![]),
    };

    if status.is_server_error() {
        error!(status:%, error = msg.as_str(); "cannot answer dividends query");
    } else {
        warn!(status:%, error = msg.as_str(); "no dividends for query");
    }

    let response = TaoDividendsResponse {
        success: false,
        msg: Some(msg),
        result: entries.into_iter().map(Into::into).collect(),
    };
    (status, Json(response)).into_response()
}

#[derive(Debug, Serialize)]
struct DividendsAndStakesResponse {
    success: bool,
    dividends: Vec<DividendObservation>,
    stake_operations: Vec<SentimentStakeOperation>,
}

#[trace]
async fn dividends_and_stakes<D, S>(State(state): State<AppState<D, S>>) -> Response
where
    D: DividendQuery,
    S: Storage,
{
    state.dividends_and_stakes_calls.increment(1);

    let records = async {
        let dividends = state.storage.get_dividend_observations().await?;
        let stake_operations = state.storage.get_stake_operations().await?;
        Ok::<_, sqlx::Error>((dividends, stake_operations))
    };

    match records.await {
        Ok((dividends, stake_operations)) => Json(DividendsAndStakesResponse {
            success: true,
            dividends,
            stake_operations,
        })
        .into_response(),

        Err(error) => {
            let msg = error.as_chain();
            error!(error = msg.as_str(); "cannot get dividends and stake operations");
            failure(StatusCode::INTERNAL_SERVER_ERROR, msg)
        }
    }
}

fn failure(status: StatusCode, msg: String) -> Response {
    (status, Json(json!({ "success": false, "msg": msg }))).into_response()
}

#[cfg(test)]
pub mod tests {
    use crate::{
        domain::{
            Dependency, DependencyError, Dividend, DividendObservation, DividendQuery,
            QueryEntry, QueryError, ResolveError,
            storage::{Storage, tests::InMemStorage},
        },
        infra::api::v1::make_app,
    };
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header::AUTHORIZATION},
    };
    use chrono::Utc;
    use dividends_common::domain::{Hotkey, NetUid};
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use std::{error::Error as StdError, io, sync::Arc, time::Duration};
    use tower::ServiceExt;

    /// Answers queries depending on the netuid: 404 and 502 simulate the respective failures,
    /// 500 a persistence failure, any other netuid a resolved dividend.
    #[derive(Debug, Clone, Default)]
    pub struct MockQuery {
        calls: Arc<Mutex<Vec<(Option<NetUid>, Option<Hotkey>, bool)>>>,
    }

    impl MockQuery {
        fn calls(&self) -> Vec<(Option<NetUid>, Option<Hotkey>, bool)> {
            self.calls.lock().clone()
        }
    }

    impl DividendQuery for MockQuery {
        async fn query(
            &self,
            netuid: Option<NetUid>,
            hotkey: Option<Hotkey>,
            trade: bool,
        ) -> Result<Vec<QueryEntry>, QueryError> {
            self.calls.lock().push((netuid, hotkey.clone(), trade));

            let hotkey = hotkey.unwrap_or_else(|| "5Fa".parse().expect("hotkey is valid"));

            match netuid.map(|netuid| netuid.0) {
                Some(404) => Err(QueryError::NoMatch),

                Some(500) => Err(QueryError::Persistence(sqlx::Error::PoolTimedOut)),

                Some(502) => Err(QueryError::AllFailed(vec![QueryEntry {
                    netuid: NetUid(502),
                    hotkey,
                    dividend: Err(ResolveError::Dependency(DependencyError::Timeout {
                        dependency: Dependency::ChainQuery,
                        timeout: Duration::from_secs(5),
                    })),
                    stake_tx_triggered: false,
                }])),

                netuid => Ok(vec![
                    QueryEntry {
                        netuid: NetUid(netuid.unwrap_or(18)),
                        hotkey: hotkey.clone(),
                        dividend: Ok(Dividend {
                            amount: Decimal::new(15, 1),
                            cached: true,
                        }),
                        stake_tx_triggered: trade,
                    },
                    QueryEntry {
                        netuid: NetUid(netuid.unwrap_or(18)),
                        hotkey: "5Fz".parse().expect("hotkey is valid"),
                        dividend: Err(ResolveError::Dependency(DependencyError::Failed {
                            dependency: Dependency::ChainQuery,
                            source: io::Error::other("connection reset").into(),
                        })),
                        stake_tx_triggered: false,
                    },
                ]),
            }
        }
    }

    fn app(query: MockQuery, storage: InMemStorage) -> Router {
        make_app(query, storage, "secret".into())
    }

    async fn get(app: Router, uri: &str) -> Result<(StatusCode, Value), Box<dyn StdError>> {
        let request = Request::get(uri)
            .header(AUTHORIZATION, "Bearer secret")
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&body)?))
    }

    #[tokio::test]
    async fn test_unauthorized() -> Result<(), Box<dyn StdError>> {
        let app = app(MockQuery::default(), InMemStorage::default());

        for authorization in [
            None,
            Some("Bearer wrong"),
            Some("Bearer secre"),
            Some("Bearer secrets"),
            Some("secret"),
        ] {
            let mut request = Request::get("/tao-dividends");
            if let Some(authorization) = authorization {
                request = request.header(AUTHORIZATION, authorization);
            }

            let response = app.clone().oneshot(request.body(Body::empty())?).await?;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            let body = to_bytes(response.into_body(), usize::MAX).await?;
            let body = serde_json::from_slice::<Value>(&body)?;
            assert_eq!(body, json!({ "detail": "Unauthorized" }));
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_tao_dividends() -> Result<(), Box<dyn StdError>> {
        let query = MockQuery::default();
        let app = app(query.clone(), InMemStorage::default());

        let (status, body) =
            get(app.clone(), "/tao-dividends?netuid=7&hotkey=5Fb&trade=true").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "success": true,
                "result": [
                    {
                        "network_id": 7,
                        "hotkey": "5Fb",
                        "dividend": 1.5,
                        "stake_tx_triggered": true,
                        "cached": true
                    },
                    {
                        "network_id": 7,
                        "hotkey": "5Fz",
                        "dividend": null,
                        "stake_tx_triggered": false,
                        "cached": false,
                        "error": "cannot resolve dividend: chain query call failed: connection reset"
                    }
                ]
            })
        );

        let (status, _) = get(app.clone(), "/tao-dividends?network_id=7&hotkey=").await?;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get(app.clone(), "/tao-dividends").await?;
        assert_eq!(status, StatusCode::OK);

        for flag in ["True", "1", "yes", "ON", "False", "0", "No", "off"] {
            let (status, _) = get(app.clone(), &format!("/tao-dividends?trade={flag}")).await?;
            assert_eq!(status, StatusCode::OK);
        }

        assert_eq!(
            query.calls(),
            [
                (Some(NetUid(7)), Some("5Fb".parse::<Hotkey>()?), true),
                (Some(NetUid(7)), None, false),
                (None, None, false),
                (None, None, true),
                (None, None, true),
                (None, None, true),
                (None, None, true),
                (None, None, false),
                (None, None, false),
                (None, None, false),
                (None, None, false),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_tao_dividends_bad_request() -> Result<(), Box<dyn StdError>> {
        let query = MockQuery::default();
        let app = app(query.clone(), InMemStorage::default());

        for uri in [
            "/tao-dividends?netuid=abc",
            "/tao-dividends?netuid=70000",
            "/tao-dividends?hotkey=5F%20a",
            "/tao-dividends?trade=maybe",
            "/tao-dividends?trade=2",
            "/tao-dividends?trade=",
        ] {
            let (status, body) = get(app.clone(), uri).await?;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["success"], false);
        }

        assert!(query.calls().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_tao_dividends_failures() -> Result<(), Box<dyn StdError>> {
        let app = app(MockQuery::default(), InMemStorage::default());

        for (uri, expected_status) in [
            ("/tao-dividends?netuid=404", StatusCode::NOT_FOUND),
            ("/tao-dividends?netuid=500", StatusCode::INTERNAL_SERVER_ERROR),
            ("/tao-dividends?netuid=502", StatusCode::BAD_GATEWAY),
        ] {
            let (status, body) = get(app.clone(), uri).await?;
            assert_eq!(status, expected_status);
            assert_eq!(body["success"], false);
            assert!(body["msg"].is_string());
        }

        let (_, body) = get(app, "/tao-dividends?netuid=502").await?;
        assert_eq!(body["result"][0]["network_id"], 502);
        assert_eq!(body["result"][0]["dividend"], Value::Null);
        assert_eq!(body["result"][0]["stake_tx_triggered"], false);

        Ok(())
    }

    #[tokio::test]
    async fn test_dividends_and_stakes() -> Result<(), Box<dyn StdError>> {
        let storage = InMemStorage::default();
        let app = app(MockQuery::default(), storage.clone());

        let (status, body) = get(app.clone(), "/dividends-and-stakes").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "success": true, "dividends": [], "stake_operations": [] })
        );

        let observation = DividendObservation {
            netuid: NetUid(18),
            hotkey: "5Fa".parse()?,
            amount: Decimal::new(25, 2),
            observed_at: Utc::now(),
        };
        storage.save_dividend_observations(&[observation]).await?;

        let (status, body) = get(app.clone(), "/dividends-and-stakes").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dividends"][0]["network_id"], 18);
        assert_eq!(body["dividends"][0]["amount"], 0.25);

        storage.set_unavailable(true);
        let (status, body) = get(app, "/dividends-and-stakes").await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);

        Ok(())
    }
}
