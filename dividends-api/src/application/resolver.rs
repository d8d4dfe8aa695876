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
    Dependency, DependencyError, Dividend, DividendKey, DividendObservation, QueryError,
    ResolveError, cache::DividendCache, call_dependency, chain::ChainClient, storage::Storage,
};
use chrono::Utc;
use dividends_common::{
    domain::{Hotkey, NetUid},
    error::StdErrorExt,
};
use fastrace::trace;
use futures::{StreamExt, stream};
use log::{debug, warn};
use metrics::{Counter, counter};
use serde::Deserialize;
use std::{num::NonZeroUsize, time::Duration};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    #[serde(with = "humantime_serde")]
    pub chain_timeout: Duration,

    #[serde(default = "fan_out_concurrency_default")]
    pub fan_out_concurrency: NonZeroUsize,
}

/// Resolves dividends from the cache, falling back to the chain query service.
#[derive(Debug, Clone)]
pub struct DividendResolver<Q, C, S> {
    config: Config,
    chain: Q,
    cache: C,
    storage: S,
    cache_hits: Counter,
    cache_misses: Counter,
}

impl<Q, C, S> DividendResolver<Q, C, S>
where
    Q: ChainClient,
    C: DividendCache,
    S: Storage,
{
    pub fn new(config: Config, chain: Q, cache: C, storage: S) -> Self {
        let cache_hits = counter!("dividends_cache_lookups", "result" => "hit");
        let cache_misses = counter!("dividends_cache_lookups", "result" => "miss");

        Self {
            config,
            chain,
            cache,
            storage,
            cache_hits,
            cache_misses,
        }
    }

    /// Resolve the dividends for the given netuid and hotkey, expanding omitted parameters via
    /// the chain registry. Every resolved dividend is recorded as an observation; if these cannot
    /// be persisted, the whole resolution fails.
    #[trace(properties = { "netuid": "{netuid:?}", "hotkey": "{hotkey:?}" })]
    pub async fn resolve(
        &self,
        netuid: Option<NetUid>,
        hotkey: Option<Hotkey>,
    ) -> Result<Vec<(DividendKey, Result<Dividend, ResolveError>)>, QueryError> {
        let keys = self.expand(netuid, hotkey).await?;

        let dividends = stream::iter(keys)
            .map(|key| async move {
                let dividend = self.resolve_key(&key).await;
                (key, dividend)
            })
            .buffered(self.config.fan_out_concurrency.get())
            .collect::<Vec<_>>()
            .await;

        let observed_at = Utc::now();
        let observations = dividends
            .iter()
            .filter_map(|(key, dividend)| {
                dividend.as_ref().ok().map(|dividend| DividendObservation {
                    netuid: key.netuid,
                    hotkey: key.hotkey.clone(),
                    amount: dividend.amount,
                    observed_at,
                })
            })
            .collect::<Vec<_>>();

        if !observations.is_empty() {
            self.storage
                .save_dividend_observations(&observations)
                .await
                .map_err(QueryError::Persistence)?;
        }

        Ok(dividends)
    }

    #[trace(properties = { "key": "{key}" })]
    async fn resolve_key(&self, key: &DividendKey) -> Result<Dividend, ResolveError> {
        match self.cache.get(key).await {
            Ok(Some(amount)) => {
                self.cache_hits.increment(1);
                return Ok(Dividend {
                    amount,
                    cached: true,
                });
            }

            Ok(None) => self.cache_misses.increment(1),

            Err(error) => {
                self.cache_misses.increment(1);
                warn!(key:%, error = error.as_chain(); "cannot get dividend from cache");
            }
        }

        let amount = call_dependency(
            Dependency::ChainQuery,
            self.config.chain_timeout,
            self.chain.get_dividend(key.netuid, &key.hotkey),
        )
        .await?
        .ok_or_else(|| ResolveError::NotFound(key.netuid, key.hotkey.clone()))?;

        if let Err(error) = self
            .cache
            .set(key.to_owned(), amount, self.config.cache_ttl)
            .await
        {
            warn!(key:%, error = error.as_chain(); "cannot put dividend into cache");
        }

        debug!(key:%, amount:%; "dividend fetched from chain");

        Ok(Dividend {
            amount,
            cached: false,
        })
    }

    async fn expand(
        &self,
        netuid: Option<NetUid>,
        hotkey: Option<Hotkey>,
    ) -> Result<Vec<DividendKey>, QueryError> {
        match (netuid, hotkey) {
            (Some(netuid), Some(hotkey)) => Ok(vec![DividendKey::new(netuid, hotkey)]),

            (Some(netuid), None) => {
                let hotkeys = self.hotkeys(netuid).await.map_err(QueryError::Expansion)?;
                let keys = hotkeys
                    .into_iter()
                    .map(|hotkey| DividendKey::new(netuid, hotkey))
                    .collect();
                Ok(keys)
            }

            (None, hotkey) => {
                let netuids = call_dependency(
                    Dependency::ChainQuery,
                    self.config.chain_timeout,
                    self.chain.netuids(),
                )
                .await
                .map_err(QueryError::Expansion)?;

                let hotkeys_by_netuid = stream::iter(netuids)
                    .map(|netuid| async move { (netuid, self.hotkeys(netuid).await) })
                    .buffered(self.config.fan_out_concurrency.get())
                    .collect::<Vec<_>>()
                    .await;

                let mut keys = vec![];
                for (netuid, hotkeys) in hotkeys_by_netuid {
                    match hotkeys {
                        Ok(hotkeys) => keys.extend(
                            hotkeys
                                .into_iter()
                                .filter(|h| hotkey.as_ref().is_none_or(|hotkey| h == hotkey))
                                .map(|hotkey| DividendKey::new(netuid, hotkey)),
                        ),

                        // A single unavailable network must not fail the whole expansion.
                        Err(error) => {
                            warn!(netuid:%, error = error.as_chain(); "cannot get hotkeys, skipping network")
                        }
                    }
                }

                Ok(keys)
            }
        }
    }

    async fn hotkeys(&self, netuid: NetUid) -> Result<Vec<Hotkey>, DependencyError> {
        call_dependency(
            Dependency::ChainQuery,
            self.config.chain_timeout,
            self.chain.hotkeys(netuid),
        )
        .await
    }
}

fn fan_out_concurrency_default() -> NonZeroUsize {
    NonZeroUsize::new(8).unwrap_or(NonZeroUsize::MIN)
}
