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

pub mod dispatcher;
pub mod orchestrator;
pub mod pipeline;
pub mod resolver;

use crate::{
    application::{
        orchestrator::QueryOrchestrator, pipeline::StakeTriggerPipeline,
        resolver::DividendResolver,
    },
    domain::{
        Api, cache::DividendCache, chain::ChainClient, sentiment::SentimentClient,
        stake::StakeClient, storage::Storage,
    },
};
use anyhow::Context;
use log::warn;
use serde::Deserialize;
use tokio::{select, signal::unix::Signal, task};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "resolver")]
    pub resolver_config: resolver::Config,

    #[serde(rename = "pipeline")]
    pub pipeline_config: pipeline::Config,

    #[serde(rename = "dispatcher")]
    pub dispatcher_config: dispatcher::Config,
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: Config,
    api: impl Api,
    chain: impl ChainClient,
    cache: impl DividendCache,
    storage: impl Storage,
    sentiment: impl SentimentClient,
    stake: impl StakeClient,
    mut sigterm: Signal,
) -> anyhow::Result<()> {
    let Config {
        resolver_config,
        pipeline_config,
        dispatcher_config,
    } = config;

    let (dispatcher, workers) = dispatcher::channel(dispatcher_config);
    let resolver = DividendResolver::new(resolver_config, chain, cache, storage.clone());
    let orchestrator = QueryOrchestrator::new(resolver, dispatcher);
    let pipeline = StakeTriggerPipeline::new(pipeline_config, sentiment, stake, storage.clone());

    let stake_trigger_task = task::spawn(workers.run(pipeline));

    let serve_api_task = task::spawn(async move {
        api.serve(orchestrator, storage)
            .await
            .context("serving dividends API")
    });

    select! {
        result = serve_api_task => result
            .context("serve_api_task panicked")
            .and_then(|r| r.context("serve_api_task failed")),

        result = stake_trigger_task => result
            .context("stake_trigger_task panicked")
            .and_then(|_| Err(anyhow::anyhow!("stake_trigger_task completed unexpectedly"))),

        _ = sigterm.recv() => {
            warn!("SIGTERM received");
            Ok(())
        }
    }
}
