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

#[tokio::main]
async fn main() {
    use dividends_common::telemetry;
    use log::error;
    use std::panic;

    telemetry::init_logging();
    panic::set_hook(Box::new(|panic| error!(panic:%; "process panicked")));

    if let Err(error) = run().await {
        let backtrace = error.backtrace();
        let error = format!("{error:#}");
        error!(error, backtrace:%; "process exited with ERROR");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    use anyhow::Context;
    use dividends_api::{
        application,
        config::Config,
        infra::{
            self, api::AxumApi, cache::InMemDividendCache, chain::HttpChainClient,
            sentiment::LlmSentimentClient, stake::HttpStakeClient, storage::PostgresStorage,
        },
    };
    use dividends_common::{
        config::ConfigExt,
        infra::{migrations, pool::postgres::PostgresPool},
        telemetry,
    };
    use log::info;
    use tokio::signal::unix::{SignalKind, signal};

    let sigterm = signal(SignalKind::terminate()).context("register SIGTERM handler")?;

    let config = Config::load().context("load configuration")?;
    info!(config:?; "starting");
    let Config {
        run_migrations,
        application_config,
        infra_config,
        telemetry_config:
            telemetry::Config {
                tracing_config,
                metrics_config,
            },
    } = config;

    telemetry::init_tracing(tracing_config);
    telemetry::init_metrics(metrics_config);

    let infra::Config {
        api_config,
        storage_config,
        chain_config,
        sentiment_config,
        stake_config,
    } = infra_config;

    let pool = PostgresPool::new(storage_config)
        .await
        .context("create DB pool for Postgres")?;
    if run_migrations {
        migrations::postgres::run(&pool)
            .await
            .context("run Postgres migrations")?;
    }
    let storage = PostgresStorage::new(pool);

    let chain = HttpChainClient::new(chain_config).context("create chain client")?;
    let sentiment =
        LlmSentimentClient::new(sentiment_config).context("create sentiment client")?;
    let stake = HttpStakeClient::new(stake_config).context("create stake client")?;
    let cache = InMemDividendCache::default();
    let api = AxumApi::new(api_config);

    application::run(
        application_config,
        api,
        chain,
        cache,
        storage,
        sentiment,
        stake,
        sigterm,
    )
    .await
    .context("run dividends API application")
}
