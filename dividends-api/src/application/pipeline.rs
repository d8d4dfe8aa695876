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
    Dependency, DividendKey, StakeOperation, StakeOutcome, StakeStatus, call_dependency,
    sentiment::SentimentClient,
    stake::{StakeClient, StakeRule},
    storage::Storage,
};
use chrono::Utc;
use dashmap::DashMap;
use dividends_common::error::StdErrorExt;
use fastrace::trace;
use log::{debug, error, info, warn};
use metrics::{Counter, counter};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub stake_rule: StakeRule,

    #[serde(with = "humantime_serde")]
    pub sentiment_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub stake_timeout: Duration,

    /// Serialize pipeline runs for the same netuid and hotkey.
    #[serde(default = "serialize_per_hotkey_default")]
    pub serialize_per_hotkey: bool,
}

/// Request to run the [StakeTriggerPipeline] for a resolved dividend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeTrigger {
    pub key: DividendKey,
    pub dividend: Decimal,
}

/// Scores the sentiment for a network, decides whether to stake or unstake and submits the
/// corresponding transaction. Every run is recorded as a sentiment stake operation which is
/// created pending and ends up either completed or failed.
#[derive(Debug, Clone)]
pub struct StakeTriggerPipeline<M, K, S> {
    config: Config,
    sentiment: M,
    stake: K,
    storage: S,
    // Per key semaphore of one to serialize concurrent runs for the same key.
    locks: Arc<DashMap<DividendKey, Arc<Semaphore>>>,
    completed: Counter,
    failed: Counter,
}

impl<M, K, S> StakeTriggerPipeline<M, K, S>
where
    M: SentimentClient,
    K: StakeClient,
    S: Storage,
{
    pub fn new(config: Config, sentiment: M, stake: K, storage: S) -> Self {
        let completed = counter!("dividends_stake_operations", "status" => "completed");
        let failed = counter!("dividends_stake_operations", "status" => "failed");

        Self {
            config,
            sentiment,
            stake,
            storage,
            locks: Default::default(),
            completed,
            failed,
        }
    }

    /// Run the pipeline for the given trigger, returning the terminal outcome if the operation
    /// could be recorded. Failures never propagate; they are logged and recorded instead.
    #[trace(properties = { "trigger": "{trigger:?}" })]
    pub async fn run(&self, trigger: StakeTrigger) -> Option<StakeOutcome> {
        if !self.config.serialize_per_hotkey {
            return self.execute(trigger).await;
        }

        let key = trigger.key.clone();
        let semaphore = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone();
        let permit = semaphore.acquire_owned().await.ok();

        let outcome = self.execute(trigger).await;

        // Only the map holds the semaphore once no run for the key is in flight or waiting.
        drop(permit);
        self.locks
            .remove_if(&key, |_, semaphore| Arc::strong_count(semaphore) == 1);

        outcome
    }

    async fn execute(&self, trigger: StakeTrigger) -> Option<StakeOutcome> {
        let StakeTrigger { key, dividend } = trigger;

        let id = match self
            .storage
            .create_stake_operation(key.netuid, &key.hotkey, Utc::now())
            .await
        {
            Ok(id) => id,

            Err(error) => {
                error!(key:%, error = error.as_chain(); "cannot create stake operation");
                self.failed.increment(1);
                return None;
            }
        };

        let outcome = self.decide_and_submit(&key).await;

        match self.storage.finish_stake_operation(id, &outcome).await {
            Ok(true) => {}

            Ok(false) => warn!(id, key:%; "stake operation not pending anymore"),

            Err(error) => {
                error!(id, key:%, error = error.as_chain(); "cannot finish stake operation")
            }
        }

        match outcome.status {
            StakeStatus::Completed => self.completed.increment(1),
            _ => self.failed.increment(1),
        }

        info!(
            id,
            key:%,
            dividend:%,
            sentiment_score:? = outcome.sentiment_score,
            operation:% = outcome.operation,
            amount:% = outcome.amount,
            status:% = outcome.status;
            "stake operation finished"
        );

        Some(outcome)
    }

    async fn decide_and_submit(&self, key: &DividendKey) -> StakeOutcome {
        let score = call_dependency(
            Dependency::Sentiment,
            self.config.sentiment_timeout,
            self.sentiment.score(key.netuid, &key.hotkey),
        )
        .await;

        let score = match score {
            Ok(score) => score,

            Err(error) => {
                warn!(key:%, error = error.as_chain(); "cannot score sentiment");
                return StakeOutcome::failed(None, StakeOperation::None, Decimal::ZERO);
            }
        };

        let decision = self.config.stake_rule.decide(score);
        debug!(key:%, score:%, decision:?; "stake decided");

        let Some(direction) = decision.direction else {
            return StakeOutcome::completed(
                score.value(),
                StakeOperation::None,
                decision.amount,
                None,
            );
        };

        let transaction_reference = call_dependency(
            Dependency::Stake,
            self.config.stake_timeout,
            self.stake
                .submit(key.netuid, &key.hotkey, direction, decision.amount),
        )
        .await;

        match transaction_reference {
            Ok(transaction_reference) => StakeOutcome::completed(
                score.value(),
                direction.into(),
                decision.amount,
                Some(transaction_reference),
            ),

            Err(error) => {
                warn!(
                    key:%,
                    direction:%,
                    error = error.as_chain();
                    "cannot submit stake transaction"
                );
                StakeOutcome::failed(Some(score.value()), direction.into(), decision.amount)
            }
        }
    }
}

fn serialize_per_hotkey_default() -> bool {
    true
}
