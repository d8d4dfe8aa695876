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

use crate::{
    application::pipeline::{StakeTrigger, StakeTriggerPipeline},
    domain::{sentiment::SentimentClient, stake::StakeClient, storage::Storage},
};
use futures::StreamExt;
use log::{info, warn};
use metrics::{Counter, counter};
use serde::Deserialize;
use std::num::NonZeroUsize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub queue_capacity: NonZeroUsize,

    pub workers: NonZeroUsize,
}

/// Create a connected [StakeTriggerDispatcher] and [StakeTriggerWorkers] pair.
pub fn channel(config: Config) -> (StakeTriggerDispatcher, StakeTriggerWorkers) {
    let Config {
        queue_capacity,
        workers,
    } = config;

    let (sender, receiver) = mpsc::channel(queue_capacity.get());

    let dispatcher = StakeTriggerDispatcher {
        sender,
        dispatched: counter!("dividends_stake_triggers", "result" => "dispatched"),
        rejected: counter!("dividends_stake_triggers", "result" => "rejected"),
    };
    let workers = StakeTriggerWorkers { receiver, workers };

    (dispatcher, workers)
}

/// Enqueues stake triggers without waiting for their execution.
#[derive(Debug, Clone)]
pub struct StakeTriggerDispatcher {
    sender: mpsc::Sender<StakeTrigger>,
    dispatched: Counter,
    rejected: Counter,
}

impl StakeTriggerDispatcher {
    /// Enqueue the given trigger; returns `false` if it was rejected because the queue is full or
    /// the workers are gone.
    pub fn dispatch(&self, trigger: StakeTrigger) -> bool {
        match self.sender.try_send(trigger) {
            Ok(()) => {
                self.dispatched.increment(1);
                true
            }

            Err(TrySendError::Full(trigger)) => {
                self.rejected.increment(1);
                warn!(key:% = trigger.key; "stake trigger queue full, trigger dropped");
                false
            }

            Err(TrySendError::Closed(trigger)) => {
                self.rejected.increment(1);
                warn!(key:% = trigger.key; "stake trigger workers gone, trigger dropped");
                false
            }
        }
    }
}

/// Bounded pool of workers running the [StakeTriggerPipeline] for enqueued triggers.
#[derive(Debug)]
pub struct StakeTriggerWorkers {
    receiver: mpsc::Receiver<StakeTrigger>,
    workers: NonZeroUsize,
}

impl StakeTriggerWorkers {
    /// Run the given pipeline for each enqueued trigger with at most the configured number of
    /// concurrent runs. Completes once all dispatchers are dropped and the queue is drained.
    pub async fn run<M, K, S>(self, pipeline: StakeTriggerPipeline<M, K, S>)
    where
        M: SentimentClient,
        K: StakeClient,
        S: Storage,
    {
        let Self { receiver, workers } = self;

        info!(workers = workers.get(); "stake trigger workers started");

        ReceiverStream::new(receiver)
            .for_each_concurrent(Some(workers.get()), |trigger| {
                let pipeline = pipeline.clone();
                async move {
                    pipeline.run(trigger).await;
                }
            })
            .await;

        warn!("stake trigger workers completed");
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        application::{
            dispatcher::{Config, channel},
            pipeline::{
                StakeTriggerPipeline,
                tests::{config, trigger},
            },
        },
        domain::{
            StakeStatus, sentiment::tests::MockSentimentClient, stake::tests::MockStakeClient,
            storage::tests::InMemStorage,
        },
    };
    use std::num::NonZeroUsize;

    #[tokio::test]
    async fn test_dispatch_full_queue() {
        let (dispatcher, workers) = channel(Config {
            queue_capacity: NonZeroUsize::MIN,
            workers: NonZeroUsize::MIN,
        });

        assert!(dispatcher.dispatch(trigger(1, "5Fa")));
        assert!(!dispatcher.dispatch(trigger(1, "5Fb")));

        drop(workers);
        assert!(!dispatcher.dispatch(trigger(1, "5Fc")));
    }

    #[tokio::test]
    async fn test_run_drains_queue() {
        let storage = InMemStorage::default();
        let stake = MockStakeClient::default();
        let pipeline = StakeTriggerPipeline::new(
            config(),
            MockSentimentClient::new(Some(10)),
            stake.clone(),
            storage.clone(),
        );

        let (dispatcher, workers) = channel(Config {
            queue_capacity: NonZeroUsize::MIN.saturating_add(9),
            workers: NonZeroUsize::MIN.saturating_add(1),
        });

        for hotkey in ["5Fa", "5Fb", "5Fc"] {
            assert!(dispatcher.dispatch(trigger(1, hotkey)));
        }
        drop(dispatcher);

        workers.run(pipeline).await;

        let operations = storage.operations();
        assert_eq!(operations.len(), 3);
        assert!(operations.iter().all(|o| o.status == StakeStatus::Completed));
        assert_eq!(stake.submissions().len(), 3);
    }
}
