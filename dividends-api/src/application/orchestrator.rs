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
    application::{
        dispatcher::StakeTriggerDispatcher, pipeline::StakeTrigger, resolver::DividendResolver,
    },
    domain::{
        DividendQuery, QueryEntry, QueryError, cache::DividendCache, chain::ChainClient,
        storage::Storage,
    },
};
use dividends_common::domain::{Hotkey, NetUid};
use fastrace::trace;

/// Answers dividend queries by resolving dividends and, if requested, dispatching a stake trigger
/// per resolved dividend. Never waits for the triggered pipelines.
#[derive(Debug, Clone)]
pub struct QueryOrchestrator<Q, C, S> {
    resolver: DividendResolver<Q, C, S>,
    dispatcher: StakeTriggerDispatcher,
}

impl<Q, C, S> QueryOrchestrator<Q, C, S> {
    pub fn new(resolver: DividendResolver<Q, C, S>, dispatcher: StakeTriggerDispatcher) -> Self {
        Self {
            resolver,
            dispatcher,
        }
    }
}

impl<Q, C, S> DividendQuery for QueryOrchestrator<Q, C, S>
where
    Q: ChainClient,
    C: DividendCache,
    S: Storage,
{
    #[trace(properties = { "trade": "{trade}" })]
    async fn query(
        &self,
        netuid: Option<NetUid>,
        hotkey: Option<Hotkey>,
        trade: bool,
    ) -> Result<Vec<QueryEntry>, QueryError> {
        let dividends = self.resolver.resolve(netuid, hotkey).await?;

        if dividends.is_empty() {
            return Err(QueryError::NoMatch);
        }

        let all_failed = dividends.iter().all(|(_, dividend)| dividend.is_err());

        let entries = dividends
            .into_iter()
            .map(|(key, dividend)| {
                let stake_tx_triggered = match &dividend {
                    Ok(dividend) if trade && !all_failed => {
                        self.dispatcher.dispatch(StakeTrigger {
                            key: key.clone(),
                            dividend: dividend.amount,
                        })
                    }

                    _ => false,
                };

                QueryEntry {
                    netuid: key.netuid,
                    hotkey: key.hotkey,
                    dividend,
                    stake_tx_triggered,
                }
            })
            .collect::<Vec<_>>();

        if all_failed {
            Err(QueryError::AllFailed(entries))
        } else {
            Ok(entries)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        application::{
            dispatcher::{self, channel},
            orchestrator::QueryOrchestrator,
            pipeline::{self, StakeTriggerPipeline},
            resolver::{self, DividendResolver},
        },
        domain::{
            DividendQuery, QueryEntry, QueryError, ResolveError, StakeStatus,
            chain::tests::MockChainClient, sentiment::tests::MockSentimentClient,
            stake::tests::MockStakeClient, storage::tests::InMemStorage,
        },
        infra::cache::InMemDividendCache,
    };
    use assert_matches::assert_matches;
    use dividends_common::domain::NetUid;
    use rust_decimal::Decimal;
    use std::{num::NonZeroUsize, sync::Arc, time::Duration};
    use tokio::{sync::Notify, task, time::sleep};

    fn make_orchestrator(
        chain: MockChainClient,
        storage: InMemStorage,
        queue_capacity: NonZeroUsize,
    ) -> (
        QueryOrchestrator<MockChainClient, InMemDividendCache, InMemStorage>,
        dispatcher::StakeTriggerWorkers,
    ) {
        let resolver = DividendResolver::new(
            resolver::tests::config(),
            chain,
            InMemDividendCache::default(),
            storage,
        );
        let (dispatcher, workers) = channel(dispatcher::Config {
            queue_capacity,
            workers: NonZeroUsize::MIN,
        });

        (QueryOrchestrator::new(resolver, dispatcher), workers)
    }

    #[tokio::test]
    async fn test_query_without_trade() {
        let chain = MockChainClient::new([(18, "5Fa", Decimal::ONE)]);
        let (orchestrator, _workers) =
            make_orchestrator(chain, InMemStorage::default(), NonZeroUsize::MIN);

        let entries = orchestrator
            .query(Some(NetUid(18)), Some("5Fa".parse().expect("hotkey is valid")), false)
            .await;
        assert_matches!(
            entries.as_deref(),
            Ok([QueryEntry { stake_tx_triggered: false, dividend: Ok(_), .. }])
        );
    }

    #[tokio::test]
    async fn test_query_with_trade_does_not_wait() {
        let chain = MockChainClient::new([(18, "5Fa", Decimal::ONE)]);
        let storage = InMemStorage::default();
        let (orchestrator, workers) =
            make_orchestrator(chain, storage.clone(), NonZeroUsize::MIN.saturating_add(1));

        let gate = Arc::new(Notify::new());
        let pipeline = StakeTriggerPipeline::new(
            pipeline::tests::config(),
            MockSentimentClient::gated(Some(42), gate.clone()),
            MockStakeClient::default(),
            storage.clone(),
        );
        task::spawn(workers.run(pipeline));

        let entries = orchestrator
            .query(Some(NetUid(18)), Some("5Fa".parse().expect("hotkey is valid")), true)
            .await;
        assert_matches!(
            entries.as_deref(),
            Ok([QueryEntry { stake_tx_triggered: true, dividend: Ok(_), .. }])
        );

        // The pipeline is blocked on the sentiment call, hence nothing is completed yet.
        assert!(
            storage
                .operations()
                .iter()
                .all(|o| o.status == StakeStatus::Pending)
        );

        gate.notify_one();
        for _ in 0..100 {
            if storage
                .operations()
                .iter()
                .any(|o| o.status == StakeStatus::Completed)
            {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_matches!(
            storage.operations().as_slice(),
            [operation] if operation.status == StakeStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_query_queue_full() {
        let chain = MockChainClient::new([(18, "5Fa", Decimal::ONE), (18, "5Fb", Decimal::TWO)]);
        let (orchestrator, _workers) =
            make_orchestrator(chain, InMemStorage::default(), NonZeroUsize::MIN);

        let entries = orchestrator
            .query(Some(NetUid(18)), None, true)
            .await
            .expect("query succeeds");
        let triggered = entries
            .iter()
            .map(|entry| entry.stake_tx_triggered)
            .collect::<Vec<_>>();
        assert_eq!(triggered, [true, false]);
    }

    #[tokio::test]
    async fn test_query_failures() {
        let chain = MockChainClient::new([(18, "5Fa", Decimal::ONE)]).with_hotkey(18, "5Fb");
        let (orchestrator, _workers) =
            make_orchestrator(chain, InMemStorage::default(), NonZeroUsize::MIN);

        let entries = orchestrator.query(Some(NetUid(99)), None, true).await;
        assert_matches!(entries, Err(QueryError::NoMatch));

        let entries = orchestrator
            .query(Some(NetUid(18)), Some("5Fb".parse().expect("hotkey is valid")), true)
            .await;
        assert_matches!(
            entries,
            Err(QueryError::AllFailed(entries)) if matches!(
                entries.as_slice(),
                [QueryEntry { stake_tx_triggered: false, dividend: Err(ResolveError::NotFound(..)), .. }]
            )
        );

        let storage = InMemStorage::default();
        storage.set_unavailable(true);
        let chain = MockChainClient::new([(18, "5Fa", Decimal::ONE)]);
        let (orchestrator, _workers) = make_orchestrator(chain, storage, NonZeroUsize::MIN);
        let entries = orchestrator
            .query(Some(NetUid(18)), Some("5Fa".parse().expect("hotkey is valid")), true)
            .await;
        assert_matches!(entries, Err(QueryError::Persistence(_)));
    }
}
