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

use dividends_common::domain::{Hotkey, NetUid};
use rust_decimal::Decimal;
use std::error::Error as StdError;

/// Client for the chain query service.
#[trait_variant::make(Send)]
pub trait ChainClient
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Get all registered networks.
    async fn netuids(&self) -> Result<Vec<NetUid>, Self::Error>;

    /// Get all hotkeys registered on the given network.
    async fn hotkeys(&self, netuid: NetUid) -> Result<Vec<Hotkey>, Self::Error>;

    /// Get the dividend for the given network and hotkey; `None` if the chain has no record.
    async fn get_dividend(
        &self,
        netuid: NetUid,
        hotkey: &Hotkey,
    ) -> Result<Option<Decimal>, Self::Error>;
}

#[cfg(test)]
pub mod tests {
    use crate::domain::chain::ChainClient;
    use dividends_common::domain::{Hotkey, NetUid};
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use std::{
        collections::{BTreeMap, HashSet},
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };
    use thiserror::Error;
    use tokio::time::sleep;

    /// Chain client backed by a fixed map of dividends, counting dividend lookups.
    #[derive(Debug, Clone, Default)]
    pub struct MockChainClient {
        dividends: Arc<BTreeMap<(NetUid, Hotkey), Decimal>>,
        hotkeys: Arc<BTreeMap<NetUid, Vec<Hotkey>>>,
        failing: Arc<Mutex<HashSet<Hotkey>>>,
        delay: Option<Duration>,
        dividend_calls: Arc<AtomicUsize>,
    }

    impl MockChainClient {
        pub fn new(dividends: impl IntoIterator<Item = (u16, &'static str, Decimal)>) -> Self {
            let mut map = BTreeMap::new();
            let mut hotkeys = BTreeMap::<NetUid, Vec<Hotkey>>::new();

            for (netuid, hotkey, amount) in dividends {
                let netuid = NetUid(netuid);
                let hotkey = hotkey.parse::<Hotkey>().expect("hotkey is valid");
                hotkeys.entry(netuid).or_default().push(hotkey.clone());
                map.insert((netuid, hotkey), amount);
            }

            Self {
                dividends: Arc::new(map),
                hotkeys: Arc::new(hotkeys),
                ..Default::default()
            }
        }

        /// Register an additional hotkey for the given network without any dividend record.
        pub fn with_hotkey(mut self, netuid: u16, hotkey: &str) -> Self {
            let mut hotkeys = (*self.hotkeys).clone();
            hotkeys
                .entry(NetUid(netuid))
                .or_default()
                .push(hotkey.parse().expect("hotkey is valid"));
            self.hotkeys = Arc::new(hotkeys);
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn fail_for(&self, hotkey: &str) {
            self.failing
                .lock()
                .insert(hotkey.parse().expect("hotkey is valid"));
        }

        pub fn dividend_calls(&self) -> usize {
            self.dividend_calls.load(Ordering::Acquire)
        }
    }

    impl ChainClient for MockChainClient {
        type Error = MockChainError;

        async fn netuids(&self) -> Result<Vec<NetUid>, Self::Error> {
            Ok(self.hotkeys.keys().copied().collect())
        }

        async fn hotkeys(&self, netuid: NetUid) -> Result<Vec<Hotkey>, Self::Error> {
            Ok(self.hotkeys.get(&netuid).cloned().unwrap_or_default())
        }

        async fn get_dividend(
            &self,
            netuid: NetUid,
            hotkey: &Hotkey,
        ) -> Result<Option<Decimal>, Self::Error> {
            self.dividend_calls.fetch_add(1, Ordering::AcqRel);

            if let Some(delay) = self.delay {
                sleep(delay).await;
            }

            if self.failing.lock().contains(hotkey) {
                return Err(MockChainError);
            }

            Ok(self.dividends.get(&(netuid, hotkey.clone())).copied())
        }
    }

    #[derive(Debug, Error)]
    #[error("mock chain failure")]
    pub struct MockChainError;
}
