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

use crate::domain::{DividendKey, cache::DividendCache};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::time::Instant;

/// In-memory [DividendCache]; expired entries are evicted when read.
#[derive(Debug, Clone, Default)]
pub struct InMemDividendCache {
    entries: Arc<DashMap<DividendKey, Entry>>,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    amount: Decimal,
    expires_at: Instant,
}

impl InMemDividendCache {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DividendCache for InMemDividendCache {
    type Error = Infallible;

    async fn get(&self, key: &DividendKey) -> Result<Option<Decimal>, Self::Error> {
        let now = Instant::now();

        // The read guard must be released before a potential removal.
        let entry = self.entries.get(key).map(|entry| *entry);

        match entry {
            Some(Entry { amount, expires_at }) if now < expires_at => Ok(Some(amount)),

            Some(_) => {
                self.entries
                    .remove_if(key, |_, entry| entry.expires_at <= now);
                Ok(None)
            }

            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: DividendKey,
        amount: Decimal,
        ttl: Duration,
    ) -> Result<(), Self::Error> {
        if ttl.is_zero() {
            self.entries.remove(&key);
        } else {
            let expires_at = Instant::now() + ttl;
            self.entries.insert(key, Entry { amount, expires_at });
        }

        Ok(())
    }
}
