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

use crate::domain::DividendKey;
use rust_decimal::Decimal;
use std::{error::Error as StdError, time::Duration};

/// Cache of dividend amounts with a per-entry time to live.
#[trait_variant::make(Send)]
pub trait DividendCache
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Get the amount for the given key unless absent or expired.
    async fn get(&self, key: &DividendKey) -> Result<Option<Decimal>, Self::Error>;

    /// Store the given amount for the given key; it expires after the given TTL.
    async fn set(&self, key: DividendKey, amount: Decimal, ttl: Duration)
    -> Result<(), Self::Error>;
}
