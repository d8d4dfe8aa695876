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

use crate::domain::{DividendObservation, SentimentStakeOperation, StakeOutcome};
use chrono::{DateTime, Utc};
use dividends_common::domain::{Hotkey, NetUid};

/// Storage abstraction for dividend observations and sentiment stake operations.
#[trait_variant::make(Send)]
pub trait Storage
where
    Self: Clone + Send + Sync + 'static,
{
    /// Check that the storage is reachable.
    async fn ping(&self) -> Result<(), sqlx::Error>;

    /// Save the given dividend observations atomically.
    async fn save_dividend_observations(
        &self,
        observations: &[DividendObservation],
    ) -> Result<(), sqlx::Error>;

    /// Get all dividend observations in insertion order.
    async fn get_dividend_observations(&self) -> Result<Vec<DividendObservation>, sqlx::Error>;

    /// Create a pending sentiment stake operation, returning its ID.
    async fn create_stake_operation(
        &self,
        netuid: NetUid,
        hotkey: &Hotkey,
        created_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error>;

    /// Apply the given terminal outcome to the pending operation with the given ID. Returns
    /// `false` if there is no such pending operation, leaving terminal operations unchanged.
    async fn finish_stake_operation(
        &self,
        id: i64,
        outcome: &StakeOutcome,
    ) -> Result<bool, sqlx::Error>;

    /// Get all sentiment stake operations in insertion order.
    async fn get_stake_operations(&self) -> Result<Vec<SentimentStakeOperation>, sqlx::Error>;
}
