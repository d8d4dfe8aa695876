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

use crate::domain::{StakeOperation, sentiment::SentimentScore};
use derive_more::Display;
use dividends_common::domain::{Hotkey, NetUid};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::error::Error as StdError;

/// Direction of a stake transaction.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum StakeDirection {
    #[display("stake")]
    Stake,

    #[display("unstake")]
    Unstake,
}

impl From<StakeDirection> for StakeOperation {
    fn from(direction: StakeDirection) -> Self {
        match direction {
            StakeDirection::Stake => StakeOperation::Stake,
            StakeDirection::Unstake => StakeOperation::Unstake,
        }
    }
}

/// Thresholds and sizing for turning a sentiment score into a stake decision.
#[derive(Debug, Clone, Deserialize)]
pub struct StakeRule {
    /// Scores above this threshold stake.
    #[serde(default)]
    pub stake_threshold: u32,

    /// Scores below the negated threshold unstake.
    #[serde(default)]
    pub unstake_threshold: u32,

    /// Amount in TAO per score point.
    #[serde(default = "amount_per_point_default")]
    pub amount_per_point: Decimal,
}

impl Default for StakeRule {
    fn default() -> Self {
        Self {
            stake_threshold: 0,
            unstake_threshold: 0,
            amount_per_point: amount_per_point_default(),
        }
    }
}

fn amount_per_point_default() -> Decimal {
    Decimal::new(1, 1)
}

/// Outcome of applying a [StakeRule] to a score. The amount is an unsigned magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeDecision {
    pub direction: Option<StakeDirection>,
    pub amount: Decimal,
}

impl StakeDecision {
    pub fn operation(&self) -> StakeOperation {
        self.direction
            .map(StakeOperation::from)
            .unwrap_or(StakeOperation::None)
    }
}

impl StakeRule {
    pub fn decide(&self, score: SentimentScore) -> StakeDecision {
        let score = score.value();

        let direction = if i64::from(score) > i64::from(self.stake_threshold) {
            Some(StakeDirection::Stake)
        } else if i64::from(score) < -i64::from(self.unstake_threshold) {
            Some(StakeDirection::Unstake)
        } else {
            None
        };

        let amount = match direction {
            Some(_) => self.amount_per_point * Decimal::from(score.unsigned_abs()),
            None => Decimal::ZERO,
        };

        StakeDecision { direction, amount }
    }
}

/// Client for submitting stake transactions.
#[trait_variant::make(Send)]
pub trait StakeClient
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Submit a stake transaction, returning its transaction reference.
    async fn submit(
        &self,
        netuid: NetUid,
        hotkey: &Hotkey,
        direction: StakeDirection,
        amount: Decimal,
    ) -> Result<String, Self::Error>;
}
