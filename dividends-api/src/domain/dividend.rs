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

use chrono::{DateTime, Utc};
use derive_more::Display;
use dividends_common::domain::{Hotkey, NetUid};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;

/// Key of a dividend: the pair of network and hotkey.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
#[display("{netuid}/{hotkey}")]
pub struct DividendKey {
    pub netuid: NetUid,
    pub hotkey: Hotkey,
}

impl DividendKey {
    pub fn new(netuid: NetUid, hotkey: Hotkey) -> Self {
        Self { netuid, hotkey }
    }
}

/// A resolved dividend amount and whether it was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dividend {
    pub amount: Decimal,
    pub cached: bool,
}

/// A persisted record of a resolved dividend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DividendObservation {
    #[serde(rename = "network_id")]
    pub netuid: NetUid,

    pub hotkey: Hotkey,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    pub observed_at: DateTime<Utc>,
}

/// The kind of a stake operation; `None` if the sentiment did not warrant any action.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeOperation {
    #[display("stake")]
    Stake,

    #[display("unstake")]
    Unstake,

    #[display("none")]
    None,
}

impl FromStr for StakeOperation {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stake" => Ok(Self::Stake),
            "unstake" => Ok(Self::Unstake),
            "none" => Ok(Self::None),
            other => Err(UnknownVariantError("stake operation", other.to_owned())),
        }
    }
}

/// Lifecycle state of a [SentimentStakeOperation]: `Pending` transitions exactly once into either
/// `Completed` or `Failed`.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeStatus {
    #[display("pending")]
    Pending,

    #[display("completed")]
    Completed,

    #[display("failed")]
    Failed,
}

impl StakeStatus {
    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

impl FromStr for StakeStatus {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownVariantError("stake status", other.to_owned())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown {0} {1}")]
pub struct UnknownVariantError(&'static str, String);

/// A persisted record of one run of the stake trigger pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentimentStakeOperation {
    pub id: i64,

    #[serde(rename = "network_id")]
    pub netuid: NetUid,

    pub hotkey: Hotkey,

    pub sentiment_score: Option<i32>,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    pub transaction_reference: Option<String>,

    pub operation: StakeOperation,

    pub status: StakeStatus,

    pub created_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,
}

/// Terminal outcome of a pipeline run, applied to a pending [SentimentStakeOperation].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeOutcome {
    pub sentiment_score: Option<i32>,
    pub operation: StakeOperation,
    pub amount: Decimal,
    pub transaction_reference: Option<String>,
    pub status: StakeStatus,
    pub completed_at: DateTime<Utc>,
}

impl StakeOutcome {
    pub fn completed(
        sentiment_score: i32,
        operation: StakeOperation,
        amount: Decimal,
        transaction_reference: Option<String>,
    ) -> Self {
        Self {
            sentiment_score: Some(sentiment_score),
            operation,
            amount,
            transaction_reference,
            status: StakeStatus::Completed,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(sentiment_score: Option<i32>, operation: StakeOperation, amount: Decimal) -> Self {
        Self {
            sentiment_score,
            operation,
            amount,
            transaction_reference: None,
            status: StakeStatus::Failed,
            completed_at: Utc::now(),
        }
    }
}
