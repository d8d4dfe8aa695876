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

use derive_more::{Display, Into};
use dividends_common::domain::{Hotkey, NetUid};
use std::error::Error as StdError;
use thiserror::Error;

/// Sentiment score within -100..=100.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Into)]
pub struct SentimentScore(i32);

impl SentimentScore {
    pub const MAX: i32 = 100;
    pub const MIN: i32 = -100;

    pub fn value(self) -> i32 {
        self.0
    }
}

impl TryFrom<i64> for SentimentScore {
    type Error = ScoreOutOfRangeError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        i32::try_from(n)
            .ok()
            .filter(|n| (Self::MIN..=Self::MAX).contains(n))
            .map(Self)
            .ok_or(ScoreOutOfRangeError(n))
    }
}

#[derive(Debug, Error)]
#[error("sentiment score {0} not within -100..=100")]
pub struct ScoreOutOfRangeError(pub i64);

/// Client for scoring the recent sentiment about a network.
#[trait_variant::make(Send)]
pub trait SentimentClient
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    async fn score(&self, netuid: NetUid, hotkey: &Hotkey) -> Result<SentimentScore, Self::Error>;
}
