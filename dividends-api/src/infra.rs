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

pub mod api;
pub mod cache;
pub mod chain;
pub mod sentiment;
pub mod stake;
pub mod storage;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "api")]
    pub api_config: api::Config,

    #[serde(rename = "storage")]
    pub storage_config: dividends_common::infra::pool::postgres::Config,

    #[serde(rename = "chain")]
    pub chain_config: chain::Config,

    #[serde(rename = "sentiment")]
    pub sentiment_config: sentiment::Config,

    #[serde(rename = "stake")]
    pub stake_config: stake::Config,
}
