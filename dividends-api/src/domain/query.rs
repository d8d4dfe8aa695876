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

use crate::domain::{Dividend, DependencyError, ResolveError};
use dividends_common::domain::{Hotkey, NetUid};
use thiserror::Error;

/// Answering dividend queries, optionally triggering sentiment based staking.
#[trait_variant::make(Send)]
pub trait DividendQuery
where
    Self: Clone + Send + Sync + 'static,
{
    /// Resolve the dividends for the given netuid and hotkey; omitted parameters expand to all
    /// known networks or hotkeys. If `trade` is set, a stake trigger is dispatched for every
    /// resolved entry without awaiting its outcome.
    async fn query(
        &self,
        netuid: Option<NetUid>,
        hotkey: Option<Hotkey>,
        trade: bool,
    ) -> Result<Vec<QueryEntry>, QueryError>;
}

/// One entry of a query response.
#[derive(Debug)]
pub struct QueryEntry {
    pub netuid: NetUid,
    pub hotkey: Hotkey,
    pub dividend: Result<Dividend, ResolveError>,
    pub stake_tx_triggered: bool,
}

/// Failure of a query as a whole; per-entry failures are carried by [QueryEntry].
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("cannot expand query parameters")]
    Expansion(#[source] DependencyError),

    #[error("no dividends match the query")]
    NoMatch,

    #[error("cannot resolve any dividend")]
    AllFailed(Vec<QueryEntry>),

    #[error("cannot persist dividend observations")]
    Persistence(#[source] sqlx::Error),
}
