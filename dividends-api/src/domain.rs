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

pub mod cache;
pub mod chain;
pub mod sentiment;
pub mod stake;
pub mod storage;

mod dividend;
mod error;
mod query;

pub use dividend::*;
pub use error::*;
pub use query::*;

use crate::domain::storage::Storage;
use std::error::Error as StdError;

/// Serving the HTTP surface.
#[trait_variant::make(Send)]
pub trait Api
where
    Self: 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Serve dividend queries via the given [DividendQuery] and listings of persisted records via
    /// the given [Storage].
    async fn serve(self, query: impl DividendQuery, storage: impl Storage)
    -> Result<(), Self::Error>;
}
