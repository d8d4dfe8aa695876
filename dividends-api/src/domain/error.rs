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

use derive_more::Display;
use dividends_common::{
    domain::{Hotkey, NetUid},
    error::BoxError,
};
use std::{error::Error as StdError, time::Duration};
use thiserror::Error;
use tokio::time::timeout;

/// External dependencies called by this service.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    #[display("chain query")]
    ChainQuery,

    #[display("sentiment")]
    Sentiment,

    #[display("stake")]
    Stake,
}

/// Failure of a call to an external [Dependency].
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("{dependency} call timed out after {timeout:?}")]
    Timeout {
        dependency: Dependency,
        timeout: Duration,
    },

    #[error("{dependency} call failed")]
    Failed {
        dependency: Dependency,
        #[source]
        source: BoxError,
    },
}

impl DependencyError {
    pub fn dependency(&self) -> Dependency {
        match self {
            Self::Timeout { dependency, .. } | Self::Failed { dependency, .. } => *dependency,
        }
    }
}

/// Await the given call to the given dependency, failing with [DependencyError::Timeout] if it
/// does not finish within the given duration.
pub async fn call_dependency<F, T, E>(
    dependency: Dependency,
    duration: Duration,
    call: F,
) -> Result<T, DependencyError>
where
    F: Future<Output = Result<T, E>>,
    E: StdError + Send + Sync + 'static,
{
    match timeout(duration, call).await {
        Ok(Ok(value)) => Ok(value),

        Ok(Err(error)) => Err(DependencyError::Failed {
            dependency,
            source: error.into(),
        }),

        Err(_) => Err(DependencyError::Timeout {
            dependency,
            timeout: duration,
        }),
    }
}

/// Per-entry failure to resolve a dividend.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot resolve dividend")]
    Dependency(#[from] DependencyError),

    #[error("no dividend for netuid {0} and hotkey {1}")]
    NotFound(NetUid, Hotkey),
}
