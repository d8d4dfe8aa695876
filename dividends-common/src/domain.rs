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

use derive_more::{Deref, Display, From, Into};
use serde::{Deserialize, Serialize};
use std::{num::ParseIntError, str::FromStr};
use thiserror::Error;

/// Network (subnet) identifier, a.k.a. netuid.
#[derive(
    Debug,
    Display,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    From,
    Into,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct NetUid(pub u16);

impl From<NetUid> for i32 {
    fn from(netuid: NetUid) -> Self {
        netuid.0.into()
    }
}

impl TryFrom<i32> for NetUid {
    type Error = InvalidNetUidError;

    fn try_from(n: i32) -> Result<Self, Self::Error> {
        u16::try_from(n)
            .map(Self)
            .map_err(|_| InvalidNetUidError::OutOfRange(n))
    }
}

impl FromStr for NetUid {
    type Err = InvalidNetUidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u16>().map(Self).map_err(InvalidNetUidError::Parse)
    }
}

#[derive(Debug, Error)]
pub enum InvalidNetUidError {
    #[error("netuid {0} out of range")]
    OutOfRange(i32),

    #[error("cannot parse netuid")]
    Parse(#[source] ParseIntError),
}

/// Public identifier of a participant account, usually an SS58 address.
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Into, Serialize, Deserialize)]
#[deref(forward)]
#[serde(try_from = "String", into = "String")]
pub struct Hotkey(String);

impl TryFrom<String> for Hotkey {
    type Error = InvalidHotkeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.is_empty() {
            Err(InvalidHotkeyError::Empty)
        } else if s.chars().any(|c| !c.is_ascii_alphanumeric()) {
            Err(InvalidHotkeyError::InvalidCharacter(s))
        } else {
            Ok(Self(s))
        }
    }
}

impl TryFrom<&str> for Hotkey {
    type Error = InvalidHotkeyError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.to_owned().try_into()
    }
}

impl FromStr for Hotkey {
    type Err = InvalidHotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.try_into()
    }
}

#[derive(Debug, Error)]
pub enum InvalidHotkeyError {
    #[error("hotkey must not be empty")]
    Empty,

    #[error("hotkey {0} contains non-alphanumeric characters")]
    InvalidCharacter(String),
}
