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

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;
use std::env;

const CONFIG_FILE: &str = "CONFIG_FILE";
const CONFIG_FILE_DEFAULT: &str = "config.yaml";
const ENV_PREFIX: &str = "APP__";

/// Extension methods for configuration types.
pub trait ConfigExt
where
    Self: for<'de> Deserialize<'de>,
{
    /// Load the configuration from the YAML file at `$CONFIG_FILE` (default `config.yaml`),
    /// overridden by environment variables prefixed with `APP__` where nested keys are separated
    /// by `__`, e.g. `APP__INFRA__API__PORT`.
    fn load() -> Result<Self, Box<figment::Error>> {
        let config_file = env::var(CONFIG_FILE).unwrap_or_else(|_| CONFIG_FILE_DEFAULT.to_owned());

        Figment::new()
            .merge(Yaml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
    }
}

impl<T> ConfigExt for T where T: for<'de> Deserialize<'de> {}
