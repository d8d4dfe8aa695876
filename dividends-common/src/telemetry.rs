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

use fastrace::collector::Config as CollectorConfig;
use fastrace_opentelemetry::OpenTelemetryReporter;
use log::{info, warn};
use logforth::{
    append::{FastraceEvent, Stdout},
    diagnostic::FastraceDiagnostic,
    filter::env_filter::EnvFilterBuilder,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::InstrumentationScope;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use serde::Deserialize;
use std::{
    borrow::Cow,
    net::{IpAddr, SocketAddr},
};

/// Telemetry config.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "tracing")]
    pub tracing_config: TracingConfig,

    #[serde(rename = "metrics")]
    pub metrics_config: MetricsConfig,
}

/// Tracing config; spans are exported via OTLP if enabled.
#[derive(Debug, Clone, Deserialize)]
pub struct TracingConfig {
    pub enabled: bool,

    pub service_name: String,

    pub otlp_exporter_endpoint: String,
}

/// Metrics config; a Prometheus scrape endpoint is served if enabled.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,

    pub address: IpAddr,

    pub port: u16,
}

/// Initialize logging to stdout, filtered by `RUST_LOG` (default `info`). Log records are also
/// attached as events to the current span.
pub fn init_logging() {
    logforth::starter_log::builder()
        .dispatch(|d| {
            d.filter(EnvFilterBuilder::from_default_env_or("info").build())
                .diagnostic(FastraceDiagnostic::default())
                .append(Stdout::default())
        })
        .dispatch(|d| {
            d.filter(EnvFilterBuilder::from_default_env_or("info").build())
                .append(FastraceEvent::default())
        })
        .apply();
}

/// Initialize tracing: if enabled, report spans to the configured OTLP endpoint.
pub fn init_tracing(config: TracingConfig) {
    let TracingConfig {
        enabled,
        service_name,
        otlp_exporter_endpoint,
    } = config;

    if !enabled {
        return;
    }

    let exporter = match SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&otlp_exporter_endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(error) => {
            warn!(error:%, otlp_exporter_endpoint:%; "cannot build OTLP span exporter, tracing disabled");
            return;
        }
    };

    let reporter = OpenTelemetryReporter::new(
        exporter,
        Cow::Owned(Resource::builder().with_service_name(service_name).build()),
        InstrumentationScope::builder(env!("CARGO_PKG_NAME"))
            .with_version(env!("CARGO_PKG_VERSION"))
            .build(),
    );
    fastrace::set_reporter(reporter, CollectorConfig::default());

    info!(otlp_exporter_endpoint:%; "tracing initialized");
}

/// Initialize metrics: if enabled, serve a Prometheus scrape endpoint.
pub fn init_metrics(config: MetricsConfig) {
    let MetricsConfig {
        enabled,
        address,
        port,
    } = config;

    if !enabled {
        return;
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::new(address, port))
        .install()
        .expect("Prometheus exporter can be installed");

    info!(address:?, port; "metrics initialized");
}

#[cfg(test)]
mod tests {
    use crate::telemetry::{MetricsConfig, TracingConfig, init_logging, init_metrics, init_tracing};
    use log::info;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_init() {
        init_logging();
        info!(answer = 42; "logging initialized");

        init_tracing(TracingConfig {
            enabled: false,
            service_name: "dividends-api".to_owned(),
            otlp_exporter_endpoint: "http://localhost:4317".to_owned(),
        });
        init_metrics(MetricsConfig {
            enabled: false,
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 9000,
        });
    }
}
