// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use opentelemetry::global;
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{
    metrics::{PeriodicReader, SdkMeterProvider},
    Resource,
};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::TelemetryConfig;

fn build_otlp_exporter(
    endpoint: &str,
    headers: &HashMap<String, String>,
) -> Result<opentelemetry_otlp::MetricExporter, Box<dyn std::error::Error>> {
    let mut exporter_builder = opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(10));

    if !headers.is_empty() {
        tracing::info!(count = headers.len(), "Adding custom headers to OTLP exporter");
        exporter_builder = exporter_builder.with_headers(headers.clone());
    }

    exporter_builder.build().map_err(|e| {
        tracing::error!(error = %e, "Failed to build OTLP metrics exporter");
        e.into()
    })
}

/// Installs the global meter provider, exporting over OTLP/HTTP when an endpoint is set.
///
/// The returned provider must be kept alive for as long as metrics should flow.
///
/// # Errors
///
/// Returns an error if the OTLP metrics exporter fails to build.
pub fn init_metrics(
    config: &TelemetryConfig,
) -> Result<SdkMeterProvider, Box<dyn std::error::Error>> {
    let resource = Resource::builder_empty()
        .with_attributes([
            opentelemetry::KeyValue::new("service.name", "hapcam"),
            opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let builder = SdkMeterProvider::builder().with_resource(resource);

    let provider = if let Some(endpoint) = &config.otlp_endpoint {
        tracing::info!(endpoint = %endpoint, "Configuring OTLP metrics exporter");
        let exporter = build_otlp_exporter(endpoint, &config.otlp_headers)?;
        let reader = PeriodicReader::builder(exporter).with_interval(Duration::from_secs(5)).build();
        builder.with_reader(reader).build()
    } else {
        tracing::info!("No OTLP endpoint configured, metrics will be collected but not exported");
        builder.build()
    };

    global::set_meter_provider(provider.clone());
    Ok(provider)
}
