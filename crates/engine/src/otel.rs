// Copyright 2026 The Crucible Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! OpenTelemetry tracer initialization for the engine service
//!
//! Sets up W3C Trace Context propagation and, when
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is set, OTLP span export to an external
//! observability backend. Without the endpoint, spans stay local to the
//! tracing layer.

use anyhow::Result;
use opentelemetry::{global, trace::TracerProvider};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
	propagation::TraceContextPropagator, resource::Resource, trace as sdktrace,
};

/// Service name for OpenTelemetry resource identification
const SERVICE_NAME: &str = "crucible-engine";

/// Initialize the OpenTelemetry tracer.
///
/// Uses `ParentBased(AlwaysOn)` sampling: upstream decisions are
/// respected, new traces are always sampled.
pub fn init_tracer() -> Result<Option<sdktrace::Tracer>> {
	global::set_text_map_propagator(TraceContextPropagator::new());

	let resource = Resource::builder().with_service_name(SERVICE_NAME).build();

	let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();

	let provider_builder = sdktrace::SdkTracerProvider::builder()
		.with_sampler(sdktrace::Sampler::ParentBased(Box::new(
			sdktrace::Sampler::AlwaysOn,
		)))
		.with_resource(resource);

	let provider = if let Some(endpoint) = otlp_endpoint {
		let exporter = opentelemetry_otlp::SpanExporter::builder()
			.with_tonic()
			.with_endpoint(endpoint)
			.build()?;
		provider_builder.with_batch_exporter(exporter).build()
	} else {
		provider_builder.build()
	};

	let tracer = provider.tracer(SERVICE_NAME);
	global::set_tracer_provider(provider);

	Ok(Some(tracer))
}
