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

//! Logging initialization for the engine service
//!
//! Console logging is always on (stderr). Setting `LOG_DIR` additionally
//! writes daily-rolling files `{LOG_DIR}/engine/engine.YYYY-MM-DD.log`
//! through a non-blocking appender. `RUST_LOG` controls the filter
//! (default `info`). When an OTLP endpoint is configured (see
//! [`crate::otel`]), spans are exported through the OpenTelemetry layer.

use std::env;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing_appender::{
	non_blocking,
	rolling::{self, Rotation},
};
use tracing_subscriber::{
	EnvFilter, fmt, layer::SubscriberExt, registry::Registry, util::SubscriberInitExt,
};

use crate::otel;

const LOG_COMPONENT_NAME: &str = "engine";
const DEFAULT_LOG_LEVEL: &str = "info";

// Keeps the non-blocking writer alive for the process lifetime so buffered
// records are not lost on exit.
static LOG_GUARD: OnceLock<non_blocking::WorkerGuard> = OnceLock::new();

/// Set up daily-rolling file logging under `{log_dir}/engine/`.
fn setup_file_logging(log_dir: &Path) -> Result<non_blocking::NonBlocking> {
	std::fs::create_dir_all(log_dir)
		.with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

	let file_appender = rolling::RollingFileAppender::builder()
		.rotation(Rotation::DAILY)
		.filename_prefix(LOG_COMPONENT_NAME.to_string())
		.filename_suffix("log")
		.build(log_dir)
		.with_context(|| {
			format!(
				"failed to create rolling file appender in {}",
				log_dir.display()
			)
		})?;

	let (file_writer, guard) = non_blocking(file_appender);
	LOG_GUARD.set(guard).ok();
	Ok(file_writer)
}

/// Initialize tracing with console output, optional file output, and the
/// optional OpenTelemetry layer.
pub fn init_logging() -> Result<()> {
	let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

	let otel_layer = otel::init_tracer()?
		.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

	let file_layer = match env::var("LOG_DIR") {
		Ok(dir) => {
			let log_dir = Path::new(&dir).join(LOG_COMPONENT_NAME);
			let file_writer = setup_file_logging(&log_dir)?;
			Some(
				fmt::layer()
					.with_writer(file_writer)
					.with_target(true)
					.with_ansi(false),
			)
		}
		Err(_) => None,
	};

	Registry::default()
		.with(filter)
		.with(otel_layer)
		.with(file_layer)
		.with(
			fmt::layer()
				.with_writer(std::io::stderr)
				.with_target(true)
				.with_ansi(true),
		)
		.init();

	Ok(())
}
