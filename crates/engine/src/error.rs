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

use std::path::PathBuf;

use thiserror::Error;

use crucible_sdk::types::{ProductId, TradingPhase};

/// Startup configuration failures. All of these are fatal: the binary
/// reports them and exits non-zero.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("configuration error: {0}")]
	Load(#[from] config::ConfigError),
	#[error("invalid time '{0}', expected HH:MM:SS")]
	InvalidTime(String),
	#[error("stop_time must be after start_time")]
	EmptySessionWindow,
	#[error("invalid auction duration {0}s: must be strictly positive")]
	InvalidDuration(i64),
	#[error("invalid max_price_deviation {0}: must lie in (0, 100)")]
	InvalidDeviation(f64),
	#[error("failed to read instrument database {}", path.display())]
	InstrumentIo {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("malformed instrument database {}", path.display())]
	InstrumentParse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
	#[error("duplicate product id {0} in instrument database")]
	DuplicateProduct(ProductId),
	#[error("duplicate instrument name '{0}' in instrument database")]
	DuplicateName(String),
	#[error("instrument '{name}': {field} must be strictly positive")]
	InvalidInstrument { name: String, field: &'static str },
	#[error("instrument database is empty")]
	NoInstruments,
}

/// Fatal engine failures.
///
/// Unlike [`crate::types::RejectReason`], these are never caused by order
/// input: an `Invariant` indicates a programming error and halts the
/// matching loop after the offending book state is dumped.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("{0} is not a valid global phase")]
	InvalidGlobalPhase(TradingPhase),
	#[error("invariant violated: {0}")]
	Invariant(String),
	#[error("event buffer full")]
	EventBufferFull,
}
