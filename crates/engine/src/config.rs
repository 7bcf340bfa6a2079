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

//! Engine configuration
//!
//! Configuration is read from a hierarchical file (TOML/YAML/JSON, any
//! format the `config` crate detects) with a `CRUCIBLE_*` environment
//! overlay, then validated into typed settings. Session times are given as
//! "HH:MM:SS" and resolved against a date once, at startup; the core only
//! ever compares injected timestamps.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crucible_sdk::types::Timestamp;

use crate::error::ConfigError;

/// Raw configuration as it appears in the file, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawConfig {
	engine: RawEngineSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEngineSection {
	/// Session open, "HH:MM:SS"
	start_time: String,
	/// Session close, "HH:MM:SS"
	stop_time: String,
	/// Seconds
	opening_auction_duration: i64,
	/// Seconds
	closing_auction_duration: i64,
	/// Seconds
	intraday_auction_duration: i64,
	/// Percentage, e.g. 10 means a [P*0.9, P*1.1] band
	max_price_deviation: f64,
	/// Path to the instrument database (JSON)
	instrument_db_path: String,
	/// Gateway bind address
	#[serde(default = "default_listen_addr")]
	listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
	"0.0.0.0:4710".parse().expect("static default address")
}

/// Validated engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
	pub start_time: NaiveTime,
	pub stop_time: NaiveTime,
	pub durations: AuctionDurations,
	/// Max price deviation in basis points of the reference price.
	pub deviation_bps: u32,
	pub instrument_db_path: PathBuf,
	pub listen_addr: SocketAddr,
}

/// Auction lengths in seconds.
#[derive(Debug, Clone, Copy)]
pub struct AuctionDurations {
	pub opening: i64,
	pub closing: i64,
	pub intraday: i64,
}

/// Session boundaries resolved to concrete timestamps.
#[derive(Debug, Clone, Copy)]
pub struct SessionSchedule {
	pub open: Timestamp,
	pub close: Timestamp,
}

impl SessionSchedule {
	/// Half-open session window: `open <= now < close`.
	pub fn is_open(&self, now: Timestamp) -> bool {
		self.open <= now && now < self.close
	}
}

/// Everything the matching engine needs from configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
	pub schedule: SessionSchedule,
	pub durations: AuctionDurations,
	pub deviation_bps: u32,
}

impl EngineConfig {
	/// Load configuration from a file plus the `CRUCIBLE_*` environment
	/// overlay (e.g. `CRUCIBLE_ENGINE__START_TIME`).
	pub fn from_file(path: &str) -> Result<Self, ConfigError> {
		let raw: RawConfig = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix("CRUCIBLE").separator("__"))
			.build()?
			.try_deserialize()?;
		Self::validate(raw)
	}

	fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
		let engine = raw.engine;

		let start_time = parse_time(&engine.start_time)?;
		let stop_time = parse_time(&engine.stop_time)?;
		if stop_time <= start_time {
			return Err(ConfigError::EmptySessionWindow);
		}

		for duration in [
			engine.opening_auction_duration,
			engine.closing_auction_duration,
			engine.intraday_auction_duration,
		] {
			if duration <= 0 {
				return Err(ConfigError::InvalidDuration(duration));
			}
		}

		if !engine.max_price_deviation.is_finite()
			|| engine.max_price_deviation <= 0.0
			|| engine.max_price_deviation >= 100.0
		{
			return Err(ConfigError::InvalidDeviation(engine.max_price_deviation));
		}
		let deviation_bps = (engine.max_price_deviation * 100.0).round() as u32;

		Ok(Self {
			start_time,
			stop_time,
			durations: AuctionDurations {
				opening: engine.opening_auction_duration,
				closing: engine.closing_auction_duration,
				intraday: engine.intraday_auction_duration,
			},
			deviation_bps,
			instrument_db_path: PathBuf::from(engine.instrument_db_path),
			listen_addr: engine.listen_addr,
		})
	}

	/// Resolve the session boundaries against a date in local time.
	///
	/// Called once at startup with today's date; the result is the only
	/// place wall-clock time enters the engine.
	pub fn settings_for(&self, date: NaiveDate) -> EngineSettings {
		let open = resolve_local(date, self.start_time);
		let close = resolve_local(date, self.stop_time);
		EngineSettings {
			schedule: SessionSchedule { open, close },
			durations: self.durations,
			deviation_bps: self.deviation_bps,
		}
	}
}

fn parse_time(value: &str) -> Result<NaiveTime, ConfigError> {
	NaiveTime::parse_from_str(value, "%H:%M:%S")
		.map_err(|_| ConfigError::InvalidTime(value.to_string()))
}

fn resolve_local(date: NaiveDate, time: NaiveTime) -> Timestamp {
	let naive = date.and_time(time);
	// DST gaps resolve to the earliest valid interpretation.
	match chrono::Local.from_local_datetime(&naive) {
		chrono::LocalResult::Single(dt) => dt.timestamp(),
		chrono::LocalResult::Ambiguous(dt, _) => dt.timestamp(),
		chrono::LocalResult::None => naive.and_utc().timestamp(),
	}
}
