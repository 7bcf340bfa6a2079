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

//! Instrument database loader
//!
//! The database is a JSON array of instrument records. Loading validates
//! each record (positive tick size, lot size and reference price) and the
//! uniqueness of product ids and names; any failure is fatal at startup.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crucible_sdk::types::Instrument;

use crate::error::ConfigError;

/// Load and validate the instrument database.
pub fn load(path: &Path) -> Result<Vec<Instrument>, ConfigError> {
	let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::InstrumentIo {
		path: path.to_path_buf(),
		source,
	})?;
	let instruments: Vec<Instrument> =
		serde_json::from_str(&raw).map_err(|source| ConfigError::InstrumentParse {
			path: path.to_path_buf(),
			source,
		})?;
	validate(&instruments)?;
	info!(count = instruments.len(), db = %path.display(), "instruments loaded");
	Ok(instruments)
}

fn validate(instruments: &[Instrument]) -> Result<(), ConfigError> {
	if instruments.is_empty() {
		return Err(ConfigError::NoInstruments);
	}

	let mut product_ids = HashSet::new();
	let mut names = HashSet::new();
	for instrument in instruments {
		for (value, field) in [
			(instrument.tick_size, "tick_size"),
			(instrument.lot_size, "lot_size"),
			(instrument.reference_price, "reference_price"),
		] {
			if value == 0 {
				return Err(ConfigError::InvalidInstrument {
					name: instrument.name.clone(),
					field,
				});
			}
		}
		if !product_ids.insert(instrument.product_id) {
			return Err(ConfigError::DuplicateProduct(instrument.product_id));
		}
		if !names.insert(instrument.name.as_str()) {
			return Err(ConfigError::DuplicateName(instrument.name.clone()));
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use crucible_sdk::types::Currency;

	use super::*;

	fn instrument(product_id: u32, name: &str) -> Instrument {
		Instrument {
			product_id,
			name: name.to_string(),
			currency: Currency::Eur,
			tick_size: 1,
			lot_size: 10,
			reference_price: 100,
		}
	}

	#[test]
	fn valid_database_passes() {
		let instruments = vec![instrument(1, "ACME"), instrument(2, "GLOBEX")];
		validate(&instruments).unwrap();
	}

	#[test]
	fn duplicate_product_id_is_corrupt() {
		let instruments = vec![instrument(1, "ACME"), instrument(1, "GLOBEX")];
		assert!(matches!(
			validate(&instruments),
			Err(ConfigError::DuplicateProduct(1))
		));
	}

	#[test]
	fn duplicate_name_is_corrupt() {
		let instruments = vec![instrument(1, "ACME"), instrument(2, "ACME")];
		assert!(matches!(
			validate(&instruments),
			Err(ConfigError::DuplicateName(_))
		));
	}

	#[test]
	fn zero_reference_price_is_invalid() {
		let mut bad = instrument(1, "ACME");
		bad.reference_price = 0;
		assert!(matches!(
			validate(&[bad]),
			Err(ConfigError::InvalidInstrument {
				field: "reference_price",
				..
			})
		));
	}

	#[test]
	fn empty_database_is_invalid() {
		assert!(matches!(validate(&[]), Err(ConfigError::NoInstruments)));
	}

	#[test]
	fn missing_file_reports_the_path() {
		let err = load(Path::new("/nonexistent/instruments.json")).unwrap_err();
		assert!(matches!(err, ConfigError::InstrumentIo { .. }));
	}

	#[test]
	fn database_round_trips_through_json() {
		let json = r#"[
			{
				"product_id": 1,
				"name": "ACME",
				"currency": "EUR",
				"tick_size": 1,
				"lot_size": 10,
				"reference_price": 100
			}
		]"#;
		let instruments: Vec<Instrument> = serde_json::from_str(json).unwrap();
		validate(&instruments).unwrap();
		assert_eq!(instruments[0].name, "ACME");
	}
}
