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

//! Auction uncrossing price computation.
//!
//! Pure function over per-price aggregates of the two book sides. The
//! clearing price maximizes executable volume; ties resolve by minimal
//! surplus, then by the surplus side agreeing with the price move relative
//! to the reference price, then by distance to the reference price, then to
//! the lower price. The caller pairs eligible orders at the returned price.

use crucible_sdk::types::{Price, Quantity};

/// Result of the clearing price search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearingPrice {
	pub price: Price,
	/// Volume executable at `price`: min(eligible demand, eligible supply).
	pub executable: Quantity,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
	price: Price,
	executable: Quantity,
	/// Eligible demand minus eligible supply at this price.
	surplus: i128,
}

impl Candidate {
	/// True when the leftover side points the same way as the price move:
	/// buy surplus above the reference, sell surplus below it.
	fn surplus_follows_move(&self, reference: Price) -> bool {
		(self.price > reference && self.surplus > 0)
			|| (self.price < reference && self.surplus < 0)
	}
}

/// Compute the uncrossing price from per-price aggregates.
///
/// `bids` and `asks` are (price, total quantity) pairs, one per non-empty
/// level, in any order. Returns `None` when no price can execute volume.
pub fn clearing_price(
	bids: &[(Price, Quantity)],
	asks: &[(Price, Quantity)],
	reference: Price,
) -> Option<ClearingPrice> {
	if bids.is_empty() || asks.is_empty() {
		return None;
	}

	let mut candidates: Vec<Price> = bids
		.iter()
		.chain(asks.iter())
		.map(|(price, _)| *price)
		.collect();
	candidates.sort_unstable();
	candidates.dedup();

	let mut best: Option<Candidate> = None;
	for price in candidates {
		let demand: Quantity = bids
			.iter()
			.filter(|(p, _)| *p >= price)
			.map(|(_, q)| *q)
			.sum();
		let supply: Quantity = asks
			.iter()
			.filter(|(p, _)| *p <= price)
			.map(|(_, q)| *q)
			.sum();
		let candidate = Candidate {
			price,
			executable: demand.min(supply),
			surplus: demand as i128 - supply as i128,
		};
		best = Some(match best {
			None => candidate,
			Some(current) => pick(current, candidate, reference),
		});
	}

	let best = best?;
	if best.executable == 0 {
		return None;
	}
	Some(ClearingPrice {
		price: best.price,
		executable: best.executable,
	})
}

/// Tie-break cascade between two candidates. `a` is the incumbent and wins
/// residual ties, which keeps the final pick at the lowest price since
/// candidates are visited in ascending order.
fn pick(a: Candidate, b: Candidate, reference: Price) -> Candidate {
	if a.executable != b.executable {
		return if a.executable > b.executable { a } else { b };
	}
	if a.surplus.abs() != b.surplus.abs() {
		return if a.surplus.abs() < b.surplus.abs() {
			a
		} else {
			b
		};
	}
	let a_follows = a.surplus_follows_move(reference);
	let b_follows = b.surplus_follows_move(reference);
	if a_follows != b_follows {
		return if a_follows { a } else { b };
	}
	if a.price.abs_diff(reference) != b.price.abs_diff(reference) {
		return if a.price.abs_diff(reference) < b.price.abs_diff(reference) {
			a
		} else {
			b
		};
	}
	a
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_side_yields_no_price() {
		assert_eq!(clearing_price(&[], &[(100, 10)], 100), None);
		assert_eq!(clearing_price(&[(100, 10)], &[], 100), None);
	}

	#[test]
	fn disjoint_sides_yield_no_price() {
		// Best bid 99 below best ask 101: nothing executes anywhere.
		let bids = [(99, 50)];
		let asks = [(101, 50)];
		assert_eq!(clearing_price(&bids, &asks, 100), None);
	}

	#[test]
	fn volume_maximization_picks_the_largest_cross() {
		// Demand at 101 is 100, supply 130 -> 100 lots; every other price
		// caps at 80.
		let bids = [(101, 100), (100, 50)];
		let asks = [(99, 80), (101, 50)];
		let cp = clearing_price(&bids, &asks, 100).unwrap();
		assert_eq!(cp.price, 101);
		assert_eq!(cp.executable, 100);
	}

	#[test]
	fn equal_volume_resolves_to_minimal_surplus() {
		// 100 and 105 both execute 50; surplus is 0 at 100 and -30 at 105.
		let bids = [(105, 50)];
		let asks = [(100, 50), (105, 30)];
		let cp = clearing_price(&bids, &asks, 100).unwrap();
		assert_eq!(cp.price, 100);
		assert_eq!(cp.executable, 50);
	}

	#[test]
	fn equal_surplus_prefers_the_move_direction() {
		// 104 and 108 both execute 20 with |surplus| 10. With the reference
		// below both, the upward move prefers the buy-surplus candidate.
		let bids = [(108, 20), (104, 10)];
		let asks = [(104, 20), (108, 10)];
		let cp = clearing_price(&bids, &asks, 90).unwrap();
		assert_eq!(cp.price, 104);
		assert_eq!(cp.executable, 20);
	}

	#[test]
	fn equal_surplus_resolves_to_reference_distance() {
		// Same shape, reference at 107: neither surplus follows the move,
		// so the closer price (108) wins.
		let bids = [(108, 20), (104, 10)];
		let asks = [(104, 20), (108, 10)];
		let cp = clearing_price(&bids, &asks, 107).unwrap();
		assert_eq!(cp.price, 108);
	}

	#[test]
	fn full_tie_resolves_to_the_lower_price() {
		// One crossed pair: both limits execute 10 with surplus 0 and equal
		// distance to the reference.
		let bids = [(110, 10)];
		let asks = [(90, 10)];
		let cp = clearing_price(&bids, &asks, 100).unwrap();
		assert_eq!(cp.price, 90);
		assert_eq!(cp.executable, 10);
	}

	#[test]
	fn single_pair_away_from_reference() {
		// The intraday-auction case: one bid and one ask at 115 against a
		// reference of 100 still uncross at 115.
		let bids = [(115, 10)];
		let asks = [(115, 10)];
		let cp = clearing_price(&bids, &asks, 100).unwrap();
		assert_eq!(cp.price, 115);
		assert_eq!(cp.executable, 10);
	}

	#[test]
	fn executable_never_below_any_other_candidate() {
		// Property check over a fixed ladder: the chosen price's volume is
		// maximal across every candidate price.
		let bids = [(105, 40), (103, 25), (101, 10), (99, 60)];
		let asks = [(98, 15), (100, 35), (102, 50), (106, 20)];
		let cp = clearing_price(&bids, &asks, 100).unwrap();
		for price in [98, 99, 100, 101, 102, 103, 105, 106] {
			let demand: u64 = bids.iter().filter(|(p, _)| *p >= price).map(|(_, q)| *q).sum();
			let supply: u64 = asks.iter().filter(|(p, _)| *p <= price).map(|(_, q)| *q).sum();
			assert!(
				cp.executable >= demand.min(supply),
				"price {} executes more than the clearing price",
				price
			);
		}
	}
}
