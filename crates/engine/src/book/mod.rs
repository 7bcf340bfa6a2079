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

//! Per-instrument order book (single-threaded)
//!
//! This is a deterministic order book using BTreeMap for price-sorted
//! levels: buy side highest price first (via the Reverse wrapper), sell
//! side lowest price first. Each level is a FIFO queue, so priority is
//! strict (price, insertion sequence).
//!
//! The book owns the full per-instrument trading state: the current phase,
//! the reference price anchoring the deviation band, the last traded price,
//! and the append-only deal log. In continuous trading an incoming order is
//! matched immediately at resting prices; in auction phases orders
//! accumulate and resolve through the uncrossing algorithm when the phase
//! is left. An order breaching the deviation band in continuous trading
//! switches the book into an intraday auction.

mod level;

pub use level::PriceLevel;

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use crucible_sdk::types::{
	Deal, Instrument, OrderType, Price, Quantity, Side, Timestamp, TradingPhase,
};

use crate::auction;
use crate::error::EngineError;
use crate::types::{InsertOutcome, Order, OrderKey, OrderReplace, OrderRequest, RejectReason};

/// Outcome of a phase transition on one book.
#[derive(Debug, Default)]
pub struct PhaseChange {
	/// Set when leaving an auction phase produced an uncrossing.
	pub uncross: Option<UncrossSummary>,
	/// Resting orders dropped by a transition into `Closed`.
	pub cancelled: Vec<Order>,
}

/// Committed result of one auction uncrossing.
#[derive(Debug)]
pub struct UncrossSummary {
	pub price: Price,
	pub volume: Quantity,
	pub deals: Vec<Deal>,
}

/// Single-instrument order book.
#[derive(Debug)]
pub struct OrderBook {
	instrument: Instrument,
	/// Buy side: price (high to low) -> FIFO level
	bids: BTreeMap<Reverse<Price>, PriceLevel>,
	/// Sell side: price (low to high) -> FIFO level
	asks: BTreeMap<Price, PriceLevel>,
	/// (order id, client id, side) -> resting price, for removal without
	/// scanning the side
	index: HashMap<OrderKey, Price>,
	phase: TradingPhase,
	/// Anchor of the deviation band; moved only by uncrossings that trade
	reference_price: Price,
	last_trade_price: Option<Price>,
	/// End of the running intraday auction; `None` outside of it
	auction_end: Option<Timestamp>,
	/// Append-only deal log for the session
	deals: Vec<Deal>,
	next_insertion_seq: u64,
	next_deal_seq: u64,
	/// Max price deviation in basis points of the reference price
	deviation_bps: u32,
	intraday_auction_duration: i64,
}

impl OrderBook {
	pub fn new(instrument: Instrument, deviation_bps: u32, intraday_auction_duration: i64) -> Self {
		let reference_price = instrument.reference_price;
		Self {
			instrument,
			bids: BTreeMap::new(),
			asks: BTreeMap::new(),
			index: HashMap::new(),
			phase: TradingPhase::Closed,
			reference_price,
			last_trade_price: None,
			auction_end: None,
			deals: Vec::new(),
			next_insertion_seq: 1,
			next_deal_seq: 1,
			deviation_bps,
			intraday_auction_duration,
		}
	}

	pub fn instrument(&self) -> &Instrument {
		&self.instrument
	}

	pub fn phase(&self) -> TradingPhase {
		self.phase
	}

	pub fn reference_price(&self) -> Price {
		self.reference_price
	}

	pub fn last_trade_price(&self) -> Option<Price> {
		self.last_trade_price
	}

	/// End of the running intraday auction, when in one.
	pub fn auction_end(&self) -> Option<Timestamp> {
		self.auction_end
	}

	/// Best bid price (None if empty).
	pub fn best_bid(&self) -> Option<Price> {
		self.bids.first_key_value().map(|(key, _)| key.0)
	}

	/// Best ask price (None if empty).
	pub fn best_ask(&self) -> Option<Price> {
		self.asks.first_key_value().map(|(key, _)| *key)
	}

	/// The session's deal log, in commit order.
	pub fn deals(&self) -> &[Deal] {
		&self.deals
	}

	/// A resting order by identity.
	pub fn resting_order(&self, key: OrderKey) -> Option<&Order> {
		let price = *self.index.get(&key)?;
		match key.side {
			Side::Buy => self.bids.get(&Reverse(price))?.get(key),
			Side::Sell => self.asks.get(&price)?.get(key),
		}
	}

	/// Total number of resting orders.
	pub fn order_count(&self) -> usize {
		self.index.len()
	}

	/// Insert an incoming order.
	///
	/// In continuous trading the order is matched immediately; in auction
	/// phases it is queued for the uncrossing. A limit price outside the
	/// deviation band (or a market order that would print outside it)
	/// switches the book into an intraday auction instead of rejecting.
	pub fn insert(
		&mut self,
		request: OrderRequest,
		now: Timestamp,
	) -> Result<InsertOutcome, RejectReason> {
		if request.quantity == 0 {
			return Err(RejectReason::InvalidQuantity);
		}
		if request.order_type == OrderType::Limit && request.price == 0 {
			return Err(RejectReason::InvalidPrice);
		}

		match self.phase {
			TradingPhase::Closed => Err(RejectReason::BookClosed),
			TradingPhase::OpeningAuction
			| TradingPhase::ClosingAuction
			| TradingPhase::IntradayAuction => self.queue_in_auction(request),
			TradingPhase::ContinuousTrading => self.insert_continuous(request, now),
		}
	}

	/// Replace price/quantity of a resting order.
	///
	/// A price change or a quantity increase forfeits time priority: the
	/// order is removed and re-enters through the insert path with a fresh
	/// insertion sequence (and may match immediately). A strict quantity
	/// decrease at unchanged price updates the order in place.
	pub fn modify(
		&mut self,
		replace: OrderReplace,
		now: Timestamp,
	) -> Result<InsertOutcome, RejectReason> {
		if replace.quantity == 0 {
			return Err(RejectReason::InvalidQuantity);
		}
		if replace.price == 0 {
			return Err(RejectReason::InvalidPrice);
		}

		let key = replace.key();
		let existing = self
			.resting_order(key)
			.cloned()
			.ok_or(RejectReason::UnknownOrder)?;

		if replace.price == existing.price && replace.quantity == existing.quantity {
			// Identical replace is a no-op; priority untouched.
			return Ok(InsertOutcome {
				deals: Vec::new(),
				resting: true,
				auction_triggered: false,
			});
		}

		if replace.price == existing.price && replace.quantity < existing.quantity {
			let level = match key.side {
				Side::Buy => self.bids.get_mut(&Reverse(existing.price)),
				Side::Sell => self.asks.get_mut(&existing.price),
			};
			if let Some(level) = level {
				level.decrease(key, replace.quantity);
			}
			return Ok(InsertOutcome {
				deals: Vec::new(),
				resting: true,
				auction_triggered: false,
			});
		}

		// Priority forfeited: cancel then insert.
		self.remove_order(key);
		self.insert(
			OrderRequest {
				order_id: replace.order_id,
				client_id: replace.client_id,
				side: replace.side,
				order_type: existing.order_type,
				price: replace.price,
				quantity: replace.quantity,
			},
			now,
		)
	}

	/// Cancel a resting order by identity.
	pub fn delete(&mut self, key: OrderKey) -> Result<Order, RejectReason> {
		self.remove_order(key).ok_or(RejectReason::UnknownOrder)
	}

	/// Switch the book to a new phase.
	///
	/// Leaving any auction phase runs the uncrossing and commits its deals;
	/// entering `Closed` cancels every resting order. Transitions to the
	/// current phase are no-ops.
	pub fn set_trading_phase(&mut self, new_phase: TradingPhase, now: Timestamp) -> PhaseChange {
		let mut change = PhaseChange::default();
		if new_phase == self.phase {
			return change;
		}

		debug!(
			instrument = %self.instrument.name,
			from = %self.phase,
			to = %new_phase,
			"switching trading phase"
		);

		if self.phase.is_auction() {
			change.uncross = self.uncross(now);
		}
		self.phase = new_phase;
		self.auction_end = None;

		if new_phase == TradingPhase::Closed {
			change.cancelled = self.cancel_all_orders();
		}
		change
	}

	/// Drop every resting order without generating deals. Returns the
	/// cancelled orders so the caller can notify their owners.
	pub fn cancel_all_orders(&mut self) -> Vec<Order> {
		let mut cancelled = Vec::with_capacity(self.index.len());
		for (_, mut level) in std::mem::take(&mut self.bids) {
			while let Some(order) = level.pop_front() {
				cancelled.push(order);
			}
		}
		for (_, mut level) in std::mem::take(&mut self.asks) {
			while let Some(order) = level.pop_front() {
				cancelled.push(order);
			}
		}
		self.index.clear();
		cancelled
	}

	/// Continuous-trading invariant: the top of the book never crosses.
	pub fn check_uncrossed(&self) -> Result<(), EngineError> {
		if self.phase != TradingPhase::ContinuousTrading {
			return Ok(());
		}
		if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask())
			&& bid >= ask
		{
			return Err(EngineError::Invariant(format!(
				"book {} crossed in continuous trading: bid {} >= ask {}",
				self.instrument.name, bid, ask
			)));
		}
		Ok(())
	}

	/// Index/queue consistency: every indexed order is queued at its
	/// indexed price and every queued order is indexed.
	pub fn check_index(&self) -> Result<(), EngineError> {
		let mut queued = 0usize;
		for (Reverse(price), level) in &self.bids {
			for order in level.orders() {
				queued += 1;
				if self.index.get(&order.key()) != Some(price) {
					return Err(EngineError::Invariant(format!(
						"bid order {:?} missing from index",
						order.key()
					)));
				}
			}
		}
		for (price, level) in &self.asks {
			for order in level.orders() {
				queued += 1;
				if self.index.get(&order.key()) != Some(price) {
					return Err(EngineError::Invariant(format!(
						"ask order {:?} missing from index",
						order.key()
					)));
				}
			}
		}
		if queued != self.index.len() {
			return Err(EngineError::Invariant(format!(
				"index holds {} orders, queues hold {}",
				self.index.len(),
				queued
			)));
		}
		Ok(())
	}

	fn queue_in_auction(&mut self, request: OrderRequest) -> Result<InsertOutcome, RejectReason> {
		let mut order = self.admit(request);
		if order.order_type == OrderType::Market {
			// Market orders joining an auction peg to the last print, or to
			// the reference before the first trade of the session.
			order.price = self.last_trade_price.unwrap_or(self.reference_price);
		}
		self.rest(order);
		Ok(InsertOutcome {
			deals: Vec::new(),
			resting: true,
			auction_triggered: false,
		})
	}

	fn insert_continuous(
		&mut self,
		request: OrderRequest,
		now: Timestamp,
	) -> Result<InsertOutcome, RejectReason> {
		if request.order_type == OrderType::Limit && !self.within_band(request.price) {
			// Deviation breach: no rejection, the book goes into an
			// intraday auction with the order queued for the uncrossing.
			let order = self.admit(request);
			self.start_intraday_auction(now);
			self.rest(order);
			return Ok(InsertOutcome {
				deals: Vec::new(),
				resting: true,
				auction_triggered: true,
			});
		}

		if request.order_type == OrderType::Market && self.opposite_is_empty(request.side) {
			let Some(price) = self.last_trade_price else {
				return Err(RejectReason::NoReferenceForMarket);
			};
			let mut order = self.admit(request);
			order.price = price;
			self.rest(order);
			return Ok(InsertOutcome {
				deals: Vec::new(),
				resting: true,
				auction_triggered: false,
			});
		}

		let mut order = self.admit(request);
		let mut deals = Vec::new();
		let breached = match order.side {
			Side::Buy => self.match_against_asks(&mut order, now, &mut deals),
			Side::Sell => self.match_against_bids(&mut order, now, &mut deals),
		};

		if breached {
			// A market order ran into liquidity outside the band: switch to
			// an intraday auction and peg the remainder to the last print.
			self.start_intraday_auction(now);
			order.price = self.last_trade_price.unwrap_or(self.reference_price);
			self.rest(order);
			return Ok(InsertOutcome {
				deals,
				resting: true,
				auction_triggered: true,
			});
		}

		let resting = order.quantity > 0;
		if resting {
			if order.order_type == OrderType::Market {
				// Remainder of a market order pegs to the price it just
				// traded at.
				order.price = self.last_trade_price.unwrap_or(self.reference_price);
			}
			self.rest(order);
		}
		Ok(InsertOutcome {
			deals,
			resting,
			auction_triggered: false,
		})
	}

	fn opposite_is_empty(&self, side: Side) -> bool {
		match side {
			Side::Buy => self.asks.is_empty(),
			Side::Sell => self.bids.is_empty(),
		}
	}

	/// Walk the ask side for an incoming buy. Returns true when a market
	/// order hit a resting price outside the deviation band.
	fn match_against_asks(
		&mut self,
		taker: &mut Order,
		now: Timestamp,
		deals: &mut Vec<Deal>,
	) -> bool {
		while taker.quantity > 0 {
			let Some(maker_price) = self.best_ask() else {
				break;
			};
			match taker.order_type {
				OrderType::Limit => {
					if taker.price < maker_price {
						break;
					}
				}
				OrderType::Market => {
					if !self.within_band(maker_price) {
						return true;
					}
				}
			}

			let Some(level) = self.asks.get_mut(&maker_price) else {
				break;
			};
			let Some(maker) = level.front().cloned() else {
				break;
			};
			let deal_quantity = taker.quantity.min(maker.quantity);
			let maker_exhausted = maker.quantity == deal_quantity;

			if maker_exhausted {
				level.pop_front();
			} else {
				level.fill_front(deal_quantity);
			}
			let level_empty = level.is_empty();
			if level_empty {
				self.asks.remove(&maker_price);
			}
			if maker_exhausted {
				self.index.remove(&maker.key());
			}

			taker.quantity -= deal_quantity;
			// Execution at the resting order's price: improvement accrues
			// to the aggressor.
			let deal = self.record_deal(taker, &maker, maker_price, deal_quantity, now);
			deals.push(deal);
		}
		false
	}

	/// Walk the bid side for an incoming sell. Mirror of
	/// [`Self::match_against_asks`].
	fn match_against_bids(
		&mut self,
		taker: &mut Order,
		now: Timestamp,
		deals: &mut Vec<Deal>,
	) -> bool {
		while taker.quantity > 0 {
			let Some(maker_price) = self.best_bid() else {
				break;
			};
			match taker.order_type {
				OrderType::Limit => {
					if taker.price > maker_price {
						break;
					}
				}
				OrderType::Market => {
					if !self.within_band(maker_price) {
						return true;
					}
				}
			}

			let Some(level) = self.bids.get_mut(&Reverse(maker_price)) else {
				break;
			};
			let Some(maker) = level.front().cloned() else {
				break;
			};
			let deal_quantity = taker.quantity.min(maker.quantity);
			let maker_exhausted = maker.quantity == deal_quantity;

			if maker_exhausted {
				level.pop_front();
			} else {
				level.fill_front(deal_quantity);
			}
			let level_empty = level.is_empty();
			if level_empty {
				self.bids.remove(&Reverse(maker_price));
			}
			if maker_exhausted {
				self.index.remove(&maker.key());
			}

			taker.quantity -= deal_quantity;
			let deal = self.record_deal(&maker, taker, maker_price, deal_quantity, now);
			deals.push(deal);
		}
		false
	}

	/// Run the uncrossing for the current auction state and commit its
	/// deals. Eligible orders pair best-first at the clearing price; the
	/// reference price follows the print when volume traded.
	fn uncross(&mut self, now: Timestamp) -> Option<UncrossSummary> {
		let bid_levels: Vec<(Price, Quantity)> = self
			.bids
			.iter()
			.map(|(Reverse(price), level)| (*price, level.total_quantity()))
			.collect();
		let ask_levels: Vec<(Price, Quantity)> = self
			.asks
			.iter()
			.map(|(price, level)| (*price, level.total_quantity()))
			.collect();

		let clearing = auction::clearing_price(&bid_levels, &ask_levels, self.reference_price)?;
		let price = clearing.price;

		let mut deals = Vec::new();
		loop {
			let Some(bid_price) = self.best_bid() else {
				break;
			};
			if bid_price < price {
				break;
			}
			let Some(ask_price) = self.best_ask() else {
				break;
			};
			if ask_price > price {
				break;
			}

			let Some(bid_level) = self.bids.get_mut(&Reverse(bid_price)) else {
				break;
			};
			let Some(buy) = bid_level.front().cloned() else {
				break;
			};
			let Some(ask_level) = self.asks.get_mut(&ask_price) else {
				break;
			};
			let Some(sell) = ask_level.front().cloned() else {
				break;
			};

			let deal_quantity = buy.quantity.min(sell.quantity);
			let buy_exhausted = buy.quantity == deal_quantity;
			let sell_exhausted = sell.quantity == deal_quantity;

			if buy_exhausted {
				bid_level.pop_front();
			} else {
				bid_level.fill_front(deal_quantity);
			}
			if sell_exhausted {
				ask_level.pop_front();
			} else {
				ask_level.fill_front(deal_quantity);
			}
			let bid_level_empty = bid_level.is_empty();
			let ask_level_empty = ask_level.is_empty();

			if bid_level_empty {
				self.bids.remove(&Reverse(bid_price));
			}
			if ask_level_empty {
				self.asks.remove(&ask_price);
			}
			if buy_exhausted {
				self.index.remove(&buy.key());
			}
			if sell_exhausted {
				self.index.remove(&sell.key());
			}

			// Every auction deal prints at the clearing price.
			let deal = self.record_deal(&buy, &sell, price, deal_quantity, now);
			deals.push(deal);
		}

		let volume: Quantity = deals.iter().map(|d| d.quantity).sum();
		if volume > 0 {
			self.reference_price = price;
		}
		info!(
			instrument = %self.instrument.name,
			price,
			volume,
			"auction uncrossed"
		);
		Some(UncrossSummary {
			price,
			volume,
			deals,
		})
	}

	/// Closed-band check against the reference price, exact in integer
	/// arithmetic: price * 10000 within reference * (10000 +/- bps).
	fn within_band(&self, price: Price) -> bool {
		let scaled = price as u128 * 10_000;
		let reference = self.reference_price as u128;
		let low = reference * (10_000 - self.deviation_bps as u128);
		let high = reference * (10_000 + self.deviation_bps as u128);
		scaled >= low && scaled <= high
	}

	fn start_intraday_auction(&mut self, now: Timestamp) {
		self.phase = TradingPhase::IntradayAuction;
		self.auction_end = Some(now + self.intraday_auction_duration);
		info!(
			instrument = %self.instrument.name,
			until = now + self.intraday_auction_duration,
			"price deviation breached, entering intraday auction"
		);
	}

	/// Turn an accepted request into a book order with the next insertion
	/// sequence.
	fn admit(&mut self, request: OrderRequest) -> Order {
		let insertion_seq = self.next_insertion_seq;
		self.next_insertion_seq += 1;
		Order {
			order_id: request.order_id,
			client_id: request.client_id,
			side: request.side,
			order_type: request.order_type,
			price: request.price,
			quantity: request.quantity,
			original_quantity: request.quantity,
			insertion_seq,
		}
	}

	/// Queue an order on its side and index it.
	fn rest(&mut self, order: Order) {
		let price = order.price;
		self.index.insert(order.key(), price);
		match order.side {
			Side::Buy => self
				.bids
				.entry(Reverse(price))
				.or_insert_with(|| PriceLevel::new(price))
				.push(order),
			Side::Sell => self
				.asks
				.entry(price)
				.or_insert_with(|| PriceLevel::new(price))
				.push(order),
		}
	}

	fn remove_order(&mut self, key: OrderKey) -> Option<Order> {
		let price = self.index.remove(&key)?;
		let order = match key.side {
			Side::Buy => {
				let level = self.bids.get_mut(&Reverse(price))?;
				let order = level.remove(key);
				if level.is_empty() {
					self.bids.remove(&Reverse(price));
				}
				order
			}
			Side::Sell => {
				let level = self.asks.get_mut(&price)?;
				let order = level.remove(key);
				if level.is_empty() {
					self.asks.remove(&price);
				}
				order
			}
		};
		debug_assert!(order.is_some(), "index pointed at a missing order");
		order
	}

	fn record_deal(
		&mut self,
		buy: &Order,
		sell: &Order,
		price: Price,
		quantity: Quantity,
		now: Timestamp,
	) -> Deal {
		debug_assert_eq!(buy.side, Side::Buy);
		debug_assert_eq!(sell.side, Side::Sell);
		let sequence = self.next_deal_seq;
		self.next_deal_seq += 1;
		let deal = Deal {
			price,
			quantity,
			buy_order_id: buy.order_id,
			buy_client_id: buy.client_id,
			sell_order_id: sell.order_id,
			sell_client_id: sell.client_id,
			timestamp: now,
			sequence,
		};
		self.last_trade_price = Some(price);
		self.deals.push(deal.clone());
		deal
	}
}
