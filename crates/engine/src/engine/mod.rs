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

//! Matching engine: the container of all order books
//!
//! The engine owns one book per configured instrument, dispatches order
//! operations by product id, and drives every phase transition:
//!
//! - the global session machine `Closed -> OpeningAuction ->
//!   ContinuousTrading -> ClosingAuction -> Closed`, advanced by `tick`
//!   against the configured session window, and
//! - the per-book intraday auctions, entered when an order breaches the
//!   deviation band and left when `tick` observes the auction end.
//!
//! Every operation runs on the single matching thread; `tick` takes the
//! current time as an argument so the whole engine is deterministic under
//! test.

use std::collections::{HashMap, HashSet};

use tracing::{debug, error, info};

use crucible_sdk::types::{Instrument, ProductId, Timestamp, TradingPhase};

use crate::book::{OrderBook, PhaseChange};
use crate::config::EngineSettings;
use crate::error::{ConfigError, EngineError};
use crate::event::{ExchangeEvent, SequenceNumber};
use crate::types::{
	EngineCommand, InsertOutcome, Order, OrderKey, OrderReplace, OrderRequest, RejectReason,
};

/// The matching core: all books, the global phase clock, and the set of
/// books currently in intraday auction.
#[derive(Debug)]
pub struct MatchingEngine {
	books: HashMap<ProductId, OrderBook>,
	/// Books in intraday auction, watched by `tick`. A book is in this set
	/// iff its phase is `IntradayAuction`.
	monitored: HashSet<ProductId>,
	global_phase: TradingPhase,
	/// End of the running opening/closing auction.
	auction_end: Option<Timestamp>,
	settings: EngineSettings,
	next_sequence: SequenceNumber,
	/// Events produced since the last `take_events` call, in commit order.
	pending_events: Vec<ExchangeEvent>,
}

impl MatchingEngine {
	/// Build the engine with one book per instrument.
	///
	/// Instruments must have unique product ids and names; the loader
	/// guarantees this for database input, the check here also covers
	/// programmatic construction.
	pub fn new(
		settings: EngineSettings,
		instruments: Vec<Instrument>,
	) -> Result<Self, ConfigError> {
		let mut books = HashMap::with_capacity(instruments.len());
		for instrument in instruments {
			info!(
				product_id = instrument.product_id,
				name = %instrument.name,
				"adding instrument"
			);
			let product_id = instrument.product_id;
			let book = OrderBook::new(
				instrument,
				settings.deviation_bps,
				settings.durations.intraday,
			);
			if books.insert(product_id, book).is_some() {
				return Err(ConfigError::DuplicateProduct(product_id));
			}
		}
		Ok(Self {
			books,
			monitored: HashSet::new(),
			global_phase: TradingPhase::Closed,
			auction_end: None,
			settings,
			next_sequence: 0,
			pending_events: Vec::new(),
		})
	}

	pub fn global_phase(&self) -> TradingPhase {
		self.global_phase
	}

	pub fn book(&self, product_id: ProductId) -> Option<&OrderBook> {
		self.books.get(&product_id)
	}

	pub fn books(&self) -> impl Iterator<Item = &OrderBook> {
		self.books.values()
	}

	/// Product ids of books currently in intraday auction.
	pub fn monitored_books(&self) -> &HashSet<ProductId> {
		&self.monitored
	}

	/// Drain the events produced since the last call, in commit order.
	pub fn take_events(&mut self) -> Vec<ExchangeEvent> {
		std::mem::take(&mut self.pending_events)
	}

	/// Insert an order into the addressed book.
	pub fn insert(
		&mut self,
		product_id: ProductId,
		request: OrderRequest,
		now: Timestamp,
	) -> Result<InsertOutcome, RejectReason> {
		let key = request.key();
		let price = request.price;
		let quantity = request.quantity;
		let result = match self.books.get_mut(&product_id) {
			Some(book) => book.insert(request, now),
			None => Err(RejectReason::UnknownBook),
		};
		match result {
			Ok(outcome) => {
				self.emit_insert_events(product_id, key, price, quantity, &outcome, now);
				Ok(outcome)
			}
			Err(reason) => {
				self.emit_rejection(product_id, key, &reason, now);
				Err(reason)
			}
		}
	}

	/// Replace a resting order in the addressed book.
	pub fn modify(
		&mut self,
		product_id: ProductId,
		replace: OrderReplace,
		now: Timestamp,
	) -> Result<InsertOutcome, RejectReason> {
		let key = replace.key();
		let price = replace.price;
		let quantity = replace.quantity;
		let result = match self.books.get_mut(&product_id) {
			Some(book) => book.modify(replace, now),
			None => Err(RejectReason::UnknownBook),
		};
		match result {
			Ok(outcome) => {
				self.emit_insert_events(product_id, key, price, quantity, &outcome, now);
				Ok(outcome)
			}
			Err(reason) => {
				self.emit_rejection(product_id, key, &reason, now);
				Err(reason)
			}
		}
	}

	/// Cancel a resting order in the addressed book.
	pub fn delete(
		&mut self,
		product_id: ProductId,
		key: OrderKey,
		now: Timestamp,
	) -> Result<Order, RejectReason> {
		let result = match self.books.get_mut(&product_id) {
			Some(book) => book.delete(key),
			None => Err(RejectReason::UnknownBook),
		};
		match result {
			Ok(order) => {
				let seq = self.next_seq();
				self.pending_events.push(ExchangeEvent::OrderCancelled {
					seq,
					product_id,
					order_id: order.order_id,
					client_id: order.client_id,
					side: order.side,
					remaining_quantity: order.quantity,
					unsolicited: false,
					timestamp: now,
				});
				Ok(order)
			}
			Err(reason) => {
				self.emit_rejection(product_id, key, &reason, now);
				Err(reason)
			}
		}
	}

	/// Apply one ingress command. Rejections are surfaced on the event
	/// stream and logged at debug; only invariant violations are errors.
	pub fn apply(&mut self, command: EngineCommand, now: Timestamp) -> Result<(), EngineError> {
		let product_id = command.product_id();
		let key = command.order_key();
		let result = match command {
			EngineCommand::Insert {
				product_id,
				request,
			} => self.insert(product_id, request, now).map(|_| ()),
			EngineCommand::Modify {
				product_id,
				replace,
			} => self.modify(product_id, replace, now).map(|_| ()),
			EngineCommand::Cancel { product_id, key } => {
				self.delete(product_id, key, now).map(|_| ())
			}
		};
		if let Err(reason) = result {
			debug!(product_id, ?key, %reason, "order command rejected");
		}
		if let Some(book) = self.books.get(&product_id) {
			book.check_uncrossed()?;
		}
		Ok(())
	}

	/// Set the global trading phase.
	///
	/// `IntradayAuction` is managed at book level and refused here.
	/// Entering an auction phase arms the global auction end.
	pub fn set_global_phase(
		&mut self,
		phase: TradingPhase,
		now: Timestamp,
	) -> Result<(), EngineError> {
		if !phase.is_global() {
			error!(%phase, "not a valid global phase");
			return Err(EngineError::InvalidGlobalPhase(phase));
		}
		match phase {
			TradingPhase::OpeningAuction => {
				self.auction_end = Some(now + self.settings.durations.opening);
			}
			TradingPhase::ClosingAuction => {
				self.auction_end = Some(now + self.settings.durations.closing);
			}
			_ => {}
		}
		self.update_global_phase(phase, now);
		Ok(())
	}

	/// Single time-driven entry point.
	///
	/// First restores every monitored book whose intraday auction has
	/// elapsed (running its uncrossing), then advances the global session
	/// machine. Boundaries are non-strict: a transition due exactly at
	/// `now` happens now.
	pub fn tick(&mut self, now: Timestamp) {
		self.resolve_elapsed_auctions(now);

		let in_window = self.settings.schedule.is_open(now);
		match self.global_phase {
			TradingPhase::Closed => {
				if in_window {
					self.auction_end = Some(now + self.settings.durations.opening);
					self.update_global_phase(TradingPhase::OpeningAuction, now);
				}
			}
			TradingPhase::OpeningAuction => {
				if self.auction_end.is_some_and(|end| now >= end) {
					self.update_global_phase(TradingPhase::ContinuousTrading, now);
				}
			}
			TradingPhase::ContinuousTrading => {
				if !in_window {
					self.auction_end = Some(now + self.settings.durations.closing);
					self.update_global_phase(TradingPhase::ClosingAuction, now);
				}
			}
			TradingPhase::ClosingAuction => {
				if self.auction_end.is_some_and(|end| now >= end) {
					self.update_global_phase(TradingPhase::Closed, now);
				}
			}
			TradingPhase::IntradayAuction => {
				// Unreachable: never set globally.
			}
		}
	}

	/// Restore monitored books whose auction end has passed to the global
	/// phase, uncrossing them on the way out.
	fn resolve_elapsed_auctions(&mut self, now: Timestamp) {
		let due: Vec<ProductId> = self
			.monitored
			.iter()
			.filter(|product_id| {
				self.books
					.get(product_id)
					.and_then(|book| book.auction_end())
					.is_some_and(|end| now >= end)
			})
			.copied()
			.collect();

		for product_id in due {
			let phase = self.global_phase;
			let change = match self.books.get_mut(&product_id) {
				Some(book) => book.set_trading_phase(phase, now),
				None => continue,
			};
			self.monitored.remove(&product_id);
			self.emit_phase_change(product_id, change, now);
			let seq = self.next_seq();
			self.pending_events.push(ExchangeEvent::PhaseChanged {
				seq,
				product_id: Some(product_id),
				phase,
				timestamp: now,
			});
			info!(product_id, %phase, "intraday auction resolved");
		}
	}

	/// Propagate a new global phase to every book.
	///
	/// Books still in intraday auction are stomped to the new phase, which
	/// force-uncrosses them; the monitored set is cleared to keep it in
	/// lock-step with book phases.
	fn update_global_phase(&mut self, phase: TradingPhase, now: Timestamp) {
		if phase == self.global_phase {
			return;
		}
		info!(from = %self.global_phase, to = %phase, "switching global phase");
		self.global_phase = phase;

		let product_ids: Vec<ProductId> = self.books.keys().copied().collect();
		for product_id in product_ids {
			let change = match self.books.get_mut(&product_id) {
				Some(book) => book.set_trading_phase(phase, now),
				None => continue,
			};
			self.emit_phase_change(product_id, change, now);
		}
		self.monitored.clear();

		let seq = self.next_seq();
		self.pending_events.push(ExchangeEvent::PhaseChanged {
			seq,
			product_id: None,
			phase,
			timestamp: now,
		});
	}

	fn emit_insert_events(
		&mut self,
		product_id: ProductId,
		key: OrderKey,
		price: u64,
		quantity: u64,
		outcome: &InsertOutcome,
		now: Timestamp,
	) {
		for deal in &outcome.deals {
			let seq = self.next_seq();
			self.pending_events.push(ExchangeEvent::DealExecuted {
				seq,
				product_id,
				deal: deal.clone(),
			});
		}
		if outcome.resting {
			let seq = self.next_seq();
			self.pending_events.push(ExchangeEvent::OrderAccepted {
				seq,
				product_id,
				order_id: key.order_id,
				client_id: key.client_id,
				side: key.side,
				price,
				quantity,
				timestamp: now,
			});
		}
		if outcome.auction_triggered {
			self.monitored.insert(product_id);
			let auction_end = self
				.books
				.get(&product_id)
				.and_then(|book| book.auction_end())
				.unwrap_or(now);
			let seq = self.next_seq();
			self.pending_events.push(ExchangeEvent::AuctionStarted {
				seq,
				product_id,
				auction_end,
			});
		}
	}

	fn emit_rejection(
		&mut self,
		product_id: ProductId,
		key: OrderKey,
		reason: &RejectReason,
		now: Timestamp,
	) {
		let seq = self.next_seq();
		self.pending_events.push(ExchangeEvent::OrderRejected {
			seq,
			product_id,
			order_id: key.order_id,
			client_id: key.client_id,
			side: key.side,
			reason: reason.to_string(),
			timestamp: now,
		});
	}

	fn emit_phase_change(&mut self, product_id: ProductId, change: PhaseChange, now: Timestamp) {
		if let Some(uncross) = change.uncross {
			for deal in uncross.deals {
				let seq = self.next_seq();
				self.pending_events.push(ExchangeEvent::DealExecuted {
					seq,
					product_id,
					deal,
				});
			}
		}
		for order in change.cancelled {
			let seq = self.next_seq();
			self.pending_events.push(ExchangeEvent::OrderCancelled {
				seq,
				product_id,
				order_id: order.order_id,
				client_id: order.client_id,
				side: order.side,
				remaining_quantity: order.quantity,
				unsolicited: true,
				timestamp: now,
			});
		}
	}

	fn next_seq(&mut self) -> SequenceNumber {
		self.next_sequence += 1;
		self.next_sequence
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{AuctionDurations, SessionSchedule};
	use crucible_sdk::types::{Currency, OrderType, Side};

	fn instrument(product_id: u32, name: &str) -> Instrument {
		Instrument {
			product_id,
			name: name.to_string(),
			currency: Currency::Eur,
			tick_size: 1,
			lot_size: 1,
			reference_price: 100,
		}
	}

	fn settings() -> EngineSettings {
		EngineSettings {
			schedule: SessionSchedule {
				open: 1_000,
				close: 10_000,
			},
			durations: AuctionDurations {
				opening: 120,
				closing: 120,
				intraday: 300,
			},
			deviation_bps: 1_000,
		}
	}

	/// Engine with two instruments, ticked into continuous trading.
	fn open_engine() -> MatchingEngine {
		let mut engine = MatchingEngine::new(
			settings(),
			vec![instrument(1, "ACME"), instrument(2, "GLOBEX")],
		)
		.unwrap();
		engine.tick(1_000);
		engine.tick(1_120);
		assert_eq!(engine.global_phase(), TradingPhase::ContinuousTrading);
		engine.take_events();
		engine
	}

	fn limit(id: u32, side: Side, quantity: u64, price: u64) -> OrderRequest {
		OrderRequest {
			order_id: id,
			client_id: 1,
			side,
			order_type: OrderType::Limit,
			price,
			quantity,
		}
	}

	#[test]
	fn duplicate_product_id_fails_configuration() {
		let err = MatchingEngine::new(
			settings(),
			vec![instrument(1, "ACME"), instrument(1, "GLOBEX")],
		)
		.unwrap_err();
		assert!(matches!(err, ConfigError::DuplicateProduct(1)));
	}

	#[test]
	fn unknown_book_is_rejected() {
		let mut engine = open_engine();
		assert_eq!(
			engine.insert(99, limit(1, Side::Buy, 10, 100), 2_000),
			Err(RejectReason::UnknownBook)
		);
	}

	#[test]
	fn dispatch_reaches_the_addressed_book() {
		let mut engine = open_engine();
		engine.insert(1, limit(1, Side::Sell, 10, 100), 2_000).unwrap();
		let outcome = engine.insert(1, limit(2, Side::Buy, 10, 100), 2_001).unwrap();
		assert_eq!(outcome.deals.len(), 1);
		// Book 2 untouched.
		assert!(engine.book(2).unwrap().deals().is_empty());
	}

	#[test]
	fn intraday_auction_is_not_a_global_phase() {
		let mut engine = open_engine();
		let err = engine
			.set_global_phase(TradingPhase::IntradayAuction, 2_000)
			.unwrap_err();
		assert!(matches!(err, EngineError::InvalidGlobalPhase(_)));
		assert_eq!(engine.global_phase(), TradingPhase::ContinuousTrading);
	}

	#[test]
	fn monitored_set_tracks_intraday_phase() {
		let mut engine = open_engine();
		let outcome = engine.insert(1, limit(1, Side::Buy, 10, 115), 2_000).unwrap();
		assert!(outcome.auction_triggered);
		assert!(engine.monitored_books().contains(&1));
		assert_eq!(
			engine.book(1).unwrap().phase(),
			TradingPhase::IntradayAuction
		);
		// Invariant both ways: every monitored book is in intraday auction,
		// every other book is not.
		for book in engine.books() {
			let monitored = engine
				.monitored_books()
				.contains(&book.instrument().product_id);
			assert_eq!(monitored, book.phase() == TradingPhase::IntradayAuction);
		}
	}

	#[test]
	fn tick_resolves_elapsed_intraday_auction() {
		let mut engine = open_engine();
		engine.insert(1, limit(1, Side::Buy, 10, 115), 2_000).unwrap();
		engine.insert(1, limit(2, Side::Sell, 10, 115), 2_010).unwrap();

		// Before the auction end nothing changes.
		engine.tick(2_200);
		assert!(engine.monitored_books().contains(&1));

		// Exactly at the boundary the auction resolves.
		engine.tick(2_300);
		assert!(engine.monitored_books().is_empty());
		let book = engine.book(1).unwrap();
		assert_eq!(book.phase(), TradingPhase::ContinuousTrading);
		assert_eq!(book.reference_price(), 115);
		assert_eq!(book.deals().len(), 1);
		assert_eq!(book.deals()[0].price, 115);
	}

	#[test]
	fn global_close_force_uncrosses_intraday_books() {
		let mut engine = open_engine();
		// Auction runs until 10_200, past the session close at 10_000.
		engine.insert(1, limit(1, Side::Buy, 10, 115), 9_900).unwrap();
		engine.insert(1, limit(2, Side::Sell, 10, 115), 9_910).unwrap();

		// Session window closes while book 1 is still in intraday auction.
		engine.tick(10_000);
		assert_eq!(engine.global_phase(), TradingPhase::ClosingAuction);
		assert!(engine.monitored_books().is_empty());
		let book = engine.book(1).unwrap();
		assert_eq!(book.phase(), TradingPhase::ClosingAuction);
		// The intraday auction was uncrossed on the way out.
		assert_eq!(book.deals().len(), 1);
	}

	#[test]
	fn full_day_lifecycle() {
		let mut engine = MatchingEngine::new(settings(), vec![instrument(1, "ACME")]).unwrap();

		// Before the window: still closed.
		engine.tick(999);
		assert_eq!(engine.global_phase(), TradingPhase::Closed);

		// Window opens: opening auction.
		engine.tick(1_000);
		assert_eq!(engine.global_phase(), TradingPhase::OpeningAuction);

		engine.insert(1, limit(1, Side::Buy, 10, 100), 1_010).unwrap();
		engine.insert(1, limit(2, Side::Sell, 10, 100), 1_020).unwrap();

		// Opening auction ends exactly at the boundary.
		engine.tick(1_120);
		assert_eq!(engine.global_phase(), TradingPhase::ContinuousTrading);
		assert_eq!(engine.book(1).unwrap().deals().len(), 1);

		engine.insert(1, limit(3, Side::Buy, 5, 99), 5_000).unwrap();

		// Window closes: closing auction, then the session ends.
		engine.tick(10_000);
		assert_eq!(engine.global_phase(), TradingPhase::ClosingAuction);
		engine.tick(10_120);
		assert_eq!(engine.global_phase(), TradingPhase::Closed);

		// All books empty after close.
		assert_eq!(engine.book(1).unwrap().order_count(), 0);

		let events = engine.take_events();
		let unsolicited = events.iter().any(|e| {
			matches!(
				e,
				ExchangeEvent::OrderCancelled {
					unsolicited: true,
					..
				}
			)
		});
		assert!(unsolicited, "session close must cancel resting orders");
	}

	#[test]
	fn events_are_sequenced_in_commit_order() {
		let mut engine = open_engine();
		engine.insert(1, limit(1, Side::Sell, 10, 100), 2_000).unwrap();
		engine.insert(1, limit(2, Side::Buy, 15, 100), 2_001).unwrap();
		engine
			.delete(
				1,
				OrderKey {
					order_id: 2,
					client_id: 1,
					side: Side::Buy,
				},
				2_002,
			)
			.unwrap();

		let events = engine.take_events();
		let sequences: Vec<u64> = events.iter().map(|e| e.sequence()).collect();
		let mut sorted = sequences.clone();
		sorted.sort_unstable();
		assert_eq!(sequences, sorted);
		assert!(sequences.windows(2).all(|w| w[0] < w[1]));

		// Resting sell, then the deal, then the buy remainder, then the
		// cancel.
		assert!(matches!(events[0], ExchangeEvent::OrderAccepted { .. }));
		assert!(matches!(events[1], ExchangeEvent::DealExecuted { .. }));
		assert!(matches!(events[2], ExchangeEvent::OrderAccepted { .. }));
		assert!(matches!(
			events[3],
			ExchangeEvent::OrderCancelled {
				unsolicited: false,
				..
			}
		));
	}

	#[test]
	fn rejection_is_an_event_not_an_error() {
		let mut engine = open_engine();
		let command = EngineCommand::Insert {
			product_id: 1,
			request: limit(1, Side::Buy, 0, 100),
		};
		engine.apply(command, 2_000).unwrap();
		let events = engine.take_events();
		assert!(matches!(events[0], ExchangeEvent::OrderRejected { .. }));
	}
}
