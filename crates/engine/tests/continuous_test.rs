//! Continuous-trading integration tests
//!
//! Drives the engine through its public surface with a manual clock:
//! build, tick into continuous trading, trade, and check the book and the
//! deal log.

use crucible_engine::{
	AuctionDurations, EngineSettings, MatchingEngine, SessionSchedule,
	types::{OrderKey, OrderReplace, OrderRequest, RejectReason},
};
use crucible_sdk::types::{Currency, Instrument, OrderType, Side, TradingPhase};

fn instrument() -> Instrument {
	Instrument {
		product_id: 1,
		name: "ACME".to_string(),
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

/// Engine in continuous trading with one instrument (reference 100,
/// 10% band).
fn continuous_engine() -> MatchingEngine {
	let mut engine = MatchingEngine::new(settings(), vec![instrument()]).unwrap();
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

fn key(id: u32, side: Side) -> OrderKey {
	OrderKey {
		order_id: id,
		client_id: 1,
		side,
	}
}

#[test]
fn simple_cross_trades_at_the_resting_price() {
	let mut engine = continuous_engine();
	engine.insert(1, limit(1, Side::Sell, 100, 95), 2_000).unwrap();
	let outcome = engine.insert(1, limit(2, Side::Buy, 100, 105), 2_001).unwrap();

	assert_eq!(outcome.deals.len(), 1);
	assert_eq!(outcome.deals[0].price, 95);
	assert_eq!(outcome.deals[0].quantity, 100);

	let book = engine.book(1).unwrap();
	assert!(book.best_bid().is_none());
	assert!(book.best_ask().is_none());
	assert_eq!(book.deals().len(), 1);
}

#[test]
fn partial_fill_leaves_the_residue_resting() {
	let mut engine = continuous_engine();
	engine.insert(1, limit(1, Side::Sell, 50, 95), 2_000).unwrap();
	let outcome = engine.insert(1, limit(2, Side::Buy, 100, 96), 2_001).unwrap();

	assert_eq!(outcome.deals.len(), 1);
	assert_eq!(outcome.deals[0].price, 95);
	assert_eq!(outcome.deals[0].quantity, 50);
	assert!(outcome.resting);

	let book = engine.book(1).unwrap();
	assert_eq!(book.best_bid(), Some(96));
	assert_eq!(
		book.resting_order(key(2, Side::Buy)).unwrap().quantity,
		50
	);
}

#[test]
fn price_time_priority_fills_the_earlier_order() {
	let mut engine = continuous_engine();
	engine.insert(1, limit(1, Side::Sell, 50, 100), 2_000).unwrap();
	engine.insert(1, limit(2, Side::Sell, 50, 100), 2_001).unwrap();
	let outcome = engine.insert(1, limit(3, Side::Buy, 50, 100), 2_002).unwrap();

	assert_eq!(outcome.deals.len(), 1);
	assert_eq!(outcome.deals[0].sell_order_id, 1);

	let book = engine.book(1).unwrap();
	assert!(book.resting_order(key(1, Side::Sell)).is_none());
	assert!(book.resting_order(key(2, Side::Sell)).is_some());
}

#[test]
fn insert_then_delete_is_a_round_trip() {
	let mut engine = continuous_engine();
	engine.insert(1, limit(1, Side::Buy, 10, 95), 2_000).unwrap();

	let before_top = engine.book(1).unwrap().best_bid();
	let before_reference = engine.book(1).unwrap().reference_price();

	engine.insert(1, limit(2, Side::Buy, 10, 94), 2_001).unwrap();
	engine.delete(1, key(2, Side::Buy), 2_002).unwrap();

	let book = engine.book(1).unwrap();
	assert_eq!(book.best_bid(), before_top);
	assert_eq!(book.reference_price(), before_reference);
}

#[test]
fn identity_modify_is_a_noop() {
	let mut engine = continuous_engine();
	engine.insert(1, limit(1, Side::Buy, 10, 95), 2_000).unwrap();
	let before = engine
		.book(1)
		.unwrap()
		.resting_order(key(1, Side::Buy))
		.unwrap()
		.clone();

	let replace = OrderReplace {
		order_id: 1,
		client_id: 1,
		side: Side::Buy,
		price: 95,
		quantity: 10,
	};
	let outcome = engine.modify(1, replace, 2_001).unwrap();
	assert!(outcome.deals.is_empty());

	let after = engine
		.book(1)
		.unwrap()
		.resting_order(key(1, Side::Buy))
		.unwrap();
	assert_eq!(after, &before);
}

#[test]
fn band_boundary_orders_are_accepted() {
	let mut engine = continuous_engine();
	// Reference 100 at 10%: the band is the closed interval [90, 110].
	let low = engine.insert(1, limit(1, Side::Buy, 10, 90), 2_000).unwrap();
	let high = engine.insert(1, limit(2, Side::Sell, 10, 110), 2_001).unwrap();
	assert!(!low.auction_triggered);
	assert!(!high.auction_triggered);
	assert_eq!(
		engine.book(1).unwrap().phase(),
		TradingPhase::ContinuousTrading
	);
}

#[test]
fn validation_failures_are_rejections() {
	let mut engine = continuous_engine();
	assert_eq!(
		engine.insert(1, limit(1, Side::Buy, 0, 95), 2_000),
		Err(RejectReason::InvalidQuantity)
	);
	assert_eq!(
		engine.insert(1, limit(1, Side::Buy, 10, 0), 2_000),
		Err(RejectReason::InvalidPrice)
	);
	assert_eq!(
		engine.delete(1, key(9, Side::Buy), 2_000),
		Err(RejectReason::UnknownOrder)
	);
	assert_eq!(
		engine.insert(7, limit(1, Side::Buy, 10, 95), 2_000),
		Err(RejectReason::UnknownBook)
	);
}

#[test]
fn quantity_conservation_over_a_mixed_sequence() {
	let mut engine = continuous_engine();
	engine.insert(1, limit(1, Side::Sell, 30, 99), 2_000).unwrap();
	engine.insert(1, limit(2, Side::Sell, 30, 100), 2_001).unwrap();
	let outcome = engine.insert(1, limit(3, Side::Buy, 80, 100), 2_002).unwrap();

	let executed: u64 = outcome.deals.iter().map(|d| d.quantity).sum();
	let book = engine.book(1).unwrap();
	let resting = book
		.resting_order(key(3, Side::Buy))
		.map(|o| o.quantity)
		.unwrap_or(0);
	assert_eq!(executed, 60);
	assert_eq!(executed + resting, 80);

	// Both makers fully accounted for in the deal log.
	for maker in [1u32, 2u32] {
		let filled: u64 = book
			.deals()
			.iter()
			.filter(|d| d.sell_order_id == maker)
			.map(|d| d.quantity)
			.sum();
		assert_eq!(filled, 30);
	}
}
