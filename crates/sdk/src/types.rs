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

use std::fmt;

use serde::{Deserialize, Serialize};

/// Price in integer ticks. Always strictly positive for resting orders.
pub type Price = u64;

/// Open quantity in lots.
pub type Quantity = u64;

/// Order identifier, scoped by the submitting client: two clients may reuse
/// the same order id without collision.
pub type OrderId = u32;

/// Client identifier assigned at the gateway boundary.
pub type ClientId = u32;

/// Instrument identifier, unique across the instrument database.
pub type ProductId = u32;

/// Unix epoch seconds. The core never reads a wall clock; every timestamp
/// is supplied by the caller.
pub type Timestamp = i64;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	Buy,
	Sell,
}

impl Side {
	/// The side an aggressor of this side matches against.
	pub fn opposite(self) -> Side {
		match self {
			Side::Buy => Side::Sell,
			Side::Sell => Side::Buy,
		}
	}
}

impl fmt::Display for Side {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Side::Buy => write!(f, "buy"),
			Side::Sell => write!(f, "sell"),
		}
	}
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
	Limit,
	Market,
}

/// Trading phase of a book or of the whole session.
///
/// The global session only ever cycles through the first three open phases
/// and `Closed`; `IntradayAuction` is entered per book when an order breaches
/// the price-deviation band during continuous trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingPhase {
	OpeningAuction,
	ContinuousTrading,
	ClosingAuction,
	IntradayAuction,
	Closed,
}

impl TradingPhase {
	/// True for the three phases that accumulate orders and resolve through
	/// the uncrossing algorithm.
	pub fn is_auction(self) -> bool {
		matches!(
			self,
			TradingPhase::OpeningAuction
				| TradingPhase::ClosingAuction
				| TradingPhase::IntradayAuction
		)
	}

	/// True for phases that accept order flow.
	pub fn accepts_orders(self) -> bool {
		self != TradingPhase::Closed
	}

	/// True for the phases the engine may set globally. `IntradayAuction`
	/// is managed at book level and is not a valid global phase.
	pub fn is_global(self) -> bool {
		self != TradingPhase::IntradayAuction
	}
}

impl fmt::Display for TradingPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			TradingPhase::OpeningAuction => "opening_auction",
			TradingPhase::ContinuousTrading => "continuous_trading",
			TradingPhase::ClosingAuction => "closing_auction",
			TradingPhase::IntradayAuction => "intraday_auction",
			TradingPhase::Closed => "closed",
		};
		write!(f, "{}", name)
	}
}

/// Quotation currency of an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Currency {
	Eur = 0,
	Usd = 1,
	Gbp = 2,
	Chf = 3,
	Jpy = 4,
}

/// Static description of a tradeable instrument, loaded from the instrument
/// database at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
	/// Unique product identifier
	pub product_id: ProductId,
	/// Unique display name (e.g., "ACME")
	pub name: String,
	/// Quotation currency
	pub currency: Currency,
	/// Minimum price increment in ticks
	pub tick_size: u64,
	/// Minimum order quantity in lots
	pub lot_size: u64,
	/// Reference price seeding the deviation band, typically the previous
	/// session's close
	pub reference_price: Price,
}

/// One execution between a buy and a sell order.
///
/// Deals are append-only per book; `sequence` is the book-local, strictly
/// increasing deal number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
	pub price: Price,
	pub quantity: Quantity,
	pub buy_order_id: OrderId,
	pub buy_client_id: ClientId,
	pub sell_order_id: OrderId,
	pub sell_client_id: ClientId,
	pub timestamp: Timestamp,
	pub sequence: u64,
}
