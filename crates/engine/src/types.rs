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

use serde::{Deserialize, Serialize};

use crucible_sdk::types::{
	ClientId, Deal, OrderId, OrderType, Price, ProductId, Quantity, Side,
};

/// Immutable identity of an order inside a book.
///
/// `client_id` scopes `order_id`, and the two sides of a book are separate
/// id spaces, so the full triple is the index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderKey {
	pub order_id: OrderId,
	pub client_id: ClientId,
	pub side: Side,
}

/// Order command received from the gateway boundary
///
/// This is an incoming intent that has passed protocol-level validation and
/// is ready to enter the matching pipeline. The book turns an accepted
/// request into a resting [`Order`] by assigning the insertion sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
	pub order_id: OrderId,
	pub client_id: ClientId,
	pub side: Side,
	pub order_type: OrderType,
	/// Limit price in ticks; ignored for market orders.
	pub price: Price,
	pub quantity: Quantity,
}

impl OrderRequest {
	pub fn key(&self) -> OrderKey {
		OrderKey {
			order_id: self.order_id,
			client_id: self.client_id,
			side: self.side,
		}
	}
}

/// Replace command for a resting order.
///
/// A replace that changes price or increases quantity forfeits time
/// priority; a strict quantity decrease at unchanged price keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReplace {
	pub order_id: OrderId,
	pub client_id: ClientId,
	pub side: Side,
	pub price: Price,
	pub quantity: Quantity,
}

impl OrderReplace {
	pub fn key(&self) -> OrderKey {
		OrderKey {
			order_id: self.order_id,
			client_id: self.client_id,
			side: self.side,
		}
	}
}

/// An order resting in (or passing through) a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
	pub order_id: OrderId,
	pub client_id: ClientId,
	pub side: Side,
	pub order_type: OrderType,
	pub price: Price,
	/// Remaining open quantity. Strictly positive while resting.
	pub quantity: Quantity,
	/// Quantity at acceptance; `quantity` plus executed volume always
	/// equals this.
	pub original_quantity: Quantity,
	/// Book-local monotonic sequence, the time-priority tiebreak.
	pub insertion_seq: u64,
}

impl Order {
	pub fn key(&self) -> OrderKey {
		OrderKey {
			order_id: self.order_id,
			client_id: self.client_id,
			side: self.side,
		}
	}
}

/// Why an order operation was refused.
///
/// Rejections are input errors surfaced to the caller; they are never
/// engine failures and are logged at debug level only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
	#[error("unknown product")]
	UnknownBook,
	#[error("price must be strictly positive")]
	InvalidPrice,
	#[error("quantity must be strictly positive")]
	InvalidQuantity,
	#[error("order not found")]
	UnknownOrder,
	#[error("book is closed")]
	BookClosed,
	#[error("no reference trade for market order")]
	NoReferenceForMarket,
}

/// Result of inserting (or re-inserting via modify) an order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOutcome {
	/// Deals executed immediately, in execution order.
	pub deals: Vec<Deal>,
	/// True when a remainder was queued on the book.
	pub resting: bool,
	/// True when this order breached the deviation band and switched the
	/// book into an intraday auction.
	pub auction_triggered: bool,
}

impl InsertOutcome {
	pub fn executed_quantity(&self) -> Quantity {
		self.deals.iter().map(|d| d.quantity).sum()
	}
}

/// Commands flowing from the gateway to the matching loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineCommand {
	Insert {
		product_id: ProductId,
		request: OrderRequest,
	},
	Modify {
		product_id: ProductId,
		replace: OrderReplace,
	},
	Cancel {
		product_id: ProductId,
		key: OrderKey,
	},
}

impl EngineCommand {
	/// The book this command is addressed to.
	pub fn product_id(&self) -> ProductId {
		match self {
			EngineCommand::Insert { product_id, .. } => *product_id,
			EngineCommand::Modify { product_id, .. } => *product_id,
			EngineCommand::Cancel { product_id, .. } => *product_id,
		}
	}

	/// The order identity this command refers to.
	pub fn order_key(&self) -> OrderKey {
		match self {
			EngineCommand::Insert { request, .. } => request.key(),
			EngineCommand::Modify { replace, .. } => replace.key(),
			EngineCommand::Cancel { key, .. } => *key,
		}
	}
}
