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

mod buffer;

pub use buffer::{EventBuffer, EventBufferError, EventConsumer, EventProducer};

use serde::{Deserialize, Serialize};

use crucible_sdk::types::{
	ClientId, Deal, OrderId, Price, ProductId, Quantity, Side, Timestamp, TradingPhase,
};

/// Sequence number for event ordering
///
/// Events carry engine-global, monotonically increasing sequence numbers
/// so observers see one total order of state changes.
pub type SequenceNumber = u64;

/// Events produced by the matching engine
///
/// This is the outbound stream of the engine: every accepted or rejected
/// order, every committed deal, every auction and phase transition is
/// published here at commit time. Observers (loggers, market-data bridges,
/// test harnesses) consume the stream through the event buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExchangeEvent {
	/// Order was accepted and is resting on its book
	OrderAccepted {
		seq: SequenceNumber,
		product_id: ProductId,
		order_id: OrderId,
		client_id: ClientId,
		side: Side,
		price: Price,
		quantity: Quantity,
		timestamp: Timestamp,
	},

	/// Order was refused; `reason` is the rejection's display form
	OrderRejected {
		seq: SequenceNumber,
		product_id: ProductId,
		order_id: OrderId,
		client_id: ClientId,
		side: Side,
		reason: String,
		timestamp: Timestamp,
	},

	/// Order left the book without trading. `unsolicited` is true when the
	/// engine cancelled it (session close), false for client cancels.
	OrderCancelled {
		seq: SequenceNumber,
		product_id: ProductId,
		order_id: OrderId,
		client_id: ClientId,
		side: Side,
		remaining_quantity: Quantity,
		unsolicited: bool,
		timestamp: Timestamp,
	},

	/// A deal was committed to a book's deal log
	DealExecuted {
		seq: SequenceNumber,
		product_id: ProductId,
		deal: Deal,
	},

	/// A book entered an intraday auction after a deviation breach
	AuctionStarted {
		seq: SequenceNumber,
		product_id: ProductId,
		auction_end: Timestamp,
	},

	/// A phase transition. `product_id` is `None` for global transitions
	/// and set for book-local ones (intraday auction resolution).
	PhaseChanged {
		seq: SequenceNumber,
		product_id: Option<ProductId>,
		phase: TradingPhase,
		timestamp: Timestamp,
	},
}

impl ExchangeEvent {
	/// Get the sequence number of this event
	pub fn sequence(&self) -> SequenceNumber {
		match self {
			ExchangeEvent::OrderAccepted { seq, .. } => *seq,
			ExchangeEvent::OrderRejected { seq, .. } => *seq,
			ExchangeEvent::OrderCancelled { seq, .. } => *seq,
			ExchangeEvent::DealExecuted { seq, .. } => *seq,
			ExchangeEvent::AuctionStarted { seq, .. } => *seq,
			ExchangeEvent::PhaseChanged { seq, .. } => *seq,
		}
	}

	/// Get the book this event belongs to, if it is book-scoped
	pub fn product_id(&self) -> Option<ProductId> {
		match self {
			ExchangeEvent::OrderAccepted { product_id, .. } => Some(*product_id),
			ExchangeEvent::OrderRejected { product_id, .. } => Some(*product_id),
			ExchangeEvent::OrderCancelled { product_id, .. } => Some(*product_id),
			ExchangeEvent::DealExecuted { product_id, .. } => Some(*product_id),
			ExchangeEvent::AuctionStarted { product_id, .. } => Some(*product_id),
			ExchangeEvent::PhaseChanged { product_id, .. } => *product_id,
		}
	}

	/// True for the events that remove an order from its book
	pub fn closes_order(&self) -> bool {
		matches!(
			self,
			ExchangeEvent::OrderCancelled { .. } | ExchangeEvent::OrderRejected { .. }
		)
	}
}
