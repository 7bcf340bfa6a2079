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

use crucible_sdk::types::{Price, Quantity};

use crate::types::{Order, OrderKey};

/// Price level in the order book
///
/// A price level holds all orders at one price in time priority order
/// (first-in-first-out) and maintains the running total of open quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevel {
	price: Price,
	/// Orders at this price in time priority order
	orders: Vec<Order>,
	/// Total open quantity across all orders at this level
	total_quantity: Quantity,
}

impl PriceLevel {
	pub fn new(price: Price) -> Self {
		Self {
			price,
			orders: Vec::new(),
			total_quantity: 0,
		}
	}

	pub fn price(&self) -> Price {
		self.price
	}

	pub fn push(&mut self, order: Order) {
		debug_assert_eq!(order.price, self.price);
		self.total_quantity += order.quantity;
		self.orders.push(order);
	}

	pub fn front(&self) -> Option<&Order> {
		self.orders.first()
	}

	/// Remove and return the order at the front of the queue.
	pub fn pop_front(&mut self) -> Option<Order> {
		if self.orders.is_empty() {
			return None;
		}
		let order = self.orders.remove(0);
		self.total_quantity -= order.quantity;
		Some(order)
	}

	/// Reduce the front order's open quantity after a partial fill.
	pub fn fill_front(&mut self, quantity: Quantity) {
		if let Some(order) = self.orders.first_mut() {
			debug_assert!(quantity < order.quantity);
			order.quantity -= quantity;
			self.total_quantity -= quantity;
		}
	}

	/// Remove an order by identity, preserving the queue order of the rest.
	pub fn remove(&mut self, key: OrderKey) -> Option<Order> {
		let pos = self.orders.iter().position(|o| o.key() == key)?;
		let order = self.orders.remove(pos);
		self.total_quantity -= order.quantity;
		Some(order)
	}

	pub fn get(&self, key: OrderKey) -> Option<&Order> {
		self.orders.iter().find(|o| o.key() == key)
	}

	/// In-place quantity decrease; keeps the order's queue position and
	/// insertion sequence. The caller guarantees `new_quantity` is smaller
	/// than the current open quantity and strictly positive.
	pub fn decrease(&mut self, key: OrderKey, new_quantity: Quantity) -> bool {
		if let Some(order) = self.orders.iter_mut().find(|o| o.key() == key) {
			debug_assert!(new_quantity < order.quantity);
			let delta = order.quantity - new_quantity;
			order.quantity = new_quantity;
			order.original_quantity -= delta;
			self.total_quantity -= delta;
			true
		} else {
			false
		}
	}

	pub fn is_empty(&self) -> bool {
		self.orders.is_empty()
	}

	pub fn total_quantity(&self) -> Quantity {
		self.total_quantity
	}

	pub fn order_count(&self) -> usize {
		self.orders.len()
	}

	pub fn orders(&self) -> impl Iterator<Item = &Order> {
		self.orders.iter()
	}
}

#[cfg(test)]
mod tests {
	use crucible_sdk::types::{OrderType, Side};

	use super::*;

	fn order(id: u32, qty: u64, seq: u64) -> Order {
		Order {
			order_id: id,
			client_id: 1,
			side: Side::Buy,
			order_type: OrderType::Limit,
			price: 100,
			quantity: qty,
			original_quantity: qty,
			insertion_seq: seq,
		}
	}

	#[test]
	fn fifo_order_is_kept() {
		let mut level = PriceLevel::new(100);
		level.push(order(1, 10, 1));
		level.push(order(2, 20, 2));
		level.push(order(3, 30, 3));

		assert_eq!(level.total_quantity(), 60);
		assert_eq!(level.front().unwrap().order_id, 1);

		level.pop_front();
		assert_eq!(level.front().unwrap().order_id, 2);
		assert_eq!(level.total_quantity(), 50);
	}

	#[test]
	fn remove_keeps_remaining_queue_order() {
		let mut level = PriceLevel::new(100);
		level.push(order(1, 10, 1));
		level.push(order(2, 20, 2));
		level.push(order(3, 30, 3));

		let removed = level
			.remove(OrderKey {
				order_id: 2,
				client_id: 1,
				side: Side::Buy,
			})
			.unwrap();
		assert_eq!(removed.quantity, 20);
		assert_eq!(level.total_quantity(), 40);

		assert_eq!(level.front().unwrap().order_id, 1);
		level.pop_front();
		assert_eq!(level.front().unwrap().order_id, 3);
	}

	#[test]
	fn decrease_keeps_position_and_adjusts_totals() {
		let mut level = PriceLevel::new(100);
		level.push(order(1, 10, 1));
		level.push(order(2, 20, 2));

		let key = OrderKey {
			order_id: 2,
			client_id: 1,
			side: Side::Buy,
		};
		assert!(level.decrease(key, 5));
		assert_eq!(level.total_quantity(), 15);

		let updated = level.get(key).unwrap();
		assert_eq!(updated.quantity, 5);
		assert_eq!(updated.original_quantity, 5);
		assert_eq!(updated.insertion_seq, 2);
	}

	#[test]
	fn fill_front_partial() {
		let mut level = PriceLevel::new(100);
		level.push(order(1, 10, 1));
		level.fill_front(4);
		assert_eq!(level.front().unwrap().quantity, 6);
		assert_eq!(level.total_quantity(), 6);
	}
}
