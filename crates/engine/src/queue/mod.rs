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

use crossbeam::channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};

use crate::types::EngineCommand;

/// Ingress queue between gateway sessions and the matching loop
///
/// The queue is the boundary between the multi-threaded gateway side and
/// the single-threaded matching loop, and fixes the order in which the
/// engine observes commands: the deal stream of a book is a total order
/// derived from this queue order.
///
/// Properties:
/// - Multiple Producers (gateway session tasks)
/// - Single Consumer (matching loop)
/// - Bounded capacity for backpressure
/// - Explicit failure semantics when full
///
/// When the queue is full, the gateway rejects the order at admission
/// rather than blocking a session on the matching loop.
pub struct IngressQueue {
	sender: Sender<EngineCommand>,
	receiver: Receiver<EngineCommand>,
}

impl IngressQueue {
	/// Create a new ingress queue with the specified capacity
	pub fn new(capacity: usize) -> Self {
		let (sender, receiver) = bounded(capacity);
		Self { sender, receiver }
	}

	/// Split the queue into sender and receiver ends
	///
	/// The sender can be cloned across gateway sessions; the receiver must
	/// remain unique to the matching loop.
	pub fn split(self) -> (QueueSender, QueueReceiver) {
		(
			QueueSender {
				sender: self.sender,
			},
			QueueReceiver {
				receiver: self.receiver,
			},
		)
	}
}

/// Sender end of the ingress queue (used by gateway sessions)
#[derive(Clone)]
pub struct QueueSender {
	sender: Sender<EngineCommand>,
}

impl QueueSender {
	/// Try to enqueue a command (non-blocking)
	///
	/// Returns an error when the queue is full, signalling that the
	/// matching loop is overloaded and the command must be rejected.
	pub fn try_enqueue(&self, cmd: EngineCommand) -> Result<(), QueueError> {
		self.sender.try_send(cmd).map_err(|e| match e {
			TrySendError::Full(_) => QueueError::Full,
			TrySendError::Disconnected(_) => QueueError::Disconnected,
		})
	}

	/// Check if the queue is full
	pub fn is_full(&self) -> bool {
		self.sender.is_full()
	}
}

/// Receiver end of the ingress queue (used by the matching loop)
pub struct QueueReceiver {
	receiver: Receiver<EngineCommand>,
}

impl QueueReceiver {
	/// Receive a command (blocking)
	pub fn recv(&self) -> Result<EngineCommand, QueueError> {
		self.receiver.recv().map_err(|_| QueueError::Disconnected)
	}

	/// Try to receive a command (non-blocking)
	///
	/// The matching loop polls with this so it can interleave time-driven
	/// phase transitions with command processing.
	pub fn try_recv(&self) -> Result<EngineCommand, QueueError> {
		self.receiver.try_recv().map_err(|e| match e {
			TryRecvError::Empty => QueueError::Empty,
			TryRecvError::Disconnected => QueueError::Disconnected,
		})
	}
}

/// Errors that can occur when interacting with the ingress queue
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
	#[error("queue is full")]
	Full,
	#[error("queue is empty")]
	Empty,
	#[error("queue disconnected")]
	Disconnected,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::OrderRequest;
	use crucible_sdk::types::{OrderType, Side};

	fn insert_command(order_id: u32) -> EngineCommand {
		EngineCommand::Insert {
			product_id: 1,
			request: OrderRequest {
				order_id,
				client_id: 1,
				side: Side::Buy,
				order_type: OrderType::Limit,
				price: 100,
				quantity: 10,
			},
		}
	}

	#[test]
	fn enqueue_and_recv() {
		let (sender, receiver) = IngressQueue::new(10).split();
		sender.try_enqueue(insert_command(1)).unwrap();
		let cmd = receiver.recv().unwrap();
		assert_eq!(cmd.order_key().order_id, 1);
	}

	#[test]
	fn full_queue_rejects() {
		let (sender, _receiver) = IngressQueue::new(2).split();
		sender.try_enqueue(insert_command(1)).unwrap();
		sender.try_enqueue(insert_command(2)).unwrap();
		assert!(matches!(
			sender.try_enqueue(insert_command(3)),
			Err(QueueError::Full)
		));
	}

	#[test]
	fn senders_can_be_cloned() {
		let (sender, receiver) = IngressQueue::new(10).split();
		let second = sender.clone();
		sender.try_enqueue(insert_command(1)).unwrap();
		second.try_enqueue(insert_command(2)).unwrap();

		let first = receiver.recv().unwrap().order_key().order_id;
		let next = receiver.recv().unwrap().order_key().order_id;
		assert_ne!(first, next);
	}
}
