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

use super::ExchangeEvent;

/// SPSC event buffer between the matching loop and its observer
///
/// The buffer decouples event production (matching loop) from consumption
/// (logging, market-data bridges, tests), so the matching loop never blocks
/// on an observer.
///
/// Properties:
/// - Single Producer (matching loop)
/// - Single Consumer (observer)
/// - Bounded capacity for backpressure
/// - Non-blocking send with explicit failure when full
pub struct EventBuffer {
	sender: Sender<ExchangeEvent>,
	receiver: Receiver<ExchangeEvent>,
}

impl EventBuffer {
	/// Create a new event buffer with the specified capacity
	pub fn new(capacity: usize) -> Self {
		let (sender, receiver) = bounded(capacity);
		Self { sender, receiver }
	}

	/// Split the buffer into producer and consumer ends
	pub fn split(self) -> (EventProducer, EventConsumer) {
		(
			EventProducer {
				sender: self.sender,
			},
			EventConsumer {
				receiver: self.receiver,
			},
		)
	}
}

/// Producer end of the event buffer (used by the matching loop)
pub struct EventProducer {
	sender: Sender<ExchangeEvent>,
}

impl EventProducer {
	/// Push an event to the buffer
	///
	/// Returns an error when the buffer is full; the matching loop logs
	/// the pressure and drops the event rather than blocking.
	pub fn push(&self, event: ExchangeEvent) -> Result<(), EventBufferError> {
		self.sender.try_send(event).map_err(|e| match e {
			TrySendError::Full(_) => EventBufferError::Full,
			TrySendError::Disconnected(_) => EventBufferError::Disconnected,
		})
	}

	/// Check if the buffer is full
	pub fn is_full(&self) -> bool {
		self.sender.is_full()
	}
}

/// Consumer end of the event buffer (used by the observer)
pub struct EventConsumer {
	receiver: Receiver<ExchangeEvent>,
}

impl EventConsumer {
	/// Receive an event from the buffer (blocking)
	pub fn recv(&self) -> Result<ExchangeEvent, EventBufferError> {
		self.receiver
			.recv()
			.map_err(|_| EventBufferError::Disconnected)
	}

	/// Try to receive an event from the buffer (non-blocking)
	pub fn try_recv(&self) -> Result<ExchangeEvent, EventBufferError> {
		self.receiver.try_recv().map_err(|e| match e {
			TryRecvError::Empty => EventBufferError::Empty,
			TryRecvError::Disconnected => EventBufferError::Disconnected,
		})
	}

	/// Drain up to `max_count` events from the buffer (non-blocking)
	pub fn drain(&self, max_count: usize) -> Vec<ExchangeEvent> {
		let mut events = Vec::with_capacity(max_count);
		for _ in 0..max_count {
			match self.try_recv() {
				Ok(event) => events.push(event),
				Err(_) => break,
			}
		}
		events
	}
}

/// Errors that can occur when interacting with the event buffer
#[derive(Debug, thiserror::Error)]
pub enum EventBufferError {
	#[error("event buffer is full")]
	Full,
	#[error("event buffer is empty")]
	Empty,
	#[error("event buffer disconnected")]
	Disconnected,
}
