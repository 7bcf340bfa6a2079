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

//! Matching loop runtime
//!
//! Runs the matching engine on one dedicated thread: drain the ingress
//! queue, apply each command, advance the phase machine, publish events.
//! All engine state changes happen on this thread, which is what makes the
//! ordering guarantees trivial.
//!
//! The clock is injected. Production passes wall-clock seconds; tests pass
//! a manual clock, making every phase transition reproducible.

use std::sync::{
	Arc,
	atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};

use tracing::{error, info, warn};

use crucible_sdk::types::Timestamp;

use crate::engine::MatchingEngine;
use crate::event::EventProducer;
use crate::queue::{QueueError, QueueReceiver};

/// Handle of the running matching loop.
pub struct EngineRuntime {
	thread_handle: Option<JoinHandle<()>>,
	shutdown: Arc<AtomicBool>,
}

impl EngineRuntime {
	/// Start the matching loop on its own thread.
	pub fn start<C>(
		mut engine: MatchingEngine,
		receiver: QueueReceiver,
		events: EventProducer,
		clock: C,
	) -> std::io::Result<Self>
	where
		C: Fn() -> Timestamp + Send + 'static,
	{
		let shutdown = Arc::new(AtomicBool::new(false));
		let shutdown_flag = shutdown.clone();

		let thread_handle = thread::Builder::new()
			.name("matching-loop".to_string())
			.spawn(move || {
				info!("matching loop started");
				run_matching_loop(&mut engine, &receiver, &events, &clock, &shutdown_flag);
				info!("matching loop stopped");
			})?;

		Ok(Self {
			thread_handle: Some(thread_handle),
			shutdown,
		})
	}

	/// Stop the matching loop and wait for it to finish.
	pub fn shutdown(mut self) {
		info!("shutting down matching loop");
		self.shutdown.store(true, Ordering::Relaxed);
		if let Some(handle) = self.thread_handle.take()
			&& handle.join().is_err()
		{
			warn!("matching loop thread panicked");
		}
	}
}

impl Drop for EngineRuntime {
	fn drop(&mut self) {
		self.shutdown.store(true, Ordering::Relaxed);
		if let Some(handle) = self.thread_handle.take() {
			let _ = handle.join();
		}
	}
}

/// The loop itself: commands first, then time.
///
/// Commands are processed strictly in queue order; between commands the
/// engine observes the clock once per iteration to drive phase
/// transitions.
fn run_matching_loop<C>(
	engine: &mut MatchingEngine,
	receiver: &QueueReceiver,
	events: &EventProducer,
	clock: &C,
	shutdown: &AtomicBool,
) where
	C: Fn() -> Timestamp,
{
	loop {
		if shutdown.load(Ordering::Relaxed) {
			break;
		}

		match receiver.try_recv() {
			Ok(command) => {
				if let Err(e) = engine.apply(command, clock()) {
					// Invariant violations are programming errors: dump
					// what we can and halt the loop.
					error!(%e, "fatal engine error, halting matching loop");
					publish_events(engine, events);
					break;
				}
			}
			Err(QueueError::Empty) => {
				engine.tick(clock());
				publish_events(engine, events);
				thread::sleep(std::time::Duration::from_millis(1));
				continue;
			}
			Err(QueueError::Disconnected) => {
				warn!("ingress queue disconnected, stopping");
				break;
			}
			Err(QueueError::Full) => {
				// try_recv never reports Full.
				continue;
			}
		}

		engine.tick(clock());
		publish_events(engine, events);
	}
}

fn publish_events(engine: &mut MatchingEngine, events: &EventProducer) {
	for event in engine.take_events() {
		if let Err(e) = events.push(event) {
			// Dropping events is preferable to blocking the matching
			// loop; the observer sees the gap in sequence numbers.
			warn!(%e, "event buffer pressure, dropping event");
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicI64, Ordering};

	use crucible_sdk::types::{Currency, Instrument, OrderType, Side, TradingPhase};

	use super::*;
	use crate::config::{AuctionDurations, EngineSettings, SessionSchedule};
	use crate::event::{EventBuffer, ExchangeEvent};
	use crate::queue::IngressQueue;
	use crate::types::{EngineCommand, OrderRequest};

	fn engine() -> MatchingEngine {
		let settings = EngineSettings {
			schedule: SessionSchedule {
				open: 1_000,
				close: 10_000,
			},
			durations: AuctionDurations {
				opening: 60,
				closing: 60,
				intraday: 300,
			},
			deviation_bps: 1_000,
		};
		MatchingEngine::new(
			settings,
			vec![Instrument {
				product_id: 1,
				name: "ACME".to_string(),
				currency: Currency::Eur,
				tick_size: 1,
				lot_size: 1,
				reference_price: 100,
			}],
		)
		.unwrap()
	}

	fn insert(order_id: u32, side: Side, quantity: u64, price: u64) -> EngineCommand {
		EngineCommand::Insert {
			product_id: 1,
			request: OrderRequest {
				order_id,
				client_id: 1,
				side,
				order_type: OrderType::Limit,
				price,
				quantity,
			},
		}
	}

	#[test]
	fn loop_processes_commands_and_publishes_events() {
		let (sender, receiver) = IngressQueue::new(64).split();
		let (producer, consumer) = EventBuffer::new(64).split();

		// Manual clock starting inside the open window: the loop ticks the
		// engine into the opening auction on its own.
		let now = Arc::new(AtomicI64::new(1_060));
		let clock_now = now.clone();
		let runtime = EngineRuntime::start(engine(), receiver, producer, move || {
			clock_now.load(Ordering::Relaxed)
		})
		.unwrap();

		sender.try_enqueue(insert(1, Side::Sell, 10, 100)).unwrap();
		sender.try_enqueue(insert(2, Side::Buy, 10, 100)).unwrap();

		// Let the opening auction elapse; the transition uncrosses the pair
		// (or, if the commands arrive later, they match continuously).
		now.store(1_120, Ordering::Relaxed);
		let mut deals = 0;
		for _ in 0..200 {
			match consumer.try_recv() {
				Ok(ExchangeEvent::DealExecuted { deal, .. }) => {
					assert_eq!(deal.price, 100);
					deals += 1;
					break;
				}
				Ok(_) => {}
				Err(_) => thread::sleep(std::time::Duration::from_millis(2)),
			}
		}
		assert_eq!(deals, 1);

		runtime.shutdown();
	}

	#[test]
	fn loop_advances_phases_from_the_clock() {
		let (_sender, receiver) = IngressQueue::new(8).split();
		let (producer, consumer) = EventBuffer::new(64).split();

		let now = Arc::new(AtomicI64::new(999));
		let clock_now = now.clone();
		let runtime = EngineRuntime::start(engine(), receiver, producer, move || {
			clock_now.load(Ordering::Relaxed)
		})
		.unwrap();

		// Move the clock into the open window and wait for the global
		// phase change to surface on the event stream.
		now.store(1_000, Ordering::Relaxed);
		let mut seen_opening = false;
		for _ in 0..200 {
			match consumer.try_recv() {
				Ok(ExchangeEvent::PhaseChanged {
					product_id: None,
					phase: TradingPhase::OpeningAuction,
					..
				}) => {
					seen_opening = true;
					break;
				}
				Ok(_) => {}
				Err(_) => thread::sleep(std::time::Duration::from_millis(2)),
			}
		}
		assert!(seen_opening);

		runtime.shutdown();
	}
}
