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

//! Exchange engine service entry point
//!
//! Takes a configuration path, builds one book per instrument, starts the
//! matching loop and the TCP gateway listener, and runs until ctrl-c.
//! Exits non-zero on any configuration failure.

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{debug, info};

use crucible_engine::{
	EngineConfig, EngineRuntime, EventBuffer, ExchangeEvent, IngressQueue, MatchingEngine,
	instruments, logging, server,
};

const INGRESS_CAPACITY: usize = 4_096;
const EVENT_CAPACITY: usize = 16_384;

#[tokio::main]
async fn main() -> Result<()> {
	logging::init_logging()?;

	let config_path = std::env::args()
		.nth(1)
		.context("usage: crucible-engine <config-path>")?;
	let config = EngineConfig::from_file(&config_path)
		.with_context(|| format!("failed to load configuration from {}", config_path))?;
	let instruments = instruments::load(&config.instrument_db_path)
		.context("failed to load instrument database")?;

	// Session boundaries resolve against today's date exactly once; from
	// here on the engine only compares injected timestamps.
	let settings = config.settings_for(chrono::Local::now().date_naive());
	let engine = MatchingEngine::new(settings, instruments)?;

	let (queue_sender, queue_receiver) = IngressQueue::new(INGRESS_CAPACITY).split();
	let (event_producer, event_consumer) = EventBuffer::new(EVENT_CAPACITY).split();

	// Default observer: put the deal stream into the log.
	let observer = std::thread::Builder::new()
		.name("event-observer".to_string())
		.spawn(move || {
			while let Ok(event) = event_consumer.recv() {
				match event {
					ExchangeEvent::DealExecuted {
						product_id, deal, ..
					} => {
						info!(
							product_id,
							price = deal.price,
							quantity = deal.quantity,
							sequence = deal.sequence,
							"deal"
						);
					}
					other => debug!(?other, "event"),
				}
			}
		})
		.context("failed to spawn event observer")?;

	let runtime = EngineRuntime::start(engine, queue_receiver, event_producer, || {
		chrono::Local::now().timestamp()
	})
	.context("failed to start matching loop")?;

	let listener = server::bind(config.listen_addr)
		.await
		.with_context(|| format!("failed to bind {}", config.listen_addr))?;
	info!(addr = %config.listen_addr, "gateway listening");
	tokio::spawn(server::serve(listener, queue_sender));

	signal::ctrl_c().await?;
	info!("shutting down");
	runtime.shutdown();
	let _ = observer.join();

	Ok(())
}
