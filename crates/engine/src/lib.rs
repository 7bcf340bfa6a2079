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

//! Crucible Matching Engine
//!
//! The matching core of the Crucible exchange: per-instrument
//! price-time-priority order books, continuous matching, auction
//! uncrossing, and the trading-phase state machine at global and
//! per-instrument scope.
//!
//! Architecture:
//! - Single-threaded matching core for deterministic behavior
//! - MPSC ingress queue between gateway sessions and the matching loop
//! - SPSC event buffer publishing every state change at commit time
//! - Injected clock: `tick(now)` is the only time-driven entry point,
//!   so the whole engine is reproducible under test
//! - Intraday auctions triggered per book by price-deviation breaches

pub mod auction;
pub mod book;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod instruments;
pub mod logging;
pub mod otel;
pub mod queue;
pub mod runtime;
pub mod server;
pub mod types;

pub use book::{OrderBook, PhaseChange, UncrossSummary};
pub use config::{AuctionDurations, EngineConfig, EngineSettings, SessionSchedule};
pub use engine::MatchingEngine;
pub use error::{ConfigError, EngineError};
pub use event::{
	EventBuffer, EventBufferError, EventConsumer, EventProducer, ExchangeEvent, SequenceNumber,
};
pub use queue::{IngressQueue, QueueError, QueueReceiver, QueueSender};
pub use runtime::EngineRuntime;
pub use types::*;
