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

//! Crucible SDK
//!
//! Shared vocabulary of the Crucible exchange: the value types every
//! component agrees on (sides, phases, instruments, deals), the framed TCP
//! wire protocol spoken at the gateway boundary, and a small blocking client
//! for tools and integration tests.

pub mod client;
pub mod protocol;
pub mod types;

pub use client::GatewayClient;
pub use protocol::{ClientMessage, ProtocolError, ServerMessage};
pub use types::*;
