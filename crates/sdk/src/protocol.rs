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

//! Framed TCP wire protocol for the gateway boundary.
//!
//! Every message travels as a frame: a 4-byte little-endian length prefix
//! followed by a JSON body. A session opens with `Logon` before any order
//! flow; the logon carries the client id used to scope order ids but no
//! identity semantics beyond that.
//!
//! The server replies to every inbound message. Order messages are answered
//! with an admission `Ack` (the command was queued for the matching loop) or
//! a `Reject`; matching results travel on the engine's event stream, not on
//! this connection.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::types::{ClientId, OrderId, OrderType, Price, ProductId, Quantity, Side};

/// Frames above this size are rejected before parsing.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Length of the frame header (little-endian u32 body length).
pub const FRAME_HEADER_LEN: usize = 4;

/// Messages sent by a client session to the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
	/// Session handshake. Must be the first message on a connection.
	Logon { client_id: ClientId },
	/// Keep-alive; echoed back by the server.
	Heartbeat,
	/// Submit a new order. `price` is ignored for market orders.
	NewOrder {
		product_id: ProductId,
		order_id: OrderId,
		side: Side,
		order_type: OrderType,
		price: Price,
		quantity: Quantity,
	},
	/// Replace price/quantity of a resting order.
	ModOrder {
		product_id: ProductId,
		order_id: OrderId,
		side: Side,
		price: Price,
		quantity: Quantity,
	},
	/// Cancel a resting order.
	CanOrder {
		product_id: ProductId,
		order_id: OrderId,
		side: Side,
	},
}

/// Messages sent by the exchange to a client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
	/// Handshake reply.
	LogonReply { accepted: bool },
	/// Keep-alive echo.
	Heartbeat,
	/// The order message was admitted to the matching queue.
	Ack { order_id: OrderId },
	/// The order message was refused at the gateway.
	Reject { order_id: OrderId, reason: String },
}

/// Errors crossing the wire boundary.
#[derive(Debug, Error)]
pub enum ProtocolError {
	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
	#[error("malformed frame body: {0}")]
	Malformed(#[from] serde_json::Error),
	#[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
	FrameTooLarge(usize),
	#[error("connection closed by peer")]
	ConnectionClosed,
}

/// Encode a message into a length-prefixed frame.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
	let body = serde_json::to_vec(msg)?;
	if body.len() > MAX_FRAME_LEN {
		return Err(ProtocolError::FrameTooLarge(body.len()));
	}
	let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
	frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
	frame.extend_from_slice(&body);
	Ok(frame)
}

/// Decode the body length from a frame header, validating the size limit.
pub fn body_len(header: [u8; FRAME_HEADER_LEN]) -> Result<usize, ProtocolError> {
	let len = u32::from_le_bytes(header) as usize;
	if len > MAX_FRAME_LEN {
		return Err(ProtocolError::FrameTooLarge(len));
	}
	Ok(len)
}

/// Decode a frame body.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProtocolError> {
	Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn frame_carries_header_and_body() {
		let frame = encode(&ClientMessage::Heartbeat).unwrap();
		let mut header = [0u8; FRAME_HEADER_LEN];
		header.copy_from_slice(&frame[..FRAME_HEADER_LEN]);
		let len = body_len(header).unwrap();
		assert_eq!(len, frame.len() - FRAME_HEADER_LEN);

		let msg: ClientMessage = decode(&frame[FRAME_HEADER_LEN..]).unwrap();
		assert_eq!(msg, ClientMessage::Heartbeat);
	}

	#[test]
	fn oversized_header_is_refused() {
		let header = (MAX_FRAME_LEN as u32 + 1).to_le_bytes();
		assert!(matches!(
			body_len(header),
			Err(ProtocolError::FrameTooLarge(_))
		));
	}

	#[test]
	fn garbage_body_is_malformed() {
		let err = decode::<ClientMessage>(b"not json").unwrap_err();
		assert!(matches!(err, ProtocolError::Malformed(_)));
	}
}
