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

//! Blocking gateway client.
//!
//! A thin synchronous client over the framed protocol, intended for tools
//! and integration tests rather than latency-sensitive order flow.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use crate::protocol::{self, ClientMessage, FRAME_HEADER_LEN, ProtocolError, ServerMessage};
use crate::types::{ClientId, OrderId, OrderType, Price, ProductId, Quantity, Side};

/// Synchronous client for one gateway session.
pub struct GatewayClient {
	stream: TcpStream,
	client_id: ClientId,
}

impl GatewayClient {
	/// Connect and perform the logon handshake.
	pub fn connect<A: ToSocketAddrs>(
		addr: A,
		client_id: ClientId,
	) -> Result<Self, ProtocolError> {
		let stream = TcpStream::connect(addr)?;
		let mut client = Self { stream, client_id };
		client.send(&ClientMessage::Logon { client_id })?;
		match client.read_message()? {
			ServerMessage::LogonReply { accepted: true } => Ok(client),
			other => Err(ProtocolError::Io(std::io::Error::other(format!(
				"logon refused: {:?}",
				other
			)))),
		}
	}

	/// The client id this session logged on with.
	pub fn client_id(&self) -> ClientId {
		self.client_id
	}

	/// Submit a new order and wait for the admission reply.
	pub fn new_order(
		&mut self,
		product_id: ProductId,
		order_id: OrderId,
		side: Side,
		order_type: OrderType,
		price: Price,
		quantity: Quantity,
	) -> Result<ServerMessage, ProtocolError> {
		self.send(&ClientMessage::NewOrder {
			product_id,
			order_id,
			side,
			order_type,
			price,
			quantity,
		})?;
		self.read_message()
	}

	/// Replace a resting order and wait for the admission reply.
	pub fn mod_order(
		&mut self,
		product_id: ProductId,
		order_id: OrderId,
		side: Side,
		price: Price,
		quantity: Quantity,
	) -> Result<ServerMessage, ProtocolError> {
		self.send(&ClientMessage::ModOrder {
			product_id,
			order_id,
			side,
			price,
			quantity,
		})?;
		self.read_message()
	}

	/// Cancel a resting order and wait for the admission reply.
	pub fn can_order(
		&mut self,
		product_id: ProductId,
		order_id: OrderId,
		side: Side,
	) -> Result<ServerMessage, ProtocolError> {
		self.send(&ClientMessage::CanOrder {
			product_id,
			order_id,
			side,
		})?;
		self.read_message()
	}

	/// Send a heartbeat and wait for the echo.
	pub fn heartbeat(&mut self) -> Result<ServerMessage, ProtocolError> {
		self.send(&ClientMessage::Heartbeat)?;
		self.read_message()
	}

	fn send(&mut self, msg: &ClientMessage) -> Result<(), ProtocolError> {
		let frame = protocol::encode(msg)?;
		self.stream.write_all(&frame)?;
		Ok(())
	}

	/// Read the next server message, blocking.
	pub fn read_message(&mut self) -> Result<ServerMessage, ProtocolError> {
		let mut header = [0u8; FRAME_HEADER_LEN];
		self.stream
			.read_exact(&mut header)
			.map_err(|e| match e.kind() {
				std::io::ErrorKind::UnexpectedEof => ProtocolError::ConnectionClosed,
				_ => ProtocolError::Io(e),
			})?;
		let len = protocol::body_len(header)?;
		let mut body = vec![0u8; len];
		self.stream.read_exact(&mut body)?;
		protocol::decode(&body)
	}
}
