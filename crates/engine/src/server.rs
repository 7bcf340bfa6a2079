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

//! TCP ingress server for the gateway boundary
//!
//! One listener, one engine. Each connection gets its own session task:
//! a `Logon` handshake first (the client id scopes order ids, nothing
//! more), then a stream of framed order messages. Order messages are
//! answered with admission acks: `Ack` once the command is queued for the
//! matching loop, `Reject` when parsing fails or the queue signals
//! overload. Matching results travel on the engine's event stream.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crucible_sdk::protocol::{
	self, ClientMessage, FRAME_HEADER_LEN, ProtocolError, ServerMessage,
};
use crucible_sdk::types::ClientId;

use crate::queue::QueueSender;
use crate::types::{EngineCommand, OrderKey, OrderReplace, OrderRequest};

/// Accept loop. Runs until the listener fails.
pub async fn serve(listener: TcpListener, sender: QueueSender) {
	loop {
		match listener.accept().await {
			Ok((stream, peer)) => {
				let sender = sender.clone();
				tokio::spawn(async move {
					info!(%peer, "session connected");
					match handle_session(stream, sender).await {
						Ok(()) | Err(ProtocolError::ConnectionClosed) => {
							info!(%peer, "session closed");
						}
						Err(e) => warn!(%peer, %e, "session terminated"),
					}
				});
			}
			Err(e) => {
				warn!(%e, "accept failed");
			}
		}
	}
}

async fn handle_session(
	mut stream: TcpStream,
	sender: QueueSender,
) -> Result<(), ProtocolError> {
	// The handshake must come first; anything else closes the session.
	let client_id = match read_message(&mut stream).await? {
		ClientMessage::Logon { client_id } => client_id,
		other => {
			debug!(?other, "message before logon");
			send(&mut stream, &ServerMessage::LogonReply { accepted: false }).await?;
			return Ok(());
		}
	};
	send(&mut stream, &ServerMessage::LogonReply { accepted: true }).await?;
	debug!(client_id, "logon accepted");

	loop {
		let message = match read_message(&mut stream).await {
			Ok(message) => message,
			Err(ProtocolError::ConnectionClosed) => return Ok(()),
			Err(e) => return Err(e),
		};
		let reply = dispatch(message, client_id, &sender);
		if let Some(reply) = reply {
			send(&mut stream, &reply).await?;
		}
	}
}

/// Map one client message to its admission reply, enqueuing order
/// commands for the matching loop.
fn dispatch(
	message: ClientMessage,
	client_id: ClientId,
	sender: &QueueSender,
) -> Option<ServerMessage> {
	match message {
		ClientMessage::Logon { .. } => {
			// Repeated logon on a live session is idempotent.
			Some(ServerMessage::LogonReply { accepted: true })
		}
		ClientMessage::Heartbeat => Some(ServerMessage::Heartbeat),
		ClientMessage::NewOrder {
			product_id,
			order_id,
			side,
			order_type,
			price,
			quantity,
		} => {
			let command = EngineCommand::Insert {
				product_id,
				request: OrderRequest {
					order_id,
					client_id,
					side,
					order_type,
					price,
					quantity,
				},
			};
			Some(admit(command, order_id, sender))
		}
		ClientMessage::ModOrder {
			product_id,
			order_id,
			side,
			price,
			quantity,
		} => {
			let command = EngineCommand::Modify {
				product_id,
				replace: OrderReplace {
					order_id,
					client_id,
					side,
					price,
					quantity,
				},
			};
			Some(admit(command, order_id, sender))
		}
		ClientMessage::CanOrder {
			product_id,
			order_id,
			side,
		} => {
			let command = EngineCommand::Cancel {
				product_id,
				key: OrderKey {
					order_id,
					client_id,
					side,
				},
			};
			Some(admit(command, order_id, sender))
		}
	}
}

fn admit(command: EngineCommand, order_id: u32, sender: &QueueSender) -> ServerMessage {
	match sender.try_enqueue(command) {
		Ok(()) => ServerMessage::Ack { order_id },
		Err(e) => {
			warn!(%e, order_id, "order refused at admission");
			ServerMessage::Reject {
				order_id,
				reason: "engine overloaded".to_string(),
			}
		}
	}
}

async fn read_message(stream: &mut TcpStream) -> Result<ClientMessage, ProtocolError> {
	let mut header = [0u8; FRAME_HEADER_LEN];
	stream.read_exact(&mut header).await.map_err(map_eof)?;
	let len = protocol::body_len(header)?;
	let mut body = vec![0u8; len];
	stream.read_exact(&mut body).await.map_err(map_eof)?;
	protocol::decode(&body)
}

async fn send(stream: &mut TcpStream, message: &ServerMessage) -> Result<(), ProtocolError> {
	let frame = protocol::encode(message)?;
	stream.write_all(&frame).await?;
	Ok(())
}

fn map_eof(e: std::io::Error) -> ProtocolError {
	match e.kind() {
		std::io::ErrorKind::UnexpectedEof => ProtocolError::ConnectionClosed,
		_ => ProtocolError::Io(e),
	}
}

/// Bind a listener on `addr`.
pub async fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
	TcpListener::bind(addr).await
}
