//! `GET /ws/:session_id`: attaches a socket to the job behind a session.
//!
//! Outbound events go through a bounded channel drained by a writer task;
//! the session manager owns the sending half, so dropping the session's
//! transport is what ends the writer. Inbound frames are polled with a short
//! timeout so a session that died on the delivery side, or moved to a newer
//! socket, is noticed quickly. Every socket gets its own [`ConnectionId`] and
//! only ever releases that transport.

use crate::{metrics::WS_CONNECTIONS, AppState};
use axum::{
	extract::{
		ws::{Message, WebSocket, WebSocketUpgrade},
		FromRef, Path, State,
	},
	response::IntoResponse,
	routing::get,
	Router,
};
use futures::{
	sink::SinkExt,
	stream::{SplitSink, SplitStream, StreamExt},
};
use job_lifecycle::{AttachOutcome, JobEvent, JobSessions, LifecycleEngine};
use serde::Deserialize;
use std::ops::ControlFlow;
use tokio::{
	sync::mpsc,
	task::JoinHandle,
	time::{timeout, Duration},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use ws_session::{ConnectionId, SessionId};

const OUTBOUND_BUFFER: usize = 64;
const COMMAND_POLL: Duration = Duration::from_secs(1);
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands a client may send over the socket.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
	Cancel,
	Ping,
}

pub fn ws_routes<S>() -> Router<S>
where
	S: Clone + Send + Sync + 'static,
	AppState: FromRef<S>,
{
	Router::new().route("/ws/:session_id", get(websocket_handler))
}

async fn websocket_handler(ws: WebSocketUpgrade, Path(session_id): Path<SessionId>, State(state): State<AppState>) -> impl IntoResponse {
	info!(%session_id, "Incoming WS request");
	ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

/// Orchestrates one socket from attach to teardown
async fn handle_socket(socket: WebSocket, state: AppState, session_id: SessionId) {
	let (sender, receiver) = socket.split();
	let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
	let connection = ConnectionId::new();

	let engine = state.engine;
	let cancel_token = state.core.cancel_token.child_token();
	let writer = spawn_event_forwarder(sender, rx, engine.sessions().clone(), session_id, connection, cancel_token.clone());

	let attached = engine.attach(session_id, connection, tx.clone()).await;
	if let Err(e) = &attached {
		// a refused attach never reaches the session, so answer on the socket directly
		let _ = tx.send(JobEvent::Failed { job_id: None, message: e.to_string() }).await;
	}
	drop(tx);

	match attached {
		Ok(AttachOutcome::Replayed) => {
			WS_CONNECTIONS.with_label_values(&["replayed"]).inc();
			engine.sessions().release(session_id, connection, "job already finished");
		}
		Ok(outcome) => {
			WS_CONNECTIONS.with_label_values(&[if outcome == AttachOutcome::Started { "started" } else { "reconnected" }]).inc();
			let frames = process_incoming_messages(receiver, &engine, session_id, connection, cancel_token).await;
			debug!(%session_id, %connection, frames, "Command loop finished");
			engine.sessions().release(session_id, connection, "client disconnected");
		}
		Err(e) => {
			WS_CONNECTIONS.with_label_values(&["rejected"]).inc();
			warn!(%session_id, error = %e, "Attach failed");
			engine.sessions().release(session_id, connection, "attach failed");
		}
	}

	match timeout(WRITER_DRAIN_TIMEOUT, writer).await {
		Ok(Ok(())) => debug!(%session_id, "Writer drained"),
		Ok(Err(e)) => error!(%session_id, error = %e, "Writer task panicked"),
		Err(_) => warn!(%session_id, "Writer did not drain in time"),
	}
}

/// Forward job events to the socket until the session drops its transport
fn spawn_event_forwarder(
	mut sender: SplitSink<WebSocket, Message>,
	mut rx: mpsc::Receiver<JobEvent>,
	sessions: JobSessions,
	session_id: SessionId,
	connection: ConnectionId,
	cancel_token: CancellationToken,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		loop {
			tokio::select! {
				() = cancel_token.cancelled() => break,
				event = rx.recv() => {
					let Some(event) = event else { break };
					let payload = match serde_json::to_string(&event) {
						Ok(payload) => payload,
						Err(e) => {
							error!(%session_id, error = %e, "Failed to encode event");
							continue;
						}
					};
					if let Err(e) = sender.send(Message::Text(payload)).await {
						debug!(%session_id, error = %e, "Socket write failed");
						sessions.release(session_id, connection, "socket write failed");
						break;
					}
				}
			}
		}

		let _ = sender.send(Message::Close(None)).await;
	})
}

/// Read client frames until the socket closes, this socket stops being the
/// session's transport or the server shuts down. Returns the number of frames seen.
async fn process_incoming_messages(
	mut receiver: SplitStream<WebSocket>,
	engine: &LifecycleEngine,
	session_id: SessionId,
	connection: ConnectionId,
	cancel_token: CancellationToken,
) -> u64 {
	let mut frames = 0u64;

	loop {
		tokio::select! {
			() = cancel_token.cancelled() => {
				info!(%session_id, "Server shutting down, closing socket");
				break;
			}
			polled = timeout(COMMAND_POLL, receiver.next()) => {
				let message = match polled {
					Err(_elapsed) => {
						if engine.sessions().is_attached(session_id, connection) {
							continue;
						}
						debug!(%session_id, %connection, "Socket no longer attached to its session");
						break;
					}
					Ok(None | Some(Ok(Message::Close(_)))) => break,
					Ok(Some(Err(e))) => {
						debug!(%session_id, error = %e, "WebSocket error");
						break;
					}
					Ok(Some(Ok(message))) => message,
				};

				frames += 1;
				engine.sessions().record_activity(session_id);
				if let Message::Text(text) = message {
					if handle_command(engine, session_id, &text).await.is_break() {
						break;
					}
				}
			}
		}
	}

	frames
}

async fn handle_command(engine: &LifecycleEngine, session_id: SessionId, text: &str) -> ControlFlow<()> {
	match serde_json::from_str::<ClientCommand>(text) {
		Ok(ClientCommand::Cancel) => match engine.cancel(session_id).await {
			Ok(job_id) => {
				info!(%session_id, %job_id, "Job cancelled by client");
				ControlFlow::Break(())
			}
			Err(e) => {
				engine.sessions().notify(session_id, JobEvent::status(format!("Cancel ignored: {e}"))).await;
				ControlFlow::Continue(())
			}
		},
		Ok(ClientCommand::Ping) => {
			engine.sessions().notify(session_id, JobEvent::status("pong")).await;
			ControlFlow::Continue(())
		}
		Err(e) => {
			warn!(%session_id, error = %e, "Ignoring unknown client message");
			ControlFlow::Continue(())
		}
	}
}
