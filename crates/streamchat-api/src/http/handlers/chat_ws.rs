//! WebSocket chat transport.
//!
//! `/ws/chat` upgrades to a WebSocket that owns exactly one [`ChatSession`].
//! The session lives as long as the connection: closing the tab drops the
//! socket, which drops any in-flight [`TurnStream`] and with it the
//! completion request.
//!
//! While a reply streams, the handler multiplexes fragment delivery with
//! client frames. `submit` and `set_model` are refused as busy, `ping` is
//! answered, and `reset` abandons the reply before clearing the log.
//!
//! [`TurnStream`]: streamchat_core::chat::TurnStream

use std::pin::Pin;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use streamchat_core::chat::{ChatSession, TurnSummary};
use streamchat_types::chat::{Fragment, ModelSelection, TurnOutcome};
use streamchat_types::error::TurnError;
use streamchat_types::llm::Usage;

use crate::state::AppState;

/// Frames sent by the browser.
///
/// Malformed frames are logged and ignored.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Submit { text: String },
    SetModel { model: String },
    Reset,
    Ping,
}

/// Frames sent to the browser.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Session {
        session_id: Uuid,
        model: String,
        models: Vec<String>,
    },
    TurnStarted {
        user_index: usize,
        assistant_index: usize,
        model: String,
    },
    /// One fragment plus everything received so far, so the client can
    /// re-render the whole reply.
    Fragment {
        index: usize,
        text: String,
        content: String,
    },
    TurnFinished {
        index: usize,
        outcome: TurnOutcome,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
        elapsed_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<&'static str>,
    },
    ModelChanged {
        model: String,
    },
    Reset,
    Rejected {
        reason: &'static str,
        message: String,
    },
    Pong,
}

impl ServerFrame {
    fn rejected(err: &TurnError) -> Self {
        ServerFrame::Rejected {
            reason: err.reason(),
            message: err.user_message(),
        }
    }

    fn turn_finished(summary: &TurnSummary) -> Self {
        ServerFrame::TurnFinished {
            index: summary.index,
            outcome: summary.outcome,
            content: summary.content.clone(),
            usage: summary.usage,
            elapsed_ms: summary.elapsed.as_millis() as u64,
            error: summary.error.as_ref().map(TurnError::reason),
        }
    }
}

/// The peer closed the socket or a send failed.
struct Disconnected;

type MessageSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;
type MessageStream = Pin<Box<dyn Stream<Item = Result<Message, axum::Error>> + Send>>;

/// The two halves of a chat connection, as JSON text frames.
struct ChatSocket {
    sender: MessageSink,
    receiver: MessageStream,
}

impl ChatSocket {
    fn new(
        sender: impl Sink<Message, Error = axum::Error> + Send + 'static,
        receiver: impl Stream<Item = Result<Message, axum::Error>> + Send + 'static,
    ) -> Self {
        Self {
            sender: Box::pin(sender),
            receiver: Box::pin(receiver),
        }
    }

    async fn send(&mut self, frame: &ServerFrame) -> Result<(), Disconnected> {
        let json = match serde_json::to_string(frame) {
            Ok(json) => json,
            Err(err) => {
                warn!("Failed to serialize frame: {err}");
                return Ok(());
            }
        };
        self.sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|err| {
                debug!("WebSocket send error: {err}");
                Disconnected
            })
    }

    /// Next well-formed client frame, or `None` once the socket is closed.
    async fn recv(&mut self) -> Option<ClientFrame> {
        while let Some(message) = self.receiver.next().await {
            match message {
                Ok(Message::Text(text)) => match parse_client_frame(text.as_str()) {
                    Ok(frame) => return Some(frame),
                    Err(err) => warn!("Ignoring malformed client frame: {err}"),
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(err) => {
                    debug!("WebSocket receive error: {err}");
                    return None;
                }
            }
        }
        None
    }
}

fn parse_client_frame(text: &str) -> Result<ClientFrame, serde_json::Error> {
    serde_json::from_str(text)
}

/// Upgrade to a chat WebSocket. Mounted at `/ws/chat`.
pub async fn chat_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_chat_socket(socket, state))
}

async fn handle_chat_socket(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    let mut socket = ChatSocket::new(sender, receiver);
    let mut session = ChatSession::new(ModelSelection::new(state.default_model()));
    let span = info_span!("chat_session", session_id = %session.id());

    async move {
        info!(model = %session.model(), "Chat session opened");
        let _ = serve_session(&mut socket, &mut session, &state).await;
        info!(turns = session.log().len(), "Chat session closed");
    }
    .instrument(span)
    .await;
}

async fn serve_session(
    socket: &mut ChatSocket,
    session: &mut ChatSession,
    state: &AppState,
) -> Result<(), Disconnected> {
    socket
        .send(&ServerFrame::Session {
            session_id: session.id(),
            model: session.model().to_string(),
            models: state.models().to_vec(),
        })
        .await?;

    while let Some(frame) = socket.recv().await {
        match frame {
            ClientFrame::Submit { text } => run_turn(socket, session, state, &text).await?,
            ClientFrame::SetModel { model } => {
                let reply = match session.set_model(&model, state.models()) {
                    Ok(()) => ServerFrame::ModelChanged {
                        model: session.model().to_string(),
                    },
                    Err(err) => ServerFrame::rejected(&err),
                };
                socket.send(&reply).await?;
            }
            ClientFrame::Reset => {
                let reply = match session.reset() {
                    Ok(()) => ServerFrame::Reset,
                    Err(err) => ServerFrame::rejected(&err),
                };
                socket.send(&reply).await?;
            }
            ClientFrame::Ping => socket.send(&ServerFrame::Pong).await?,
        }
    }
    Ok(())
}

enum TurnEvent {
    Fragment(Option<Fragment>),
    Client(Option<ClientFrame>),
}

/// Submit `text` and stream the reply to the socket until it finishes,
/// the client resets, or the client goes away.
async fn run_turn(
    socket: &mut ChatSocket,
    session: &mut ChatSession,
    state: &AppState,
    text: &str,
) -> Result<(), Disconnected> {
    let mut stream = match state.controller.submit_message(session, text) {
        Ok(stream) => stream,
        Err(err) => {
            debug!(reason = err.reason(), "Submission rejected");
            return socket.send(&ServerFrame::rejected(&err)).await;
        }
    };

    socket
        .send(&ServerFrame::TurnStarted {
            user_index: stream.user_index(),
            assistant_index: stream.index(),
            model: stream.model().to_string(),
        })
        .await?;

    loop {
        let event = tokio::select! {
            fragment = stream.next() => TurnEvent::Fragment(fragment),
            frame = socket.recv() => TurnEvent::Client(frame),
        };

        match event {
            TurnEvent::Fragment(Some(fragment)) => {
                let frame = ServerFrame::Fragment {
                    index: fragment.index,
                    content: stream.content().to_string(),
                    text: fragment.text,
                };
                socket.send(&frame).await?;
            }
            TurnEvent::Fragment(None) => break,
            TurnEvent::Client(Some(ClientFrame::Ping)) => socket.send(&ServerFrame::Pong).await?,
            TurnEvent::Client(Some(ClientFrame::Submit { .. } | ClientFrame::SetModel { .. })) => {
                socket.send(&ServerFrame::rejected(&TurnError::Busy)).await?;
            }
            TurnEvent::Client(Some(ClientFrame::Reset)) => {
                drop(stream);
                let reply = match session.reset() {
                    Ok(()) => ServerFrame::Reset,
                    Err(err) => ServerFrame::rejected(&err),
                };
                return socket.send(&reply).await;
            }
            TurnEvent::Client(None) => {
                debug!("Client went away mid-turn");
                return Err(Disconnected);
            }
        }
    }

    let summary = stream.finish().await;
    socket.send(&ServerFrame::turn_finished(&summary)).await
}
