//! Chat over WebSocket
//!
//! - GET /ws - Upgrade to a chat session
//!
//! Every text frame is one JSON event `{"event": "...", "data": ...}`. The
//! connection task multiplexes four sources with `tokio::select!`: server
//! shutdown, supersession by a newer join of the same user, the session's
//! outbound event queue and inbound frames. A superseded socket is closed with
//! code 4000. Closing the socket is the `disconnect` event.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use parley_chat::{ClientEvent, ServerEvent, Session};
use tracing::{debug, error, info, warn};

use crate::server::AppState;

/// Close code sent to a session replaced by a newer join.
pub const CLOSE_SUPERSEDED: u16 = 4000;

/// Create the WebSocket router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ws", get(websocket_handler))
}

/// GET /ws
async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    debug!("Chat WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Run one chat connection until either side closes it.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut session, mut events) = state.hub.open_session();
    info!(session = %session.id(), "Chat WebSocket connection established");

    let superseded = session.session_handle().superseded_token();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                debug!(session = %session.id(), "Server shutting down, closing socket");
                let _ = sender.send(Message::Close(None)).await;
                break;
            }

            _ = superseded.cancelled() => {
                debug!(session = %session.id(), "Session superseded, flushing queue");
                while let Ok(event) = events.try_recv() {
                    let Some(text) = encode_event(&event) else { continue };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = sender.send(superseded_close()).await;
                break;
            }

            event = events.recv() => {
                let Some(event) = event else { break };
                let is_superseded = matches!(event, ServerEvent::SessionSuperseded { .. });

                if let Some(text) = encode_event(&event) {
                    if let Err(e) = sender.send(Message::Text(text)).await {
                        debug!(error = %e, "Failed to send WebSocket message");
                        break;
                    }
                }

                if is_superseded {
                    let _ = sender.send(superseded_close()).await;
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => handle_frame(&mut session, &text).await,
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Received binary WebSocket message (not supported)");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket close requested");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong are answered by axum
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }
        }
    }

    let id = session.id();
    session.close().await;
    info!(session = %id, "Chat WebSocket connection closed");
}

fn superseded_close() -> Message {
    Message::Close(Some(CloseFrame {
        code: CLOSE_SUPERSEDED,
        reason: Cow::Borrowed("session superseded"),
    }))
}

/// Parse one inbound frame and dispatch it to the session.
///
/// Malformed frames are logged and ignored.
async fn handle_frame(session: &mut Session, text: &str) {
    match parse_frame(text) {
        Some(event) => session.handle(event).await,
        None => warn!(session = %session.id(), len = text.len(), "Ignoring malformed frame"),
    }
}

fn parse_frame(text: &str) -> Option<ClientEvent> {
    match serde_json::from_str(text) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, "Failed to parse client event");
            None
        }
    }
}

fn encode_event(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(event = event.name(), error = %e, "Failed to serialize server event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::tests::create_test_state;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    #[test]
    fn test_parse_frame() {
        let event = parse_frame(r#"{"event": "join", "data": "alice"}"#);
        assert_eq!(event, Some(ClientEvent::Join("alice".to_string())));

        assert!(parse_frame("not json").is_none());
        assert!(parse_frame(r#"{"event": "dance"}"#).is_none());
    }

    #[test]
    fn test_encode_event() {
        let text = encode_event(&ServerEvent::UserOffline("bob".to_string())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"event": "userOffline", "data": "bob"}));
    }

    #[test]
    fn test_superseded_close_frame() {
        match superseded_close() {
            Message::Close(Some(frame)) => assert_eq!(frame.code, CLOSE_SUPERSEDED),
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_second_join_cancels_first_socket() {
        let state = create_test_state();
        let (mut first, _first_rx) = state.hub.open_session();
        let (mut second, _second_rx) = state.hub.open_session();
        let superseded = first.session_handle().superseded_token();

        handle_frame(&mut first, r#"{"event": "join", "data": "alice"}"#).await;
        assert!(!superseded.is_cancelled());

        handle_frame(&mut second, r#"{"event": "join", "data": "alice"}"#).await;
        assert!(superseded.is_cancelled());
        assert!(!second.session_handle().is_superseded());
    }

    #[tokio::test]
    async fn test_frames_drive_session() {
        let state = create_test_state();
        let (mut alice, mut alice_rx) = state.hub.open_session();
        let (mut bob, mut bob_rx) = state.hub.open_session();

        handle_frame(&mut alice, r#"{"event": "join", "data": "alice"}"#).await;
        handle_frame(&mut bob, r#"{"event": "join", "data": "bob"}"#).await;
        handle_frame(&mut alice, "{garbage").await;
        handle_frame(
            &mut alice,
            r#"{"event": "sendMessage", "data": {"sender": "alice", "recipient": "bob", "content": "hi"}}"#,
        )
        .await;

        assert_eq!(alice_rx.recv().await.map(|e| e.name()), Some("onlineUsers"));
        assert_eq!(alice_rx.recv().await.map(|e| e.name()), Some("userOnline"));
        assert_eq!(alice_rx.recv().await.map(|e| e.name()), Some("messageDelivered"));

        assert_eq!(bob_rx.recv().await.map(|e| e.name()), Some("onlineUsers"));
        match bob_rx.recv().await {
            Some(ServerEvent::NewMessage(message)) => assert_eq!(message.content, "hi"),
            other => panic!("expected newMessage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plain_get_is_rejected() {
        let state = create_test_state();
        let response = router()
            .with_state(state)
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
