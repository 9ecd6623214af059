//! # WebSocket Adapter
//!
//! Upgrades `GET /ws` and hands the split socket to [`serve_connection`].
//! A client may send `X-Request-ID` on the upgrade request; it is kept as
//! the observer's correlation id.

use crate::connection::serve_connection;
use crate::domain::errors::HubError;
use crate::domain::frame::Frame;
use crate::service::HubHandle;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::future;
use futures::{SinkExt, StreamExt};
use tracing::warn;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Router exposing the hub at `/ws`.
pub fn hub_router(hub: HubHandle) -> Router {
    Router::new().route("/ws", get(upgrade)).with_state(hub)
}

async fn upgrade(
    State(hub): State<HubHandle>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let correlation_id = correlation_id(&headers);
    let max = hub.config().max_message_size;
    ws.max_message_size(max)
        .on_upgrade(move |socket| serve_socket(hub, socket, correlation_id))
}

async fn serve_socket(hub: HubHandle, socket: WebSocket, correlation_id: Option<String>) {
    let (sink, stream) = socket.split();
    let sink = sink
        .sink_map_err(transport)
        .with(|frame: Frame| future::ready(Ok::<_, HubError>(to_message(frame))));
    let stream = stream.map(|item| item.map(from_message).map_err(transport));

    if let Err(HubError::Closed) = serve_connection(hub, sink, stream, correlation_id).await {
        warn!("WebSocket accepted after hub shutdown");
    }
}

fn correlation_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn transport(e: axum::Error) -> HubError {
    HubError::Transport(e.to_string())
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text),
        Frame::Binary(data) => Message::Binary(data),
        Frame::Ping(data) => Message::Ping(data),
        Frame::Pong(data) => Message::Pong(data),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text),
        Message::Binary(data) => Frame::Binary(data),
        Message::Ping(data) => Frame::Ping(data),
        Message::Pong(data) => Frame::Pong(data),
        Message::Close(_) => Frame::Close,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_correlation_id_from_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(correlation_id(&headers), None);

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(" req-42 "));
        assert_eq!(correlation_id(&headers).as_deref(), Some("req-42"));

        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(""));
        assert_eq!(correlation_id(&headers), None);
    }

    #[test]
    fn test_frame_mapping() {
        let text = Frame::Text("{\"type\":\"x\"}".into());
        assert_eq!(from_message(to_message(text.clone())), text);
        assert!(matches!(to_message(Frame::Close), Message::Close(None)));
        assert_eq!(from_message(Message::Ping(vec![1])), Frame::Ping(vec![1]));
    }
}
