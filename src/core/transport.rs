// src/core/transport.rs
use crate::config::Protocol;
use crate::feed::event::{EventError, FeedEvent};
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Error(String),
}

static CONNECTION_STATUS: Lazy<Mutex<ConnectionStatus>> =
    Lazy::new(|| Mutex::new(ConnectionStatus::Connecting));

pub fn get_status() -> ConnectionStatus {
    CONNECTION_STATUS.lock().unwrap_or_else(|p| p.into_inner()).clone()
}

fn set_status(new_status: ConnectionStatus) {
    *CONNECTION_STATUS.lock().unwrap_or_else(|p| p.into_inner()) = new_status;
}

/* --------------------------- Engine.IO framing --------------------------- */

/// One Engine.IO v4 text packet, with the Socket.IO layer folded in.
#[derive(Debug, PartialEq, Eq)]
pub enum EnginePacket<'a> {
    Open,
    Close,
    Ping,
    Pong,
    Connected,
    Disconnected,
    /// JSON argument array of a `42` event packet.
    Event(&'a str),
    Other,
}

pub fn parse_packet(text: &str) -> EnginePacket<'_> {
    let mut chars = text.chars();
    match chars.next() {
        Some('0') => EnginePacket::Open,
        Some('1') => EnginePacket::Close,
        Some('2') => EnginePacket::Ping,
        Some('3') => EnginePacket::Pong,
        Some('4') => match chars.next() {
            Some('0') => EnginePacket::Connected,
            Some('1') => EnginePacket::Disconnected,
            Some('2') => {
                let mut rest = &text[2..];
                // "/namespace," prefix
                if rest.starts_with('/') {
                    rest = match rest.find(',') {
                        Some(i) => &rest[i + 1..],
                        None => return EnginePacket::Other,
                    };
                }
                // ack id
                let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
                if rest.starts_with('[') { EnginePacket::Event(rest) } else { EnginePacket::Other }
            }
            _ => EnginePacket::Other,
        },
        _ => EnginePacket::Other,
    }
}

/// What to do with one inbound text frame.
#[derive(Debug)]
pub enum FrameAction {
    Reply(&'static str),
    Deliver(Result<FeedEvent, EventError>),
    Reconnect,
    Ignore,
}

pub fn handle_frame(protocol: Protocol, text: &str) -> FrameAction {
    match protocol {
        Protocol::Json => FrameAction::Deliver(FeedEvent::from_json_frame(text)),
        Protocol::SocketIo => match parse_packet(text) {
            EnginePacket::Open => FrameAction::Reply("40"),
            EnginePacket::Ping => FrameAction::Reply("3"),
            EnginePacket::Event(args) => FrameAction::Deliver(FeedEvent::from_socketio_args(args)),
            EnginePacket::Close | EnginePacket::Disconnected => FrameAction::Reconnect,
            EnginePacket::Connected => {
                info!("Socket.IO namespace connected.");
                FrameAction::Ignore
            }
            EnginePacket::Pong | EnginePacket::Other => FrameAction::Ignore,
        },
    }
}

/* ------------------------------ worker thread ------------------------------ */

pub struct TransportSettings {
    pub url: String,
    pub protocol: Protocol,
    pub reconnect_delay: Duration,
}

/// Spawns the detached websocket reader. Exits once `tx` has no receiver.
pub fn spawn(settings: TransportSettings, tx: Sender<FeedEvent>) -> std::io::Result<JoinHandle<()>> {
    info!("Starting {} transport to {}", settings.protocol, settings.url);
    thread::Builder::new()
        .name("transport".into())
        .spawn(move || run(settings, tx))
}

enum SessionEnd {
    Lost,
    ReceiverGone,
}

fn run(settings: TransportSettings, tx: Sender<FeedEvent>) {
    loop {
        set_status(ConnectionStatus::Connecting);
        match tungstenite::connect(settings.url.as_str()) {
            Ok((mut socket, _response)) => {
                info!("Connected to {}", settings.url);
                set_status(ConnectionStatus::Connected);
                if let SessionEnd::ReceiverGone = read_loop(&mut socket, settings.protocol, &tx) {
                    info!("Event receiver dropped; stopping transport.");
                    let _ = socket.close(None);
                    return;
                }
                warn!("Transport disconnected; retrying in {:?}.", settings.reconnect_delay);
                set_status(ConnectionStatus::Error("disconnected".into()));
            }
            Err(e) => {
                warn!("Failed connecting to {}: {}", settings.url, e);
                set_status(ConnectionStatus::Error(e.to_string()));
            }
        }
        thread::sleep(settings.reconnect_delay);
    }
}

fn read_loop<S: std::io::Read + std::io::Write>(
    socket: &mut tungstenite::WebSocket<S>,
    protocol: Protocol,
    tx: &Sender<FeedEvent>,
) -> SessionEnd {
    loop {
        let text = match socket.read() {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => return SessionEnd::Lost,
            Ok(_) => continue,
            Err(e) => {
                warn!("Transport read error: {}", e);
                return SessionEnd::Lost;
            }
        };

        match handle_frame(protocol, &text) {
            FrameAction::Reply(reply) => {
                if let Err(e) = socket.send(Message::Text(reply.to_string())) {
                    warn!("Failed to send '{}': {}", reply, e);
                    return SessionEnd::Lost;
                }
            }
            FrameAction::Deliver(Ok(event)) => {
                debug!("Received '{}'.", event.name());
                if tx.send(event).is_err() {
                    return SessionEnd::ReceiverGone;
                }
            }
            FrameAction::Deliver(Err(e)) => warn!("Dropping event: {}", e),
            FrameAction::Reconnect => return SessionEnd::Lost,
            FrameAction::Ignore => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_engine_io_control_packets() {
        assert_eq!(parse_packet("0{\"sid\":\"abc\"}"), EnginePacket::Open);
        assert_eq!(parse_packet("2"), EnginePacket::Ping);
        assert_eq!(parse_packet("40{\"sid\":\"x\"}"), EnginePacket::Connected);
        assert_eq!(parse_packet("41"), EnginePacket::Disconnected);
        assert_eq!(parse_packet(""), EnginePacket::Other);
    }

    #[test]
    fn strips_namespace_and_ack_id() {
        assert_eq!(parse_packet("42[\"a\"]"), EnginePacket::Event("[\"a\"]"));
        assert_eq!(parse_packet("42/feed,[\"a\"]"), EnginePacket::Event("[\"a\"]"));
        assert_eq!(parse_packet("4217[\"a\"]"), EnginePacket::Event("[\"a\"]"));
        assert_eq!(parse_packet("42/feed"), EnginePacket::Other);
    }

    #[test]
    fn socketio_frames_map_to_actions() {
        assert!(matches!(handle_frame(Protocol::SocketIo, "0{}"), FrameAction::Reply("40")));
        assert!(matches!(handle_frame(Protocol::SocketIo, "2"), FrameAction::Reply("3")));
        assert!(matches!(handle_frame(Protocol::SocketIo, "1"), FrameAction::Reconnect));
        match handle_frame(Protocol::SocketIo, r#"42["clear_canvas",{"bundle_id":"b1"}]"#) {
            FrameAction::Deliver(Ok(FeedEvent::BeginBundle { bundle_id })) => assert_eq!(bundle_id, "b1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn json_frames_decode_directly() {
        match handle_frame(Protocol::Json, r#"{"event":"stop-investigation"}"#) {
            FrameAction::Deliver(Ok(FeedEvent::StopInvestigation)) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            handle_frame(Protocol::Json, r#"{"event":"nope"}"#),
            FrameAction::Deliver(Err(EventError::UnknownEvent(_)))
        ));
    }
}
