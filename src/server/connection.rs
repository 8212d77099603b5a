//! One client connection
//!
//! [`RpcConnection`] is the protocol state machine and does no I/O: it takes
//! decoded frames and returns the frames to send back. [`serve_connection`]
//! drives it over a stream.

use log::{debug, info, warn};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::time::{timeout_at, Instant};

use crate::activity::Activity;
use crate::config::{RelayConfig, RelayIdentity};
use crate::error::{ProtocolContext, RelayError, Result};
use crate::ids::{generate_id, session_id};
use crate::ipc::{
    codes, ClosePayload, Command, Frame, FrameReader, FrameWriter, HandshakePayload, IpcRequest,
    IpcResponse, Opcode,
};
use crate::relay::EventRelay;

/// Activity type used when a client does not pick one
const DEFAULT_ACTIVITY_TYPE: u8 = 0;

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingHandshake,
    Ready { client_id: String },
    Closed,
}

/// Protocol state of one connected client
#[derive(Debug)]
pub struct RpcConnection {
    id: String,
    state: ConnectionState,
    presence: Option<Activity>,
    presence_pid: Option<u32>,
    ipc_version: u32,
    identity: RelayIdentity,
    relay: EventRelay,
}

impl RpcConnection {
    pub fn new(config: &RelayConfig, relay: EventRelay) -> Self {
        Self {
            id: generate_id("ipc"),
            state: ConnectionState::AwaitingHandshake,
            presence: None,
            presence_pid: None,
            ipc_version: config.ipc_version,
            identity: config.identity.clone(),
            relay,
        }
    }

    /// Connection id, also the `socketId` of relayed presence
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Application id declared in the handshake
    pub fn client_id(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Ready { client_id } => Some(client_id),
            _ => None,
        }
    }

    /// Last presence this client set
    pub fn presence(&self) -> Option<&Activity> {
        self.presence.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Apply one frame and return the replies.
    ///
    /// An `Err` is a protocol violation; the caller must drop the connection.
    /// A refused handshake is not an error: the reply is a close frame and
    /// the state becomes [`ConnectionState::Closed`].
    pub fn handle_frame(&mut self, frame: Frame) -> Result<Vec<Frame>> {
        match (&self.state, frame.opcode) {
            (ConnectionState::Closed, opcode) => Err(RelayError::protocol_violation(
                "frame received after close",
                ProtocolContext {
                    received_opcode: Some(opcode.into()),
                    ..ProtocolContext::default()
                },
            )),
            (ConnectionState::AwaitingHandshake, Opcode::Handshake) => {
                self.on_handshake(frame.payload)
            }
            (ConnectionState::AwaitingHandshake, opcode) => Err(RelayError::protocol_violation(
                format!("{:?} before handshake", opcode),
                ProtocolContext::with_opcodes(Opcode::Handshake.into(), opcode.into()),
            )),
            (ConnectionState::Ready { .. }, Opcode::Handshake) => {
                Err(RelayError::protocol_violation(
                    "repeated handshake",
                    ProtocolContext::with_opcodes(Opcode::Frame.into(), Opcode::Handshake.into()),
                ))
            }
            (ConnectionState::Ready { .. }, Opcode::Frame) => self.on_command(frame.payload),
            (ConnectionState::Ready { .. }, Opcode::Ping) => {
                Ok(vec![Frame::new(Opcode::Pong, frame.payload)])
            }
            (ConnectionState::Ready { .. }, Opcode::Pong) => Ok(Vec::new()),
            (ConnectionState::Ready { .. }, Opcode::Close) => {
                debug!("[{}] client sent close", self.id);
                self.close();
                Ok(Vec::new())
            }
        }
    }

    /// Move to `Closed`, clearing any presence this client had set
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        if self.presence.take().is_some() {
            self.relay
                .presence_updated(&self.id, self.presence_pid.take(), None);
        }
        self.state = ConnectionState::Closed;
    }

    fn refuse(&mut self, code: u32, message: &str) -> Result<Vec<Frame>> {
        warn!("[{}] handshake refused: {}", self.id, message);
        self.state = ConnectionState::Closed;
        let payload = ClosePayload {
            code,
            message: message.to_string(),
        };
        Ok(vec![Frame::from_payload(Opcode::Close, &payload)?])
    }

    fn on_handshake(&mut self, payload: Value) -> Result<Vec<Frame>> {
        let handshake: HandshakePayload = serde_json::from_value(payload).map_err(|e| {
            RelayError::protocol_violation(
                format!("malformed handshake: {}", e),
                ProtocolContext::default(),
            )
        })?;

        if handshake.v != self.ipc_version {
            return self.refuse(codes::INVALID_VERSION, "Invalid Version");
        }
        if handshake.client_id.trim().is_empty() {
            return self.refuse(codes::INVALID_CLIENT_ID, "Invalid Client ID");
        }

        info!("[{}] handshake from client {}", self.id, handshake.client_id);
        self.state = ConnectionState::Ready {
            client_id: handshake.client_id,
        };

        let ready = IpcResponse {
            cmd: "DISPATCH".to_string(),
            data: json!({
                "v": self.ipc_version,
                "config": {
                    "cdn_host": "cdn.discordapp.com",
                    "api_endpoint": "//discord.com/api",
                    "environment": "production"
                },
                "user": {
                    "id": self.identity.id,
                    "username": self.identity.username,
                    "discriminator": self.identity.discriminator,
                    "global_name": self.identity.global_name,
                    "avatar": self.identity.avatar,
                    "bot": false,
                    "flags": 0,
                    "premium_type": 0
                },
                "session_id": session_id()
            }),
            evt: Some("READY".to_string()),
            nonce: Value::Null,
        };
        Ok(vec![Frame::from_payload(Opcode::Frame, &ready)?])
    }

    fn on_command(&mut self, payload: Value) -> Result<Vec<Frame>> {
        let request: IpcRequest = serde_json::from_value(payload).map_err(|e| {
            RelayError::protocol_violation(
                format!("malformed command frame: {}", e),
                ProtocolContext::default(),
            )
        })?;
        debug!("[{}] {} {}", self.id, request.cmd, request.args);

        let response = match Command::from_wire(&request.cmd) {
            Some(Command::SetActivity) => self.set_activity(&request),
            Some(Command::Subscribe) | Some(Command::Unsubscribe) => {
                IpcResponse::reply(&request, json!({ "evt": request.args.get("evt") }))
            }
            Some(Command::InviteBrowser) => match request.args.get("code").and_then(Value::as_str) {
                Some(code) => {
                    self.relay.invite(code);
                    IpcResponse::reply(&request, json!({ "code": code }))
                }
                None => IpcResponse::error(&request, codes::INVALID_PAYLOAD, "missing invite code"),
            },
            _ => {
                debug!("[{}] acknowledging unsupported command {}", self.id, request.cmd);
                IpcResponse::reply(&request, Value::Null)
            }
        };

        Ok(vec![Frame::from_payload(Opcode::Frame, &response)?])
    }

    fn set_activity(&mut self, request: &IpcRequest) -> IpcResponse {
        let pid = request
            .args
            .get("pid")
            .and_then(Value::as_u64)
            .and_then(|p| u32::try_from(p).ok());

        let raw = request.args.get("activity").cloned().unwrap_or(Value::Null);
        let activity = if raw.is_null() {
            None
        } else {
            match serde_json::from_value::<Activity>(raw) {
                Ok(activity) => Some(activity),
                Err(err) => {
                    return IpcResponse::error(request, codes::INVALID_PAYLOAD, err.to_string())
                }
            }
        };

        let activity = match activity {
            Some(mut activity) => {
                if let Err(reason) = activity.validate() {
                    let err = RelayError::InvalidActivity(reason);
                    warn!("[{}] {}", self.id, err);
                    return IpcResponse::error(request, codes::INVALID_PAYLOAD, err.to_string());
                }
                activity.application_id = self.client_id().map(str::to_string);
                activity.kind.get_or_insert(DEFAULT_ACTIVITY_TYPE);
                Some(activity)
            }
            None => None,
        };

        self.presence = activity.clone();
        self.presence_pid = pid;
        self.relay.presence_updated(&self.id, pid, activity.clone());

        let data = match &activity {
            Some(activity) => serde_json::to_value(activity).unwrap_or(Value::Null),
            None => Value::Null,
        };
        IpcResponse::reply(request, data)
    }
}

async fn drive<S>(
    stream: &mut S,
    conn: &mut RpcConnection,
    config: &RelayConfig,
) -> Result
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let mut reader = FrameReader::new(config.max_payload_size);
    let mut writer = FrameWriter::new();
    let deadline = Instant::now() + config.handshake_timeout();

    loop {
        let next = if *conn.state() == ConnectionState::AwaitingHandshake {
            timeout_at(deadline, reader.read_frame(stream))
                .await
                .map_err(|_| RelayError::HandshakeTimeout(config.handshake_timeout_ms))??
        } else {
            reader.read_frame(stream).await?
        };

        let Some(frame) = next else {
            return Ok(());
        };

        for reply in conn.handle_frame(frame)? {
            writer.write_frame(stream, &reply).await?;
        }

        if conn.is_closed() {
            return Ok(());
        }
    }
}

/// Serve one client until it disconnects, violates the protocol, or
/// `shutdown` fires. Any presence it set is cleared on the way out.
pub async fn serve_connection<S>(
    stream: &mut S,
    mut conn: RpcConnection,
    config: &RelayConfig,
    mut shutdown: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let result = tokio::select! {
        result = drive(stream, &mut conn, config) => result,
        _ = shutdown.changed() => Ok(()),
    };

    match result {
        Ok(()) => info!("[{}] disconnected", conn.id()),
        Err(err) => warn!("[{}] dropped: {}", conn.id(), err),
    }
    conn.close();
}
