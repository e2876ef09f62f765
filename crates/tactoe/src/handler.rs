//! Per-connection handler: handshake, request dispatch, and situation streams.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version → send HandshakeAck
//!   2. Hand the sending half to a writer task fed by a channel
//!   3. Loop: receive envelopes → answer unary calls, spawn one stream
//!      task per EnterRoom
//!   4. On close, shutdown, or idling with no open stream: abort the streams, flush the
//!      writer, send a close frame

use std::sync::Arc;

use tactoe_protocol::{Codec, Envelope, PROTOCOL_VERSION, Payload, ProtocolError, Request, Response};
use tactoe_room::{BattleListener, ErrorKind};
use tactoe_store::MemDb;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace};

use crate::server::ServerState;
use crate::transport::{ConnectionId, FrameSink, FrameStream, WebSocketConnection};
use crate::TactoeError;

/// Frames that may queue up for the writer before senders wait.
const OUTBOUND_BUFFER: usize = 64;

type Outbound = mpsc::Sender<Envelope>;

/// Handles a single connection from upgrade to close.
pub(crate) async fn handle_connection<D, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<D, C>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), TactoeError>
where
    D: MemDb,
    C: Codec,
{
    let conn_id = conn.id();
    let peer = conn.peer_addr();
    let (mut sink, mut stream) = conn.split();

    // --- Step 1: Handshake ---
    if let Err(e) = perform_handshake(&mut sink, &mut stream, &state).await {
        let _ = sink.close().await;
        return Err(e);
    }
    info!(%conn_id, %peer, "client connected");

    // --- Step 2: Writer ---
    let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
    let writer = tokio::spawn(write_frames(sink, rx, Arc::clone(&state)));

    // --- Step 3: Request loop ---
    let mut streams = JoinSet::new();
    loop {
        // The idle clock only runs while no stream is open.
        let watching = !streams.is_empty();
        let frame = tokio::select! {
            frame = stream.recv() => frame,
            Some(_) = streams.join_next(), if watching => continue,
            _ = tokio::time::sleep(state.config.idle_timeout), if !watching => {
                info!(%conn_id, "connection idle, closing");
                break;
            }
            _ = shutdown.changed() => {
                info!(%conn_id, "server shutting down, closing connection");
                break;
            }
        };
        let data = match frame {
            Ok(Some(data)) => data,
            Ok(None) => {
                info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(%conn_id, error = %e, "failed to decode envelope");
                let reply = failure(conn_id, 0, "decode", &TactoeError::from(e));
                if tx.send(state.envelope(0, reply)).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let seq = envelope.seq;
        let request = match envelope.payload {
            Payload::Request(request) => request,
            Payload::Response(_) => {
                let e: TactoeError = ProtocolError::InvalidMessage("expected a request".into()).into();
                if tx.send(state.envelope(seq, failure(conn_id, seq, "response", &e))).await.is_err() {
                    break;
                }
                continue;
            }
        };

        let method = request.method();
        trace!(%conn_id, seq, method, "request received");
        let reply = match dispatch(&state, request, seq, &tx, &mut streams).await {
            Ok(Some(response)) => response,
            Ok(None) => continue,
            Err(e) => failure(conn_id, seq, method, &e),
        };
        if tx.send(state.envelope(seq, reply)).await.is_err() {
            break;
        }
    }

    // --- Step 4: Teardown ---
    let open_streams = streams.len();
    streams.shutdown().await;
    drop(tx);
    let _ = writer.await;

    info!(%conn_id, open_streams, "client disconnected");
    Ok(())
}

/// Receives the first frame and checks it is a `Handshake` for our version.
///
/// Writes straight to the sink: the writer task doesn't exist yet.
async fn perform_handshake<D, C>(
    sink: &mut FrameSink,
    stream: &mut FrameStream,
    state: &ServerState<D, C>,
) -> Result<(), TactoeError>
where
    D: MemDb,
    C: Codec,
{
    let data = match tokio::time::timeout(state.config.handshake_timeout, stream.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = match state.codec.decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => return Err(reject(sink, state, 0, e).await),
    };

    let seq = envelope.seq;
    match envelope.payload {
        Payload::Request(Request::Handshake { version }) if version == PROTOCOL_VERSION => {}
        Payload::Request(Request::Handshake { version }) => {
            let e = ProtocolError::InvalidMessage(format!(
                "version mismatch: expected {PROTOCOL_VERSION}, got {version}"
            ));
            return Err(reject(sink, state, seq, e).await);
        }
        _ => {
            let e = ProtocolError::InvalidMessage("first message must be Handshake".into());
            return Err(reject(sink, state, seq, e).await);
        }
    }

    let ack = state.envelope(
        seq,
        Response::HandshakeAck {
            server_time: state.uptime_millis(),
        },
    );
    sink.send(&state.codec.encode(&ack)?).await?;
    Ok(())
}

/// Tells the client why its handshake failed and returns the error.
async fn reject<D, C>(sink: &mut FrameSink, state: &ServerState<D, C>, seq: u64, e: ProtocolError) -> TactoeError
where
    D: MemDb,
    C: Codec,
{
    let e = TactoeError::from(e);
    debug!(conn_id = %sink.id(), error = %e, "handshake rejected");

    let reply = state.envelope(
        seq,
        Response::Error {
            code: e.code(),
            message: e.client_message(),
        },
    );
    let sent = match state.codec.encode(&reply) {
        Ok(bytes) => sink.send(&bytes).await.map_err(TactoeError::from),
        Err(encode) => Err(encode.into()),
    };
    match sent {
        Ok(()) => e,
        Err(send) => send,
    }
}

/// Runs one request. `Ok(None)` means a stream task now owns the reply.
async fn dispatch<D, C>(
    state: &Arc<ServerState<D, C>>,
    request: Request,
    seq: u64,
    tx: &Outbound,
    streams: &mut JoinSet<()>,
) -> Result<Option<Response>, TactoeError>
where
    D: MemDb,
    C: Codec,
{
    let rooms = &state.rooms;
    let response = match request {
        Request::Handshake { .. } => {
            return Err(ProtocolError::InvalidMessage("handshake already completed".into()).into());
        }
        Request::Login { login_id, session_id } => Response::LoggedIn {
            login: state.logins.login(&login_id, session_id.as_deref()).await?,
        },
        Request::Logout { login_id } => {
            state.logins.logout(&login_id).await?;
            Response::Ok
        }
        Request::CreateRoom => Response::RoomCreated {
            room_id: rooms.create().await?,
        },
        Request::CanEnterRoom { room_id, login_id } => Response::CanEnterRoom {
            can_enter: rooms.can_enter(&room_id, &login_id).await?,
        },
        Request::EnterRoom { room_id, login_id } => {
            let listener = rooms.enter(&room_id, &login_id).await?;
            streams.spawn(stream_situations(listener, seq, tx.clone(), Arc::clone(state)));
            return Ok(None);
        }
        Request::Declaration { room_id, login_id } => {
            rooms.declaration(&room_id, &login_id).await?;
            Response::Ok
        }
        Request::LeaveRoom { room_id, login_id } => {
            rooms.leave(&room_id, &login_id).await?;
            Response::Ok
        }
        Request::Attack {
            room_id,
            player,
            position,
            piece,
        } => {
            rooms.attack(&room_id, player, position, piece).await?;
            Response::Ok
        }
        Request::Pick {
            room_id,
            player,
            position,
            piece,
        } => {
            rooms.pick(&room_id, player, position, piece).await?;
            Response::Ok
        }
        Request::ResetBattle { room_id } => {
            rooms.reset(&room_id).await?;
            Response::Ok
        }
    };
    Ok(Some(response))
}

/// Pushes every situation `listener` sees, tagged with the `EnterRoom` seq.
///
/// "Nothing new" is waited out; leaving the room ends the stream with
/// `StreamEnd`; anything else ends it with an `Error`. Aborting the task
/// cancels a pending listen.
async fn stream_situations<D, C>(mut listener: BattleListener<D>, seq: u64, tx: Outbound, state: Arc<ServerState<D, C>>)
where
    D: MemDb,
    C: Codec,
{
    let room_id = listener.room_id().clone();
    let login_id = listener.login_id().clone();
    debug!(%room_id, %login_id, seq, "situation stream opened");

    loop {
        let response = match listener.listen().await {
            Ok(situation) => Response::Situation { situation },
            Err(e) => match e.kind() {
                ErrorKind::NotFound => {
                    trace!(%room_id, %login_id, "no new situation, waiting");
                    tokio::time::sleep(listener.retry_delay()).await;
                    continue;
                }
                ErrorKind::Left => {
                    info!(%room_id, %login_id, seq, "situation stream ended");
                    let _ = tx.send(state.envelope(seq, Response::StreamEnd)).await;
                    return;
                }
                _ => {
                    let e = TactoeError::from(e);
                    if e.is_internal() {
                        error!(%room_id, %login_id, seq, error = %e, "situation stream failed");
                    } else {
                        debug!(%room_id, %login_id, seq, error = %e, "situation stream failed");
                    }
                    let reply = Response::Error {
                        code: e.code(),
                        message: e.client_message(),
                    };
                    let _ = tx.send(state.envelope(seq, reply)).await;
                    return;
                }
            },
        };

        if tx.send(state.envelope(seq, response)).await.is_err() {
            return;
        }
    }
}

/// Encodes and sends queued envelopes until every sender is gone.
async fn write_frames<D, C>(mut sink: FrameSink, mut rx: mpsc::Receiver<Envelope>, state: Arc<ServerState<D, C>>)
where
    D: MemDb,
    C: Codec,
{
    let conn_id = sink.id();
    while let Some(envelope) = rx.recv().await {
        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(%conn_id, seq = envelope.seq, error = %e, "failed to encode envelope");
                continue;
            }
        };
        if let Err(e) = sink.send(&bytes).await {
            debug!(%conn_id, error = %e, "send failed, writer stopping");
            return;
        }
    }
    let _ = sink.close().await;
}

/// Turns a failed call into an `Error` response, logging internal faults.
fn failure(conn_id: ConnectionId, seq: u64, method: &str, e: &TactoeError) -> Response {
    if e.is_internal() {
        error!(%conn_id, seq, method, error = %e, "request failed");
    } else {
        debug!(%conn_id, seq, method, error = %e, "request rejected");
    }
    Response::Error {
        code: e.code(),
        message: e.client_message(),
    }
}
