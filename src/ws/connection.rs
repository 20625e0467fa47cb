//! WebSocket transport loop for a single connection.
//!
//! Three cooperating parts per connection:
//!
//! - a reader task that forwards text frames and signals transport close,
//! - a writer task that drains the connection's outbound channel,
//! - the processing loop, which runs the [`SocketSession`] on one frame at
//!   a time and queues each reply before taking the next frame.
//!
//! Closing the transport drops whatever frame is in flight.

use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};

use super::session::SocketSession;
use crate::domain::ConnectionHandle;
use crate::gateway::Gateway;

/// Runs one WebSocket connection until its transport closes.
pub async fn run_connection(socket: WebSocket, gateway: Arc<Gateway>, send_buffer: usize) {
    let (ws_tx, ws_rx) = socket.split();
    let (out_tx, out_rx) = mpsc::channel::<String>(send_buffer.max(1));
    let handle = gateway.connection_handle(out_tx);
    let connection_id = handle.id();

    if let Err(e) = gateway.registry().add(handle.clone()).await {
        tracing::warn!(%connection_id, error = %e, "failed to register connection");
        return;
    }
    let _ = gateway.events().connection_opened(connection_id);
    tracing::info!(%connection_id, "ws connection opened");

    let writer = tokio::spawn(write_loop(ws_tx, out_rx));
    let (frame_tx, frame_rx) = mpsc::channel::<String>(send_buffer.max(1));
    let (closed_tx, closed_rx) = watch::channel(false);
    let reader = tokio::spawn(read_loop(
        ws_rx,
        frame_tx,
        closed_tx,
        handle.clone(),
        send_buffer.max(1),
    ));

    let mut session = gateway.session(handle.clone());
    session.open();
    process_frames(&mut session, &handle, frame_rx, closed_rx).await;
    session.close();

    let _ = gateway.registry().remove(connection_id).await;
    let _ = gateway.events().connection_closed(connection_id);
    reader.abort();
    writer.abort();

    tracing::info!(%connection_id, "ws connection closed");
}

/// Feeds frames to the session strictly in arrival order.
async fn process_frames(
    session: &mut SocketSession,
    handle: &ConnectionHandle,
    mut frames: mpsc::Receiver<String>,
    mut closed: watch::Receiver<bool>,
) {
    let connection_id = session.id();
    loop {
        if *closed.borrow() {
            break;
        }
        let frame = tokio::select! {
            biased;
            _ = closed.changed() => break,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let reply = tokio::select! {
            biased;
            _ = closed.changed() => {
                tracing::debug!(%connection_id, "transport closed mid-frame");
                break;
            }
            reply = session.handle_frame(&frame) => reply,
        };

        if let Some(reply) = reply
            && handle.send_frame(reply).await.is_err()
        {
            break;
        }
    }
}

/// Reads frames from the client until the transport closes.
///
/// The socket is polled even while the processing queue is full, so a
/// client close is seen while a slow handler runs. Frames that arrive in
/// that window wait in a local backlog of at most `backlog_limit` frames;
/// a client that overruns it is disconnected.
async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    frames: mpsc::Sender<String>,
    closed: watch::Sender<bool>,
    handle: ConnectionHandle,
    backlog_limit: usize,
) {
    let mut backlog: VecDeque<String> = VecDeque::new();
    loop {
        tokio::select! {
            biased;
            permit = frames.reserve(), if !backlog.is_empty() => {
                let Ok(permit) = permit else { break };
                if let Some(frame) = backlog.pop_front() {
                    permit.send(frame);
                }
            }
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if backlog.len() >= backlog_limit {
                        tracing::warn!(
                            connection_id = %handle.id(),
                            backlog = backlog.len(),
                            "inbound backlog full; closing connection"
                        );
                        break;
                    }
                    backlog.push_back(text.as_str().to_owned());
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::debug!(connection_id = %handle.id(), "ignoring binary frame");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(connection_id = %handle.id(), error = %e, "ws read error");
                    break;
                }
            },
        }
    }
    handle.mark_closed();
    let _ = closed.send(true);
}

/// Writes queued frames to the client.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut frames: mpsc::Receiver<String>,
) {
    while let Some(frame) = frames.recv().await {
        if ws_tx.send(Message::text(frame)).await.is_err() {
            break;
        }
    }
    let _ = ws_tx.close().await;
}
