//! Channel between a session and the relay

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::matchmaking::{PeerLink, RoomService};
use crate::ws::protocol::{encode, ClientMsg, ServerMsg};

/// Publish/subscribe channel as seen by a session: typed messages out,
/// raw text frames in. Frames are decoded by the session so malformed
/// input can be dropped without touching game state.
pub struct Transport {
    pub outbound: mpsc::Sender<ClientMsg>,
    pub inbound: mpsc::Receiver<String>,
}

impl Transport {
    pub fn new(outbound: mpsc::Sender<ClientMsg>, inbound: mpsc::Receiver<String>) -> Self {
        Self { outbound, inbound }
    }

    /// Attach directly to an in-process relay. Dropping the transport
    /// behaves like closing the socket.
    pub fn local(rooms: Arc<RoomService>) -> Self {
        let (client_tx, mut client_rx) = mpsc::channel::<ClientMsg>(64);
        let (server_tx, mut server_rx) = mpsc::channel::<ServerMsg>(64);
        let (frame_tx, frame_rx) = mpsc::channel::<String>(64);

        tokio::spawn(async move {
            let mut link = PeerLink::new(server_tx);
            loop {
                tokio::select! {
                    msg = client_rx.recv() => match msg {
                        Some(msg) => rooms.handle(&mut link, msg),
                        None => break,
                    },
                    Some(msg) = server_rx.recv() => {
                        let text = match encode(&msg) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(error = %e, "Failed to encode relay message");
                                continue;
                            }
                        };
                        if frame_tx.send(text).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(conn_id = %link.conn_id, "Local transport closed");
            rooms.disconnect(&link);
        });

        Self::new(client_tx, frame_rx)
    }
}
