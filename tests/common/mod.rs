//! In-process stand-ins for the surveillance feed and the mesh node.

#![allow(dead_code)]

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use prost::Message;
use skymesh_client::codec::{MeshFrameCodec, WAKE_SEQUENCE};
use skymesh_client::proto::{from_radio, mesh_packet, to_radio, FromRadio, ToRadio};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use tokio_util::codec::Framed;

/// Serves lines pushed by the test to whichever client is connected.
pub struct FakeFeed {
    pub addr: SocketAddr,
    tx: mpsc::UnboundedSender<String>,
}

impl FakeFeed {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    let mut rx = rx.lock().await;
                    while let Some(line) = rx.recv().await {
                        if socket.write_all(format!("{}\r\n", line).as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self { addr, tx }
    }

    pub fn push(&self, line: impl Into<String>) {
        let _ = self.tx.send(line.into());
    }
}

/// A text packet received by the fake node
#[derive(Debug, Clone)]
pub struct ReceivedText {
    pub channel: u32,
    pub hop_limit: u32,
    pub text: String,
}

/// Accepts mesh clients, answers the configuration request and records text packets.
pub struct FakeMeshNode {
    pub addr: SocketAddr,
    texts: Arc<Mutex<Vec<ReceivedText>>>,
    connections: Arc<AtomicU32>,
    kick: Arc<Notify>,
}

impl FakeMeshNode {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let texts = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicU32::new(0));
        let kick = Arc::new(Notify::new());

        tokio::spawn({
            let texts = Arc::clone(&texts);
            let connections = Arc::clone(&connections);
            let kick = Arc::clone(&kick);
            async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    let texts = Arc::clone(&texts);
                    let kick = Arc::clone(&kick);

                    tokio::spawn(async move {
                        let mut wake = [0u8; 32];
                        if socket.read_exact(&mut wake).await.is_err() || wake != WAKE_SEQUENCE {
                            return;
                        }
                        let mut framed = Framed::new(socket, MeshFrameCodec);

                        loop {
                            let frame = tokio::select! {
                                _ = kick.notified() => return,
                                frame = framed.next() => frame,
                            };
                            let Some(Ok(frame)) = frame else {
                                return;
                            };
                            let Ok(msg) = ToRadio::decode(frame) else {
                                continue;
                            };

                            match msg.payload_variant {
                                Some(to_radio::PayloadVariant::WantConfigId(id)) => {
                                    let reply = FromRadio {
                                        id: 1,
                                        payload_variant: Some(from_radio::PayloadVariant::ConfigCompleteId(id)),
                                    };
                                    let _ = framed.send(Bytes::from(reply.encode_to_vec())).await;
                                }
                                Some(to_radio::PayloadVariant::Packet(packet)) => {
                                    if let Some(mesh_packet::PayloadVariant::Decoded(data)) = packet.payload_variant {
                                        texts.lock().push(ReceivedText {
                                            channel: packet.channel,
                                            hop_limit: packet.hop_limit,
                                            text: String::from_utf8_lossy(&data.payload).into_owned(),
                                        });
                                    }
                                }
                                _ => {}
                            }
                        }
                    });
                }
            }
        });

        Self {
            addr,
            texts,
            connections,
            kick,
        }
    }

    pub fn texts(&self) -> Vec<ReceivedText> {
        self.texts.lock().clone()
    }

    pub fn connections(&self) -> u32 {
        self.connections.load(Ordering::SeqCst)
    }

    /// Drops every connected client.
    pub fn kick_all(&self) {
        self.kick.notify_waiters();
    }
}

/// Polls `condition` every 20ms for up to `timeout`.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// An airborne position record in dump1090 BaseStation format.
pub fn airborne(icao: &str, alt: u32, lat: f64, lon: f64) -> String {
    format!(
        "MSG,3,111,11111,{},111111,2024/01/15,10:30:01.000,2024/01/15,10:30:01.000,,{},,,{},{},,,0,0,0,0",
        icao, alt, lat, lon
    )
}

/// An identification record in dump1090 BaseStation format.
pub fn identification(icao: &str, callsign: &str) -> String {
    format!(
        "MSG,1,111,11111,{},111111,2024/01/15,10:30:00.000,2024/01/15,10:30:00.000,{},,,,,,,,,,,0",
        icao, callsign
    )
}
