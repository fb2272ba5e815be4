//! Broker topic adapters
//!
//! The broker is reached through its WebSocket bridge: one connection per
//! topic at `{broker}/topics/{topic}`, one JSON text frame per message. A
//! frame wraps the event together with its partitioning key, since the
//! socket carries no per-message metadata of its own. The adapters stay
//! thin; the stage runtime only ever sees channels.

use crate::error::{PipelineError, Result};
use crate::events::Event;
use crate::shutdown::Shutdown;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Partitioning key for an event, only used by the broker to spread load.
pub fn message_key(event_id: i64) -> String {
    format!("Key-{event_id}")
}

#[derive(Debug, Serialize, Deserialize)]
struct TopicFrame {
    key: String,
    event: Event,
}

/// Serialize an event into its topic frame.
pub fn encode_message(event: &Event) -> Result<String> {
    let frame = TopicFrame {
        key: message_key(event.id),
        event: event.clone(),
    };
    Ok(serde_json::to_string(&frame)?)
}

/// Parse a topic frame back into an event.
pub fn decode_message(raw: &str) -> Result<Event> {
    let frame: TopicFrame = serde_json::from_str(raw)?;
    Ok(frame.event)
}

fn topic_url(broker_url: &str, topic: &str) -> String {
    let base = broker_url
        .replace("https://", "wss://")
        .replace("http://", "ws://");
    format!("{}/topics/{}", base.trim_end_matches('/'), topic)
}

/// Reads a topic and feeds decoded events into the stage input channel.
pub struct TopicConsumer {
    stream: WsStream,
    topic: String,
}

impl TopicConsumer {
    pub async fn connect(broker_url: &str, topic: &str) -> Result<Self> {
        let url = topic_url(broker_url, topic);
        let (stream, _) = connect_async(&url)
            .await
            .map_err(|err| PipelineError::Broker(format!("connect {url}: {err}")))?;

        info!(%topic, "consumer connected");
        Ok(Self {
            stream,
            topic: topic.to_string(),
        })
    }

    /// Consume until the connection closes or the shutdown signal fires.
    /// Malformed messages are logged and skipped; a full downstream channel
    /// blocks this loop, which is the intended back-pressure.
    pub async fn run(mut self, output: mpsc::Sender<Event>, mut shutdown: Shutdown) {
        loop {
            let frame = tokio::select! {
                _ = shutdown.triggered() => {
                    info!(topic = %self.topic, "consumer shutting down");
                    break;
                }
                frame = self.stream.next() => match frame {
                    Some(frame) => frame,
                    None => {
                        info!(topic = %self.topic, "topic stream ended");
                        break;
                    }
                },
            };

            match frame {
                Ok(Message::Text(text)) => match decode_message(&text) {
                    Ok(event) => {
                        if output.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(topic = %self.topic, %err, "skipping malformed message");
                    }
                },
                Ok(Message::Close(_)) => {
                    info!(topic = %self.topic, "broker closed the topic stream");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    error!(topic = %self.topic, %err, "broker read error");
                }
            }
        }
    }
}

/// Drains the stage output channel onto a topic.
pub struct TopicPublisher {
    stream: WsStream,
    topic: String,
}

impl TopicPublisher {
    pub async fn connect(broker_url: &str, topic: &str) -> Result<Self> {
        let url = topic_url(broker_url, topic);
        let (stream, _) = connect_async(&url)
            .await
            .map_err(|err| PipelineError::Broker(format!("connect {url}: {err}")))?;

        info!(%topic, "publisher connected");
        Ok(Self {
            stream,
            topic: topic.to_string(),
        })
    }

    /// Publish until the channel closes, then close the connection. The
    /// channel closing is the drain point during shutdown: upstream drops
    /// its sender and everything still buffered goes out first.
    pub async fn run(mut self, mut input: mpsc::Receiver<Event>) {
        while let Some(event) = input.recv().await {
            if let Err(err) = self.publish(&event).await {
                error!(topic = %self.topic, event_id = event.id, %err, "failed to publish event");
            }
        }

        if let Err(err) = self.stream.close(None).await {
            warn!(topic = %self.topic, %err, "failed to close publisher stream");
        }
    }

    async fn publish(&mut self, event: &Event) -> Result<()> {
        let encoded = encode_message(event)?;
        self.stream
            .send(Message::Text(encoded.into()))
            .await
            .map_err(|err| PipelineError::Broker(format!("write message: {err}")))
    }
}
