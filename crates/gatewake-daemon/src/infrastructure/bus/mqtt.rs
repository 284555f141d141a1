//! MQTT subscriber for the gate controller's access events.
//!
//! The gate controller publishes one JSON payload per badge swipe on a
//! single topic (default `gate/access`).  The subscriber runs as a
//! background task, decodes each publish into an
//! [`AccessEvent`](gatewake_core::AccessEvent), and forwards it over an
//! mpsc channel to the dispatch worker pool.
//!
//! Failure policy at this boundary:
//!
//! - A malformed payload is logged as a warning and dropped.  Nothing a
//!   misbehaving gate publishes may take the subscription down.
//! - A broken broker connection is retried after a short pause; rumqttc
//!   re-establishes the session and the loop re-subscribes on every
//!   `ConnAck` since the broker forgets subscriptions across clean
//!   sessions.
//! - The loop exits when the shutdown flag clears or the daemon drops the
//!   receiving end of the channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gatewake_core::{AccessEvent, BusMessage};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Pause before polling again after a connection-level error.
const RECONNECT_PAUSE: Duration = Duration::from_secs(2);

/// Depth of the subscriber → dispatcher channel.
const EVENT_CHANNEL_DEPTH: usize = 64;

/// Broker and topic settings.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: "gate/access".to_string(),
            client_id: "gatewake-daemon".to_string(),
        }
    }
}

/// Spawns the subscriber task and returns the receiving end of the event
/// channel.
///
/// The task runs until `running` clears or the receiver is dropped.
pub fn start_bus_subscriber(
    config: BusConfig,
    running: Arc<AtomicBool>,
) -> mpsc::Receiver<AccessEvent> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);
    tokio::spawn(async move {
        subscriber_loop(config, tx, running).await;
    });
    rx
}

/// The main poll loop executed on the subscriber task.
async fn subscriber_loop(
    config: BusConfig,
    tx: mpsc::Sender<AccessEvent>,
    running: Arc<AtomicBool>,
) {
    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(30));

    let (client, mut event_loop) = AsyncClient::new(options, 10);
    info!(
        host = %config.host,
        port = config.port,
        topic = %config.topic,
        "connecting to gate event bus"
    );

    while running.load(Ordering::Relaxed) {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!(topic = %config.topic, "connected to broker; subscribing");
                if let Err(e) = client.subscribe(config.topic.clone(), QoS::AtLeastOnce).await {
                    error!("subscribe failed: {e}");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let event = match BusMessage::decode(&publish.payload) {
                    Ok(message) => AccessEvent::from_bus(message),
                    Err(e) => {
                        // Bad input from the bus is the gate's bug, not ours.
                        warn!(topic = %publish.topic, "dropping malformed bus payload: {e}");
                        continue;
                    }
                };
                debug!(
                    event_id = %event.event_id,
                    identity = %event.identity,
                    kind = %event.kind,
                    "access event received"
                );
                if tx.send(event).await.is_err() {
                    // Receiver dropped — the daemon is shutting down.
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("bus connection error: {e}; retrying in {RECONNECT_PAUSE:?}");
                tokio::time::sleep(RECONNECT_PAUSE).await;
            }
        }
    }

    info!("bus subscriber stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
