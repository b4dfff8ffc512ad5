// Device simulator: stands in for the vehicle's WebSocket endpoint
//
// Accepts M<left>:<right> and L<value> frames, echoes them to every client,
// and pushes battery (every 200ms) and motor current (every 100ms) frames.
// Dropping a client returns the motors to neutral, as the firmware does.
//
// Usage: cargo run --example device_sim -- --listen 127.0.0.1:8080
// Then:  cargo run -- --host 127.0.0.1 --port 8080

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use drive_panel::config::{BATTERY_SENTINEL, CURRENT_SENTINEL, MAX_DUTY, NEUTRAL_DUTY};
use drive_panel::messages::OutboundFrame;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

// Fully charged pack and how fast driving drains it
const FULL_MV: u32 = 8400;
const EMPTY_MV: u32 = 6800;
const DRAIN_MV_PER_TICK: u32 = 2;
// Current drawn per duty step above neutral
const MA_PER_DUTY: u32 = 150;

#[derive(Debug, Parser)]
struct Args {
    /// Address to serve the WebSocket endpoint on
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Report the "no battery" sentinel instead of a voltage
    #[arg(long)]
    no_battery: bool,
}

struct Motors {
    left: u8,
    right: u8,
    battery_mv: u32,
}

impl Motors {
    fn neutral(&mut self) {
        self.left = NEUTRAL_DUTY;
        self.right = NEUTRAL_DUTY;
    }

    fn current_ma(duty: u8) -> u32 {
        match u32::from(duty.saturating_sub(NEUTRAL_DUTY)) {
            0 => CURRENT_SENTINEL, // sense amp floats with the motor idle
            steps => steps * MA_PER_DUTY,
        }
    }
}

type Shared = Arc<Mutex<Motors>>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let motors: Shared = Arc::new(Mutex::new(Motors {
        left: NEUTRAL_DUTY,
        right: NEUTRAL_DUTY,
        battery_mv: FULL_MV,
    }));
    let (frames, _) = broadcast::channel::<String>(64);

    tokio::spawn(telemetry(motors.clone(), frames.clone(), args.no_battery));

    let listener = TcpListener::bind(args.listen).await?;
    info!("Device simulator listening on ws://{}/", args.listen);

    loop {
        let (stream, peer) = listener.accept().await?;
        tokio::spawn(serve_client(stream, peer, motors.clone(), frames.clone()));
    }
}

async fn telemetry(motors: Shared, frames: broadcast::Sender<String>, no_battery: bool) {
    let mut tick = interval(Duration::from_millis(100));
    let mut count: u64 = 0;

    loop {
        tick.tick().await;
        count += 1;

        let (current, battery) = {
            let Ok(mut m) = motors.lock() else { return };
            if m.left > NEUTRAL_DUTY || m.right > NEUTRAL_DUTY {
                m.battery_mv = m.battery_mv.saturating_sub(DRAIN_MV_PER_TICK).max(EMPTY_MV);
            }
            let current = format!(
                "A{},{}",
                Motors::current_ma(m.left),
                Motors::current_ma(m.right)
            );
            let battery_mv = if no_battery { BATTERY_SENTINEL } else { m.battery_mv };
            (current, format!("V{}", battery_mv))
        };

        // Sending only fails while no client is connected
        let _ = frames.send(current);
        if count % 2 == 0 {
            let _ = frames.send(battery);
        }
    }
}

async fn serve_client(
    stream: TcpStream,
    peer: SocketAddr,
    motors: Shared,
    frames: broadcast::Sender<String>,
) {
    let socket = match accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!("Handshake with {} failed: {}", peer, e);
            return;
        }
    };
    info!("Client {} connected", peer);

    let (mut sink, mut source) = socket.split();
    let mut outgoing = frames.subscribe();

    loop {
        tokio::select! {
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if apply(&motors, &text) {
                        let _ = frames.send(text);
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Client {} dropped: {}", peer, e);
                    break;
                }
            },
            frame = outgoing.recv() => match frame {
                Ok(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Client {} lagging, skipped {} frames", peer, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    if let Ok(mut m) = motors.lock() {
        m.neutral();
    }
    info!("Client {} disconnected, motors back to neutral", peer);
}

/// Apply a command frame; returns whether it was accepted
fn apply(motors: &Shared, text: &str) -> bool {
    match OutboundFrame::parse(text) {
        Ok(OutboundFrame::Drive(duty)) => {
            let Ok(mut m) = motors.lock() else { return false };
            // Channels silently ignore out-of-range duty
            if duty.left <= MAX_DUTY {
                m.left = duty.left;
            }
            if duty.right <= MAX_DUTY {
                m.right = duty.right;
            }
            debug!("Motors: left={} right={}", m.left, m.right);
            true
        }
        Ok(OutboundFrame::LegacySpeed(value)) => {
            info!("L value: {}", value);
            true
        }
        Err(e) => {
            info!("Got an unknown message {:?}: {}", text, e);
            false
        }
    }
}
