//! Tactile feedback demo: control a tactile feedback device with a
//! Flystick.
//!
//! Usage: `cargo run --example tactile -- <controller host> <data port> <flystick id> <hand id>`
//!
//! The upper Flystick buttons set feedback on one finger each with fixed
//! strength, the joystick drives two fingers with variable strength, and
//! the trigger button stops the program.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracklink::Tracklink;

const NUM_FINGERS: usize = 3;

/// Repeat period for the tactile command; the device switches off when it
/// stops hearing from us.
const REPEAT_PERIOD: Duration = Duration::from_millis(1000);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [host, port, flystick_id, hand_id] = args.as_slice() else {
        bail!("Usage: tactile <controller host> <data port> <flystick id> <hand id>");
    };
    let port: u16 = port.parse().context("invalid port")?;
    let flystick_id: usize = flystick_id.parse().context("invalid Flystick id")?;
    let hand_id: usize = hand_id.parse().context("invalid hand id")?;

    let mut session = Tracklink::connect(host, port).await?;
    println!("connected to {host}, listening at local data port {}", session.data_port());

    if !session.start_measurement().await {
        bail!("measurement start failed");
    }

    let mut strengths = [0.0f64; NUM_FINGERS];
    let mut last_sent = Instant::now();

    loop {
        if !session.receive().await {
            eprintln!("no data ({:?})", session.last_data_error());
            continue;
        }

        let snapshot = session.snapshot();
        let Some(flystick) = snapshot.flystick(flystick_id) else {
            bail!("Flystick {flystick_id} doesn't exist");
        };
        if snapshot.hand(hand_id).is_none() {
            bail!("hand {hand_id} doesn't exist");
        }

        if flystick.buttons.first().copied().unwrap_or(false) {
            break; // trigger pressed
        }

        let mut wanted = [0.0f64; NUM_FINGERS];
        for finger in 0..NUM_FINGERS {
            if flystick.buttons.get(finger + 1).copied().unwrap_or(false) {
                wanted[finger] = 0.5;
            }
        }
        if let Some(&deflection) = flystick.joysticks.first() {
            if deflection > 0.0 {
                wanted[0] = deflection;
            } else if deflection < 0.0 {
                wanted[2] = -deflection;
            }
        }

        if wanted != strengths || last_sent.elapsed() >= REPEAT_PERIOD {
            if !session.tactile_hand(hand_id, &wanted).await {
                eprintln!("tactile command failed");
            }
            strengths = wanted;
            last_sent = Instant::now();
        }
    }

    session.tactile_hand_off(hand_id, NUM_FINGERS).await;
    session.stop_measurement().await;

    Ok(())
}
