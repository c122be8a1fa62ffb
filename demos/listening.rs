//! Pure listening demo: receive tracking data without a controller
//! connection and print what each frame contains.
//!
//! Usage: `cargo run --example listening -- <data port>`
//!
//! Measurement must already be running and the controller configured to
//! send tracking data to this host and port.

use anyhow::{Context, Result, bail};
use tracklink::Tracklink;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(port) = args.next() else {
        bail!("Usage: listening <data port>");
    };
    let port: u16 = port.parse().context("invalid port")?;

    let mut session = Tracklink::listen(port).await?;
    println!("listening at local data port {}", session.data_port());

    loop {
        if !session.receive().await {
            eprintln!("no data ({:?})", session.last_data_error());
            continue;
        }

        let snapshot = session.snapshot();
        println!(
            "frame {} ts {}: {} bodies, {} flysticks, {} hands, {} markers",
            snapshot.frame_counter,
            snapshot.timestamp,
            snapshot.bodies.iter().filter(|b| b.is_tracked()).count(),
            snapshot.flysticks.iter().filter(|f| f.is_tracked()).count(),
            snapshot.hands.iter().filter(|h| h.is_tracked()).count(),
            snapshot.markers.len(),
        );

        for body in snapshot.bodies.iter().filter(|b| b.is_tracked()) {
            println!("  body {} quality {:.2} loc {:?}", body.id, body.quality, body.loc);
        }
    }
}
