//! Communicating demo: start measurement remotely, collect some frames,
//! and stop measurement again.
//!
//! Usage: `cargo run --example communicating -- <controller host> <data port>`

use anyhow::{Context, Result, bail};
use tracklink::Tracklink;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [host, port] = args.as_slice() else {
        bail!("Usage: communicating <controller host> <data port>");
    };
    let port: u16 = port.parse().context("invalid port")?;

    let mut session = Tracklink::connect(host, port).await?;
    println!("connected to {host}, listening at local data port {}", session.data_port());

    if let Some(access) = session.get_param("system", "access").await {
        println!("system access: {access}");
    }

    if !session.start_measurement().await {
        drain_messages(&mut session).await;
        bail!("measurement start failed");
    }

    for _ in 0..1000 {
        if !session.receive().await {
            eprintln!("no data ({:?})", session.last_data_error());
            continue;
        }

        let snapshot = session.snapshot();
        println!(
            "frame {}: {} of {} bodies tracked",
            snapshot.frame_counter,
            snapshot.bodies.iter().filter(|b| b.is_tracked()).count(),
            snapshot.bodies.len(),
        );
    }

    if !session.stop_measurement().await {
        drain_messages(&mut session).await;
        bail!("measurement stop failed");
    }

    Ok(())
}

/// Print pending controller event messages, e.g. after a failed command.
async fn drain_messages(session: &mut tracklink::Session) {
    while let Some(message) = session.get_message().await {
        eprintln!(
            "[{}] {} (frame {}, id {:#x}): {}",
            message.origin, message.status, message.frame, message.error_id, message.message
        );
    }
}
