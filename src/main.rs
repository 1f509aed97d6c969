//! Command-line monitor for GlucoSense sensors.
//!
//! Usage:
//!   glucosense-rs /dev/rfcomm0     # read a bound RFCOMM device node
//!   glucosense-rs                  # read raw firmware output from stdin
//!   glucosense-rs --simulate       # built-in firmware simulator, no hardware
//!   glucosense-rs --json ...       # print snapshots as JSON lines
//!
//! Bind the sensor first, e.g. `rfcomm bind 0 <MAC> 1`.

use std::time::Duration;

use anyhow::Result;
use log::{error, info};

use glucosense_rs::protocol::{SPP_UUID, TARGET_DEVICE_NAME};
use glucosense_rs::sensor_client::{SensorClient, SensorClientConfig};
use glucosense_rs::simulator::spawn_simulator;
use glucosense_rs::types::{SensorEvent, SensorSnapshot, SensorState};

/// Rounds of synthetic output produced by `--simulate`.
const SIMULATOR_ROUNDS: u32 = 3;

/// Delay between simulated transport reads.
const SIMULATOR_INTERVAL: Duration = Duration::from_millis(40);

fn print_snapshot(s: &SensorSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(s)?);
        return Ok(());
    }
    let status = match s.state {
        SensorState::Idle => "WAITING FOR DEVICE".to_owned(),
        SensorState::Calibrating => format!(
            "CALIBRATING {:.1}s left ({:.0}%)",
            s.calibration.seconds_left,
            s.calibration.fraction() * 100.0
        ),
        SensorState::Measuring => "MEASURING".to_owned(),
        SensorState::NoFinger => "NO FINGER DETECTED - place finger to start".to_owned(),
        SensorState::ResultReady => "DATA ACQUIRED".to_owned(),
    };
    println!(
        "[{}] {status:<44} PI={:<8} X1={:<10} X2={}",
        if s.connected { "connected" } else { "offline" },
        s.result.perfusion_index,
        s.result.feature_x1,
        s.result.feature_x2,
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ───────────────────────────────────────────────────────────────
    // Set RUST_LOG=debug to see every classified line, e.g.:
    //   RUST_LOG=glucosense_rs=debug glucosense-rs --simulate
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // ── Arguments ─────────────────────────────────────────────────────────────
    let args: Vec<String> = std::env::args().skip(1).collect();
    let simulate = args.iter().any(|a| a == "--simulate");
    let json = args.iter().any(|a| a == "--json");
    let path = args.iter().find(|a| !a.starts_with("--")).cloned();

    let config = SensorClientConfig {
        device_name: if simulate {
            "simulator".into()
        } else {
            path.clone().unwrap_or_else(|| TARGET_DEVICE_NAME.into())
        },
        ..Default::default()
    };
    let client = SensorClient::new(config);

    // ── Attach ────────────────────────────────────────────────────────────────
    let mut simulator = None;
    let (mut rx, handle) = if simulate {
        let (reader, writer) = tokio::io::duplex(4096);
        simulator = Some(spawn_simulator(
            writer,
            rand::random(),
            SIMULATOR_ROUNDS,
            SIMULATOR_INTERVAL,
        ));
        client.attach(reader).await?
    } else if let Some(path) = &path {
        info!("Reading {path} (SPP service {SPP_UUID})");
        client.open(path).await?
    } else {
        info!("Reading firmware output from stdin");
        client.attach(tokio::io::stdin()).await?
    };

    // ── Ctrl-C ────────────────────────────────────────────────────────────────
    let (stop_tx, mut stop_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(()).await;
        }
    });

    // ── Main event loop ───────────────────────────────────────────────────────
    let mut interrupted = false;
    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            Some(()) = stop_rx.recv() => {
                info!("Interrupted; disconnecting …");
                handle.disconnect();
                interrupted = true;
                continue;
            }
        };
        let Some(event) = event else { break };
        match event {
            SensorEvent::Connected(name) => info!("Attached to {name}"),
            SensorEvent::Line(entry) => {
                if !json {
                    println!("  > {}", entry.text);
                }
            }
            SensorEvent::Snapshot(s) => {
                if let Err(e) = print_snapshot(&s, json) {
                    error!("Cannot print snapshot: {e}");
                }
            }
            SensorEvent::Disconnected => {
                info!("Stream closed.");
                break;
            }
        }
    }

    let lines = handle.log_lines();
    info!(
        "{} line(s) in serial monitor; last: {:?}",
        lines.len(),
        lines.last().map(|e| e.text.as_str())
    );
    handle.join().await?;

    if let Some(task) = simulator {
        // After Ctrl-C the reader is gone and further writes would fail.
        if interrupted {
            task.abort();
        }
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Simulator failed: {e}"),
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!("Simulator task failed: {e}"),
        }
    }
    Ok(())
}
