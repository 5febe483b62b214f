//! Demo: a ground station and a vehicle talking over the loopback radio.
//!
//! Run with `cargo run --features demo --bin linkdemo`.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use aerolink::prelude::*;

fn main() -> aerolink::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (ground_radio, vehicle_radio) = loopback_pair();

    let ground = AeroLink::new(
        ground_radio,
        LinkConfig {
            local_id: 0,
            remote_id: 1,
            ..LinkConfig::default()
        },
    )?;
    let vehicle = AeroLink::new(
        vehicle_radio,
        LinkConfig {
            local_id: 1,
            remote_id: 0,
            ..LinkConfig::default()
        },
    )?;

    ground.callbacks().set_event_callback(|event| {
        info!(%event, "ground event");
    });
    ground.callbacks().set_telemetry_callback(|telemetry| {
        info!(
            altitude_m = telemetry.pos_z,
            battery_mv = telemetry.voltage2,
            "telemetry"
        );
    });
    vehicle.callbacks().set_command_callback(|command| {
        info!(number = %command.number, len = command.payload.len(), "vehicle executing command");
    });

    ground.start()?;
    vehicle.start()?;

    // Vehicle streams a short ascent.
    let streamer = {
        let telemetry_base = Telemetry {
            header: Header::new(1, 0),
            kind: TelemetryKind::A,
            voltage1: 12_600,
            voltage2: 7_400,
            memory_log: [12, 4, 9],
            ..Telemetry::default()
        };
        let vehicle = Arc::new(vehicle);
        let handle = Arc::clone(&vehicle);
        let thread = std::thread::spawn(move || {
            for tick in 0..10i16 {
                let mut telemetry = telemetry_base;
                telemetry.pos_z = tick * 120;
                telemetry.vel_z = 118;
                telemetry.acc_z = -981;
                if handle.send_telemetry(&telemetry).is_err() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        });
        (vehicle, thread)
    };

    // Ground fires a fin actuation test and waits for the ack.
    let command = ground
        .command(CommandNumber::FIN_TEST, vec![0x01, 0x02, 0x03])?
        .with_priority(5);
    ground.send_command(&command)?;

    std::thread::sleep(Duration::from_millis(1200));

    let diag = ground.diagnostics();
    info!(
        acked = diag.commands_acked,
        gave_up = diag.commands_gave_up,
        frames_received = diag.frames_received,
        latest_altitude = ground.latest_telemetry().map(|t| t.pos_z),
        "session summary"
    );

    let (vehicle, thread) = streamer;
    let _ = thread.join();
    ground.stop();
    vehicle.stop();
    Ok(())
}
