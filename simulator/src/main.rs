mod telemetry;

use clap::Parser;
use monitord::service::{CallContext, MonitorService};
use monitord::transport::grpc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use telemetry::{generate_readings, SimulatedDevice};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Fleet simulator: registers devices and streams status and telemetry over gRPC
#[derive(Debug, Parser)]
#[command(name = "simulator", version, about)]
struct Args {
    /// gRPC address of the monitor
    #[arg(long, env = "MONITOR_ADDR", default_value = "http://localhost:8081")]
    monitor_addr: String,

    /// Number of simulated devices
    #[arg(long, env = "DEVICES", default_value_t = 100)]
    devices: usize,

    /// Target calls per second across the fleet
    #[arg(
        long,
        env = "RATE",
        default_value_t = 200,
        value_parser = clap::value_parser!(u64).range(1..=1_000_000)
    )]
    rate: u64,

    /// Owner recorded for every simulated device
    #[arg(long, env = "OWNER", default_value = "simulator")]
    owner: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Interval between calls for `rate` calls per second, never zero.
fn tick_period(rate: u64) -> Duration {
    Duration::from_micros((1_000_000 / rate.max(1)).max(1))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    info!("Starting fleet simulator");
    info!(
        "Monitor: {}, Rate: {} calls/s, Devices: {}",
        args.monitor_addr, args.rate, args.devices
    );

    let monitor = grpc::connect(&args.monitor_addr).await?;
    let ctx = CallContext::new();
    let mut rng = StdRng::from_entropy();

    let mut fleet = Vec::with_capacity(args.devices);
    for i in 0..args.devices {
        let device_type = if i % 4 == 0 { "Sensor" } else { "Drone" };
        let name = format!("{}-{}", device_type.to_lowercase(), i);
        match monitor
            .register_device(&ctx, &name, &args.owner, device_type)
            .await
        {
            Ok(id) => fleet.push(SimulatedDevice::new(id, &mut rng)),
            Err(e) => warn!("Failed to register {}: {}", name, e),
        }
    }

    if fleet.is_empty() {
        anyhow::bail!("no device could be registered");
    }
    info!("Registered {} devices", fleet.len());

    let mut ticker = tokio::time::interval(tick_period(args.rate));
    let mut sent = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal after {} calls", sent);
                return Ok(());
            }
        }

        let idx = rng.gen_range(0..fleet.len());
        let device = &mut fleet[idx];
        device.step(&mut rng);

        let result = if rng.gen_bool(0.5) {
            monitor
                .update_status(&ctx, device.id, device.location, device.battery)
                .await
        } else {
            monitor
                .submit_telemetry(&ctx, device.id, generate_readings(&mut rng))
                .await
        };

        match result {
            Ok(_) => sent += 1,
            Err(e) => error!("Call for device {} failed: {}", device.id, e),
        }

        // Log progress periodically
        if sent > 0 && sent % 1000 == 0 {
            info!("Sent {} calls", sent);
        }
    }
}
