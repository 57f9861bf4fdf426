//! Two submission chains hand a buffer back and forth over timeline
//! semaphores.
//!
//! Run with `RUST_LOG=strata_device=trace,strata_core=trace` to watch the
//! submissions retire.

use std::time::{Duration, Instant};
use strata_core::{
    element::ElementType,
    error::Result,
    semaphore::{SemaphoreSet, WaitMode},
};
use strata_device::{Device, DeviceConfig, HostDevice, SubmissionBatch};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ROUNDS: u64 = 8;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let device = HostDevice::new(
        DeviceConfig::builder()
            .identifier("ping-pong")
            .worker_count(2)
            .submission_wait_timeout(Duration::from_secs(5))
            .build(),
    )?;

    let view = device.allocate_buffer_view(&[4], ElementType::UINT_32)?;
    let ping = device.create_semaphore(0)?;
    let pong = device.create_semaphore(0)?;
    let start = Instant::now();

    for round in 1..=ROUNDS {
        // Ping adds one to every element, pong doubles them.
        let buffer = view.buffer().clone();
        device.queue_submit(
            SubmissionBatch::new(move || {
                let mut bytes = buffer.read_to_vec(0, buffer.byte_length())?;
                for chunk in bytes.chunks_exact_mut(4) {
                    let value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    chunk.copy_from_slice(&(value + 1).to_le_bytes());
                }
                buffer.write(0, &bytes)
            })
            .wait_on(pong.clone(), round - 1)
            .signal(ping.clone(), round),
        )?;

        let buffer = view.buffer().clone();
        device.queue_submit(
            SubmissionBatch::new(move || {
                let mut bytes = buffer.read_to_vec(0, buffer.byte_length())?;
                for chunk in bytes.chunks_exact_mut(4) {
                    let value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    chunk.copy_from_slice(&(value * 2).to_le_bytes());
                }
                buffer.write(0, &bytes)
            })
            .wait_on(ping.clone(), round)
            .signal(pong.clone(), round),
        )?;
    }

    let done = SemaphoreSet::new().with(ping, ROUNDS).with(pong, ROUNDS);
    device.wait_semaphores_with_timeout(WaitMode::All, &done.as_list(), Duration::from_secs(10))?;

    let bytes = view.buffer().read_to_vec(0, view.byte_length())?;
    let first = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    tracing::info!(
        rounds = ROUNDS,
        view = %view,
        value = first,
        elapsed = ?start.elapsed(),
        "ping-pong finished"
    );
    Ok(())
}
