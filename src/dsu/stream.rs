//! # Streaming Scheduler
//!
//! Pushes one data packet per connected slot to every registered client at a
//! fixed rate (250Hz by default, 4ms period).
//!
//! Sends never wait: a datagram the socket cannot take right now is dropped
//! and the next tick carries fresher state anyway.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use super::server::{timestamp_us, ServerContext};
use super::socket::DatagramSink;
use crate::controller::state::slot_mac;

/// Default streaming rate in Hz
pub const DEFAULT_STREAM_RATE_HZ: u32 = 250;

/// Number of ticks between status log messages (~4 seconds at 250Hz)
pub const LOG_INTERVAL_TICKS: u64 = 1000;

/// Counters returned by one streaming tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Data packets built (one counter increment each)
    pub built: usize,
    /// Datagrams handed to the socket
    pub sent: usize,
    /// Datagrams dropped by the socket
    pub dropped: usize,
}

/// Run one streaming step.
///
/// Expired clients are pruned first. A slot with no destination is skipped
/// without touching its counter.
pub fn stream_tick(ctx: &ServerContext, sink: &dyn DatagramSink) -> TickStats {
    let mut stats = TickStats::default();

    for addr in ctx.clients().prune_expired(Instant::now()) {
        info!("DSU client {} timed out", addr);
    }
    if ctx.clients().is_empty() {
        return stats;
    }

    let timestamp = timestamp_us();
    for slot in ctx.store().connected_slots() {
        let destinations = ctx.clients().destinations(slot, &slot_mac(slot));
        if destinations.is_empty() {
            continue;
        }

        let Some(packet) = ctx.store().next_data_packet(slot, ctx.server_id(), timestamp) else {
            continue;
        };
        stats.built += 1;

        for addr in destinations {
            match sink.try_send_to(&packet, addr) {
                Ok(_) => stats.sent += 1,
                Err(_) => stats.dropped += 1,
            }
        }
    }

    stats
}

/// Tick period for a rate, never shorter than 1µs
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use vr_dsu_bridge::dsu::stream::stream_period;
///
/// assert_eq!(stream_period(250), Duration::from_millis(4));
/// assert_eq!(stream_period(0), Duration::from_secs(1));
/// ```
pub fn stream_period(rate_hz: u32) -> Duration {
    let micros = 1_000_000 / u64::from(rate_hz.max(1));
    Duration::from_micros(micros.max(1))
}

/// Stream controller data until the task is cancelled.
///
/// # Arguments
///
/// * `ctx` - Shared server context
/// * `sink` - Socket used for sending (the bound DSU socket)
/// * `rate_hz` - Ticks per second, see [`stream_period`]
pub async fn run_stream_loop(ctx: ServerContext, sink: Arc<dyn DatagramSink>, rate_hz: u32) {
    let mut ticker = interval(stream_period(rate_hz));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Streaming controller data at {}Hz", rate_hz);

    let mut tick_count: u64 = 0;
    let mut totals = TickStats::default();

    loop {
        ticker.tick().await;

        let stats = stream_tick(&ctx, sink.as_ref());
        totals.built += stats.built;
        totals.sent += stats.sent;
        totals.dropped += stats.dropped;
        tick_count += 1;

        if tick_count % LOG_INTERVAL_TICKS == 0 {
            debug!(
                "Stream status: {} ticks, {} packets sent, {} dropped",
                tick_count, totals.sent, totals.dropped
            );
        }
    }
}
