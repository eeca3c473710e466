//! Per-sample diagnostics emitted by the daemon as JSON lines.

use hubclock_common::metrics::CalibrationStats;
use hubclock_common::state::CalibrationState;
use hubclock_sync::{RealtimeClock, TickSource, TimeSync, WallClock};
use serde::Serialize;

/// One observation of the synchronizer.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Sample number, starting at 1.
    pub sequence: u64,
    /// Raw counter value.
    pub ticks: u64,
    /// Counter frequency in Hz.
    pub frequency_hz: u64,
    /// Tick-domain time of the sample.
    pub tick_domain_ns: u64,
    /// Wall time derived from the counter.
    pub wall_ns: i64,
    /// Offset applied to derive `wall_ns`.
    pub offset_ns: i64,
    /// `CLOCK_REALTIME` read right after the sample.
    pub realtime_ns: Option<i64>,
    /// `realtime_ns - wall_ns`.
    pub skew_ns: Option<i64>,
    /// Calibration state when the sample was taken.
    pub state: CalibrationState,
    /// Calibration statistics so far.
    pub stats: CalibrationStats,
}

impl SyncReport {
    /// Sample `sync` once.
    pub fn sample<T: TickSource, C: WallClock>(sync: &TimeSync<T, C>, sequence: u64) -> Self {
        let wall_ns = sync.now_wall_ns();
        let realtime_ns = RealtimeClock::new().now_ns();
        let ticks = sync.ticks();

        Self {
            sequence,
            ticks,
            frequency_hz: sync.frequency_hz(),
            tick_domain_ns: sync.converter().ticks_to_ns(ticks),
            wall_ns,
            offset_ns: sync.current_offset_ns(),
            realtime_ns,
            skew_ns: realtime_ns.map(|rt| rt.saturating_sub(wall_ns)),
            state: sync.state(),
            stats: sync.stats(),
        }
    }

    /// Render as a single JSON line.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
