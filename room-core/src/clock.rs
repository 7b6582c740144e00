//! Clock-offset estimation against a remote time authority.
//!
//! Each probe measures one round trip to the time authority and yields an
//! offset (remote clock minus local clock, ms). The last [`DEFAULT_MAX_SAMPLES`]
//! offsets are kept in a ring and averaged; the average is what
//! [`ClockState::server_time_ms`] adds to the local clock.
//!
//! Scheduling is a two-state machine:
//! - **Converging** (`probes <= converge_probes`): probe again immediately.
//! - **Steady** (`probes > converge_probes`): probe every `steady_interval`.
//!
//! The transition happens once and never reverses. Failed probes count as
//! completed attempts for scheduling but never touch the samples.

use std::time::Duration;

/// Ring capacity for offset samples.
pub const DEFAULT_MAX_SAMPLES: usize = 10;

/// Number of back-to-back probes before switching to the steady cadence.
pub const DEFAULT_CONVERGE_PROBES: u64 = 10;

/// Delay between probes once converged.
pub const DEFAULT_STEADY_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Resolution of the remote timestamp (HTTP `Date` is whole seconds).
pub const DEFAULT_PRECISION_MS: u64 = 1000;

/// Timestamps captured around one round trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeTiming {
    /// Local clock plus the current average offset, taken before sending (ms).
    pub local_send_ms: f64,
    /// Timestamp reported by the time authority (ms, truncated to `precision`).
    pub server_date_ms: i64,
    /// Local clock when the response arrived (ms).
    pub local_receive_ms: i64,
}

impl ProbeTiming {
    /// Offset estimate for this round trip.
    ///
    /// The remote timestamp is assumed to sit in the middle of its precision
    /// window, and half the round trip is attributed to the return leg.
    pub fn offset_ms(&self, precision_ms: u64) -> f64 {
        let server_received = self.server_date_ms as f64 + precision_ms as f64 / 2.0;
        let local_receive = self.local_receive_ms as f64;
        let server_time = server_received + (local_receive - self.local_send_ms) / 2.0;
        server_time - local_receive
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The probe produced an offset sample.
    Sampled {
        /// The offset that was recorded (ms).
        offset_ms: f64,
    },
    /// The probe failed; the previous average stays in effect.
    Failed {
        /// Why the probe failed.
        reason: String,
    },
}

/// Fixed-capacity ring of offset samples.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetSamples {
    samples: Vec<f64>,
    capacity: usize,
    count: u64,
}

impl OffsetSamples {
    /// Create an empty ring. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            count: 0,
        }
    }

    /// Record a sample.
    ///
    /// Fills the ring first, then overwrites strictly round-robin: the k-th
    /// sample overall lands in slot `(k - 1) % capacity`, replacing the oldest.
    pub fn push(&mut self, offset_ms: f64) {
        self.count += 1;
        if self.samples.len() < self.capacity {
            self.samples.push(offset_ms);
        } else {
            let slot = ((self.count - 1) % self.capacity as u64) as usize;
            self.samples[slot] = offset_ms;
        }
    }

    /// Arithmetic mean of the held samples (0 when empty).
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Samples currently held, in slot order.
    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total samples ever recorded.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Ring capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for OffsetSamples {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SAMPLES)
    }
}

/// Probe scheduling phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Probing back-to-back.
    Converging,
    /// Probing at the steady interval.
    Steady,
}

/// Offset estimator plus its scheduling policy. NO I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockState {
    samples: OffsetSamples,
    avg_offset_ms: f64,
    probes: u64,
    converge_probes: u64,
    steady_interval: Duration,
    precision_ms: u64,
}

impl ClockState {
    /// Estimator with the default policy (10 samples, 10 fast probes, 5 min).
    pub fn new() -> Self {
        Self::with_policy(
            DEFAULT_MAX_SAMPLES,
            DEFAULT_CONVERGE_PROBES,
            DEFAULT_STEADY_INTERVAL,
            DEFAULT_PRECISION_MS,
        )
    }

    /// Estimator with an explicit policy.
    pub fn with_policy(
        max_samples: usize,
        converge_probes: u64,
        steady_interval: Duration,
        precision_ms: u64,
    ) -> Self {
        Self {
            samples: OffsetSamples::new(max_samples),
            avg_offset_ms: 0.0,
            probes: 0,
            converge_probes,
            steady_interval,
            precision_ms,
        }
    }

    /// Send timestamp for the next probe: local clock shifted by the current
    /// average offset.
    pub fn send_timestamp(&self, local_now_ms: i64) -> f64 {
        local_now_ms as f64 + self.avg_offset_ms
    }

    /// Complete a successful probe. Returns the recorded offset.
    pub fn record_sample(&mut self, timing: ProbeTiming) -> f64 {
        let offset = timing.offset_ms(self.precision_ms);
        self.probes += 1;
        self.samples.push(offset);
        self.avg_offset_ms = self.samples.mean();
        offset
    }

    /// Complete a failed probe. Offsets are untouched; only scheduling advances.
    pub fn record_failure(&mut self) {
        self.probes += 1;
    }

    /// Current scheduling phase.
    pub fn phase(&self) -> SyncPhase {
        if self.probes <= self.converge_probes {
            SyncPhase::Converging
        } else {
            SyncPhase::Steady
        }
    }

    /// Delay before the next probe should start.
    pub fn next_delay(&self) -> Duration {
        match self.phase() {
            SyncPhase::Converging => Duration::ZERO,
            SyncPhase::Steady => self.steady_interval,
        }
    }

    /// Estimated remote time for a given local time.
    pub fn server_time_ms(&self, local_now_ms: i64) -> i64 {
        local_now_ms + self.avg_offset_ms.round() as i64
    }

    /// Current average offset (ms). Zero until the first sample.
    pub fn avg_offset_ms(&self) -> f64 {
        self.avg_offset_ms
    }

    /// Completed probe attempts (successful or not).
    pub fn probes(&self) -> u64 {
        self.probes
    }

    /// The sample ring.
    pub fn samples(&self) -> &OffsetSamples {
        &self.samples
    }
}

impl Default for ClockState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Timing whose offset is exactly `offset` under the default precision:
    /// zero round trip, remote date shifted back by half the precision.
    fn timing_for(offset: i64) -> ProbeTiming {
        let local = 1_000_000;
        ProbeTiming {
            local_send_ms: local as f64,
            server_date_ms: local + offset - (DEFAULT_PRECISION_MS as i64 / 2),
            local_receive_ms: local,
        }
    }

    // ===========================================
    // Offset Computation Tests
    // ===========================================

    #[test]
    fn offset_includes_half_precision() {
        let timing = ProbeTiming {
            local_send_ms: 10_000.0,
            server_date_ms: 10_000,
            local_receive_ms: 10_000,
        };
        assert_eq!(timing.offset_ms(1000), 500.0);
    }

    #[test]
    fn offset_corrects_for_half_round_trip() {
        // 200ms round trip, remote clock 3s ahead
        let timing = ProbeTiming {
            local_send_ms: 50_000.0,
            server_date_ms: 53_000,
            local_receive_ms: 50_200,
        };
        // server_received = 53_500, server_time = 53_600, offset = 3_400
        assert_eq!(timing.offset_ms(1000), 3_400.0);
    }

    #[test]
    fn offset_can_be_negative() {
        let timing = ProbeTiming {
            local_send_ms: 20_000.0,
            server_date_ms: 15_000,
            local_receive_ms: 20_000,
        };
        assert_eq!(timing.offset_ms(1000), -4_500.0);
    }

    // ===========================================
    // Sample Ring Tests
    // ===========================================

    #[test]
    fn mean_of_empty_ring_is_zero() {
        assert_eq!(OffsetSamples::default().mean(), 0.0);
    }

    #[test]
    fn ring_fills_before_overwriting() {
        let mut ring = OffsetSamples::new(10);
        for i in 1..=10 {
            ring.push(i as f64);
        }
        assert_eq!(ring.len(), 10);
        assert_eq!(ring.as_slice(), &[1., 2., 3., 4., 5., 6., 7., 8., 9., 10.]);
    }

    #[test]
    fn ring_overwrites_oldest_first() {
        let mut ring = OffsetSamples::new(10);
        for i in 1..=10 {
            ring.push(i as f64);
        }

        ring.push(11.0);
        assert_eq!(ring.as_slice()[0], 11.0, "11th sample must replace slot 0");

        ring.push(12.0);
        assert_eq!(ring.as_slice()[1], 12.0);
        assert_eq!(ring.len(), 10);
    }

    #[test]
    fn ring_wraps_every_capacity_samples() {
        let mut ring = OffsetSamples::new(10);
        for i in 1..=25 {
            ring.push(i as f64);
        }
        // Holds exactly the last 10 samples
        let mut held = ring.as_slice().to_vec();
        held.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(held, (16..=25).map(|i| i as f64).collect::<Vec<_>>());
        assert_eq!(ring.count(), 25);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut ring = OffsetSamples::new(0);
        ring.push(1.0);
        ring.push(2.0);
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.as_slice(), &[2.0]);
    }

    // ===========================================
    // Average Tests
    // ===========================================

    #[test]
    fn average_is_exact_mean_up_to_capacity() {
        let offsets: [i64; 10] = [120, -40, 33, 7, 900, -12, 0, 41, 5, 18];
        let mut clock = ClockState::new();

        for (n, &offset) in offsets.iter().enumerate() {
            let recorded = clock.record_sample(timing_for(offset));
            assert_eq!(recorded, offset as f64);

            let expected =
                offsets[..=n].iter().map(|&o| o as f64).sum::<f64>() / (n + 1) as f64;
            assert_eq!(clock.avg_offset_ms(), expected);
        }
    }

    #[test]
    fn record_sample_updates_average() {
        let mut clock = ClockState::new();
        clock.record_sample(timing_for(100));
        clock.record_sample(timing_for(300));

        assert_eq!(clock.avg_offset_ms(), 200.0);
        assert_eq!(clock.samples().len(), 2);
    }

    #[test]
    fn average_uses_last_ten_after_wraparound() {
        let mut clock = ClockState::new();
        for offset in 1..=15 {
            clock.record_sample(timing_for(offset * 10));
        }
        // Held: 60..=150 step 10
        let expected = (6..=15).map(|i| (i * 10) as f64).sum::<f64>() / 10.0;
        assert_eq!(clock.samples().len(), 10);
        assert_eq!(clock.avg_offset_ms(), expected);
    }

    #[test]
    fn failure_keeps_previous_average() {
        let mut clock = ClockState::new();
        clock.record_sample(timing_for(250));
        clock.record_failure();

        assert_eq!(clock.avg_offset_ms(), 250.0);
        assert_eq!(clock.samples().len(), 1);
        assert_eq!(clock.probes(), 2);
    }

    // ===========================================
    // Scheduling Tests
    // ===========================================

    #[test]
    fn starts_converging_with_no_delay() {
        let clock = ClockState::new();
        assert_eq!(clock.phase(), SyncPhase::Converging);
        assert_eq!(clock.next_delay(), Duration::ZERO);
    }

    #[test]
    fn switches_to_steady_after_converge_probes() {
        let mut clock = ClockState::new();
        for _ in 0..DEFAULT_CONVERGE_PROBES {
            clock.record_sample(timing_for(0));
        }
        assert_eq!(clock.phase(), SyncPhase::Converging);

        clock.record_sample(timing_for(0));
        assert_eq!(clock.phase(), SyncPhase::Steady);
        assert_eq!(clock.next_delay(), DEFAULT_STEADY_INTERVAL);
    }

    #[test]
    fn failures_advance_scheduling() {
        let mut clock = ClockState::new();
        for _ in 0..=DEFAULT_CONVERGE_PROBES {
            clock.record_failure();
        }
        assert_eq!(clock.phase(), SyncPhase::Steady);
        assert!(clock.samples().is_empty());
    }

    #[test]
    fn steady_never_returns_to_converging() {
        let mut clock = ClockState::with_policy(10, 2, Duration::from_secs(60), 1000);
        for _ in 0..3 {
            clock.record_sample(timing_for(0));
        }
        assert_eq!(clock.phase(), SyncPhase::Steady);

        for _ in 0..50 {
            clock.record_failure();
            assert_eq!(clock.phase(), SyncPhase::Steady);
        }
    }

    // ===========================================
    // Server Time Tests
    // ===========================================

    #[test]
    fn server_time_is_local_before_any_probe() {
        let clock = ClockState::new();
        assert_eq!(clock.server_time_ms(1_700_000_000_000), 1_700_000_000_000);
    }

    #[test]
    fn server_time_adds_average_offset() {
        let mut clock = ClockState::new();
        clock.record_sample(timing_for(1_500));
        assert_eq!(clock.server_time_ms(10_000), 11_500);
    }

    #[test]
    fn send_timestamp_is_shifted_by_average() {
        let mut clock = ClockState::new();
        clock.record_sample(timing_for(-200));
        assert_eq!(clock.send_timestamp(5_000), 4_800.0);
    }
}
