//! Probe a time authority.

use anyhow::{Context, Result};
use room_client::{local_now_ms, ClockSynchronizer, HttpTimeSource, TimeSource};
use room_core::ProbeOutcome;
use std::sync::Arc;
use std::time::Duration;

/// Run the clock command.
pub async fn run(endpoint: &str, probes: u32, timeout: Duration) -> Result<()> {
    if probes == 0 {
        anyhow::bail!("--probes must be at least 1");
    }

    let source = HttpTimeSource::with_timeout(endpoint, timeout)
        .context("Failed to build HTTP client")?;
    let clock = ClockSynchronizer::new(Arc::new(source));

    println!("Probing {} ({} probes)...", endpoint, probes);
    let sampled = probe_and_report(&clock, probes).await;

    if sampled == 0 {
        anyhow::bail!("No probe against {} succeeded", endpoint);
    }

    println!();
    println!("Samples:     {}", clock.snapshot().samples().len());
    println!("Avg offset:  {:+.1} ms", clock.avg_offset_ms());
    println!("Local time:  {}", local_now_ms());
    println!("Server time: {}", clock.server_time());
    Ok(())
}

/// Probe `probes` times, printing each outcome. Returns the number sampled.
async fn probe_and_report<S: TimeSource + 'static>(clock: &ClockSynchronizer<S>, probes: u32) -> u32 {
    let mut sampled = 0;
    for i in 1..=probes {
        match clock.probe().await {
            ProbeOutcome::Sampled { offset_ms } => {
                sampled += 1;
                println!("  [{:>2}] offset {:+.1} ms", i, offset_ms);
            }
            ProbeOutcome::Failed { reason } => {
                println!("  [{:>2}] failed: {}", i, reason);
            }
        }
    }
    sampled
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_client::MockTimeSource;

    #[tokio::test]
    async fn zero_probes_rejected() {
        let err = run("http://127.0.0.1:9/", 0, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails() {
        // Nothing listens on the discard port
        let err = run("http://127.0.0.1:9/", 2, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No probe"));
    }

    #[tokio::test]
    async fn counts_sampled_probes() {
        let clock = ClockSynchronizer::new(Arc::new(MockTimeSource::with_offset(2_000)));

        assert_eq!(probe_and_report(&clock, 3).await, 3);
        assert_eq!(clock.snapshot().samples().len(), 3);
        assert!((clock.avg_offset_ms() - 2_000.0).abs() < 100.0);
    }

    #[tokio::test]
    async fn failed_probes_are_not_counted() {
        let clock = ClockSynchronizer::new(Arc::new(MockTimeSource::scripted(vec![
            Err("refused".into()),
            Ok(0),
        ])));

        assert_eq!(probe_and_report(&clock, 2).await, 1);
    }
}
