//! Mock time source for testing.

use super::{local_now_ms, ClockError, TimeSource};
use crate::lock;
use async_trait::async_trait;
use room_core::DEFAULT_PRECISION_MS;
use std::collections::VecDeque;
use std::sync::Mutex;

/// In-memory [`TimeSource`] with scripted answers.
#[derive(Debug)]
pub struct MockTimeSource {
    inner: Mutex<MockTimeSourceInner>,
}

#[derive(Debug)]
struct MockTimeSourceInner {
    mode: Mode,
    fail_next: Option<String>,
    calls: usize,
}

#[derive(Debug)]
enum Mode {
    /// Remote clock runs `offset` ms ahead of the local one.
    Offset(i64),
    /// Every probe fails.
    Failing(String),
    /// Answers are popped in order; an empty script fails.
    Scripted(VecDeque<Result<i64, String>>),
}

impl MockTimeSource {
    fn with_mode(mode: Mode) -> Self {
        Self {
            inner: Mutex::new(MockTimeSourceInner {
                mode,
                fail_next: None,
                calls: 0,
            }),
        }
    }

    /// A remote clock `offset_ms` ahead of the local clock.
    ///
    /// Reported dates are shifted back by half the default precision so that a
    /// zero-latency probe measures exactly `offset_ms`.
    pub fn with_offset(offset_ms: i64) -> Self {
        Self::with_mode(Mode::Offset(offset_ms))
    }

    /// A time source that always fails with `reason`.
    pub fn failing(reason: &str) -> Self {
        Self::with_mode(Mode::Failing(reason.to_string()))
    }

    /// A time source that answers from `script` in order.
    pub fn scripted(script: Vec<Result<i64, String>>) -> Self {
        Self::with_mode(Mode::Scripted(script.into()))
    }

    /// Cause the next query to fail with the given error.
    pub fn fail_next(&self, reason: &str) {
        lock(&self.inner).fail_next = Some(reason.to_string());
    }

    /// Number of queries answered so far.
    pub fn calls(&self) -> usize {
        lock(&self.inner).calls
    }
}

#[async_trait]
impl TimeSource for MockTimeSource {
    async fn server_date_ms(&self) -> Result<i64, ClockError> {
        let mut inner = lock(&self.inner);
        inner.calls += 1;

        if let Some(reason) = inner.fail_next.take() {
            return Err(ClockError::Unavailable(reason));
        }

        match &mut inner.mode {
            Mode::Offset(offset) => {
                Ok(local_now_ms() + *offset - DEFAULT_PRECISION_MS as i64 / 2)
            }
            Mode::Failing(reason) => Err(ClockError::Unavailable(reason.clone())),
            Mode::Scripted(script) => match script.pop_front() {
                Some(answer) => answer.map_err(ClockError::Unavailable),
                None => Err(ClockError::Unavailable("script exhausted".into())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offset_source_tracks_local_clock() {
        let source = MockTimeSource::with_offset(1_000);
        let date = source.server_date_ms().await.unwrap();
        let expected = local_now_ms() + 500;
        assert!((date - expected).abs() < 50);
    }

    #[tokio::test]
    async fn failing_source_always_fails() {
        let source = MockTimeSource::failing("offline");
        for _ in 0..3 {
            assert!(matches!(
                source.server_date_ms().await,
                Err(ClockError::Unavailable(reason)) if reason == "offline"
            ));
        }
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn script_is_consumed_in_order() {
        let source = MockTimeSource::scripted(vec![Ok(7), Err("blip".into()), Ok(9)]);

        assert_eq!(source.server_date_ms().await.unwrap(), 7);
        assert!(source.server_date_ms().await.is_err());
        assert_eq!(source.server_date_ms().await.unwrap(), 9);
        assert!(matches!(
            source.server_date_ms().await,
            Err(ClockError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn fail_next_is_one_shot() {
        let source = MockTimeSource::with_offset(0);
        source.fail_next("timeout");

        assert!(source.server_date_ms().await.is_err());
        assert!(source.server_date_ms().await.is_ok());
    }
}
