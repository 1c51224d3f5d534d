//! Progress notification throttle.

use std::time::Duration;

/// Lets at most one progress update through per interval.
///
/// Driven by caller-supplied timestamps so tests can use a manual clock.
/// Terminal (finish) updates bypass the throttle entirely.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval_ms: i64,
    last_emit_ms: Option<i64>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: i64::try_from(interval.as_millis()).unwrap_or(i64::MAX),
            last_emit_ms: None,
        }
    }

    /// Returns `true` and records `now_ms` if an update may be emitted.
    pub fn should_emit(&mut self, now_ms: i64) -> bool {
        let due = match self.last_emit_ms {
            None => true,
            // A clock that jumped backwards restarts the window
            Some(last) if now_ms < last => true,
            Some(last) => now_ms - last >= self.interval_ms,
        };

        if due {
            self.last_emit_ms = Some(now_ms);
        }
        due
    }

    /// Forget the last emission, so the next update goes through.
    pub fn reset(&mut self) {
        self.last_emit_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_passes_then_window_applies() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(100));
        assert!(throttle.should_emit(1_000));
        assert!(!throttle.should_emit(1_050));
        assert!(!throttle.should_emit(1_099));
        assert!(throttle.should_emit(1_100));
        assert!(!throttle.should_emit(1_150));
    }

    #[test]
    fn reset_and_backwards_clock() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(100));
        assert!(throttle.should_emit(5_000));
        throttle.reset();
        assert!(throttle.should_emit(5_010));
        assert!(throttle.should_emit(4_000));
    }
}
