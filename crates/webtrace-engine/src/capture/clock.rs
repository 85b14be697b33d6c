/// Reconciles the source's two time bases.
///
/// Request-sent events carry a wall-clock time (seconds since epoch);
/// every event carries a monotonic time (seconds since an arbitrary
/// origin). The offset between the two is captured from the first
/// request-sent observed and reused for the rest of the session. The
/// correlator only consumes deltas inside a two-second window, so a
/// single synchronization point is sufficient for a stable clock.
#[derive(Debug, Default)]
pub struct TimeBase {
    offset_secs: Option<f64>,
}

impl TimeBase {
    pub fn new() -> Self {
        Self { offset_secs: None }
    }

    /// Record the wall/monotonic pair from a request-sent event.
    /// Only the first observation sets the offset.
    pub fn observe(&mut self, wall_secs: f64, monotonic_secs: f64) {
        if self.offset_secs.is_none() {
            self.offset_secs = Some(wall_secs - monotonic_secs);
        }
    }

    /// Project a monotonic timestamp to wall-clock milliseconds.
    ///
    /// Returns `None` until the offset is known; a raw monotonic value
    /// must never be treated as wall-clock.
    pub fn project_ms(&self, monotonic_secs: f64) -> Option<f64> {
        self.offset_secs
            .map(|offset| (monotonic_secs + offset) * 1000.0)
    }

    pub fn is_synchronized(&self) -> bool {
        self.offset_secs.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_nothing_before_first_observation() {
        let clock = TimeBase::new();
        assert_eq!(clock.project_ms(42.0), None);
        assert!(!clock.is_synchronized());
    }

    #[test]
    fn first_observation_wins() {
        let mut clock = TimeBase::new();
        clock.observe(1_700_000_000.0, 5_000.0);
        clock.observe(1_800_000_000.0, 5_000.0);

        // offset = wall - monotonic from the first pair only
        assert_eq!(clock.project_ms(5_000.5), Some(1_700_000_000_500.0));
    }

    #[test]
    fn projection_formula_is_wall_millis() {
        let mut clock = TimeBase::new();
        clock.observe(100.0, 10.0);
        assert_eq!(clock.project_ms(10.0), Some(100_000.0));
        assert_eq!(clock.project_ms(11.25), Some(101_250.0));
    }
}
