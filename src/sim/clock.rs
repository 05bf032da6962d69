use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior, interval};

/// A simulation clock that hands out tick indices up to a fixed total.
///
/// In simulated mode ticks are handed out immediately. In realtime mode each
/// tick waits on a tokio interval; a late tick delays the following ones
/// instead of bursting to catch up.
///
/// # Examples
///
/// ```
/// use microgrid_sim::sim::clock::Clock;
///
/// # tokio_test();
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn tokio_test() {
/// let mut clock = Clock::simulated(3);
/// let mut steps = Vec::new();
/// while let Some(step) = clock.tick().await {
///     steps.push(step);
/// }
/// assert_eq!(steps, vec![0, 1, 2]);
/// # }
/// ```
#[derive(Debug)]
pub struct Clock {
    /// Current step of the simulation
    current: usize,
    /// Total steps to run in the simulation
    total: usize,
    pacer: Option<Interval>,
}

impl Clock {
    /// Creates a clock that never waits.
    pub fn simulated(total: usize) -> Self {
        Self {
            current: 0,
            total,
            pacer: None,
        }
    }

    /// Creates a clock that hands out one tick per `period`.
    ///
    /// The first tick completes immediately. Must be called inside a tokio runtime.
    pub fn realtime(total: usize, period: Duration) -> Self {
        let mut pacer = interval(period);
        pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            current: 0,
            total,
            pacer: Some(pacer),
        }
    }

    /// Waits for the next tick.
    ///
    /// # Returns
    ///
    /// * `Some(step)` - The step number (starting from 0)
    /// * `None` - If the clock has reached its total steps
    pub async fn tick(&mut self) -> Option<usize> {
        if self.current >= self.total {
            return None;
        }
        if let Some(pacer) = self.pacer.as_mut() {
            pacer.tick().await;
        }
        let step = self.current;
        self.current += 1;
        Some(step)
    }

    /// Steps handed out so far.
    pub fn elapsed_steps(&self) -> usize {
        self.current
    }

    pub fn is_realtime(&self) -> bool {
        self.pacer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn simulated_clock_counts_to_total() {
        let mut clock = Clock::simulated(2);
        assert_eq!(clock.tick().await, Some(0));
        assert_eq!(clock.tick().await, Some(1));
        assert_eq!(clock.tick().await, None);
        assert_eq!(clock.elapsed_steps(), 2);
        assert!(!clock.is_realtime());
    }

    #[tokio::test]
    async fn empty_clock_never_ticks() {
        let mut clock = Clock::simulated(0);
        assert_eq!(clock.tick().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn realtime_clock_paces_ticks() {
        let start = Instant::now();
        let mut clock = Clock::realtime(3, Duration::from_secs(15));
        assert!(clock.is_realtime());
        while clock.tick().await.is_some() {}
        // first tick is immediate, the other two wait one period each
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }
}
