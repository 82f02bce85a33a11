use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Wall-clock budget of one analysis request.
///
/// Created once when the request starts; every attempt derives its own
/// allowance from the single deadline, so the total latency stays bounded no
/// matter how many candidates are configured.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    deadline: Instant,
    min_attempt: Duration,
}

impl Budget {
    pub fn new(total: Duration, min_attempt: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + total,
            min_attempt,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_spent(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Time granted to the next attempt.
    ///
    /// The remaining budget is split evenly over the candidates still to be
    /// tried. The first attempt of a request always runs and gets at least
    /// the floor; later attempts get `None` once the budget is spent.
    pub fn allowance(&self, remaining_candidates: usize, attempts_made: usize) -> Option<Duration> {
        if remaining_candidates == 0 {
            return None;
        }

        let share = u32::try_from(remaining_candidates).unwrap_or(u32::MAX);
        let even = self.remaining() / share;

        if attempts_made == 0 {
            Some(even.max(self.min_attempt))
        } else if even.is_zero() {
            None
        } else {
            Some(even)
        }
    }
}

/// Returned when an attempt is cancelled because its allowance ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptElapsed {
    pub after: Duration,
}

/// Drive `attempt` for at most `allowance`.
///
/// On expiry the future is dropped in place, which aborts any in-flight
/// request it owns.
pub async fn run_bounded<F>(allowance: Duration, attempt: F) -> Result<F::Output, AttemptElapsed>
where
    F: Future,
{
    tokio::time::timeout(allowance, attempt)
        .await
        .map_err(|_| AttemptElapsed { after: allowance })
}
