use serde::Serialize;
use std::time::{Duration, Instant};

/// Point-in-time view of a [`ProgressMeter`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub done: usize,
    pub total: usize,
    pub elapsed_seconds: f64,
    /// Linear extrapolation of the remaining time; `None` before the
    /// first unit completes.
    pub eta_seconds: Option<f64>,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            100.0 * self.done as f64 / self.total as f64
        }
    }
}

/// Counts completed units and logs progress with an ETA.
#[derive(Debug)]
pub struct ProgressMeter {
    label: &'static str,
    rank: usize,
    total: usize,
    done: usize,
    every: usize,
    started: Instant,
}

impl ProgressMeter {
    pub fn new(label: &'static str, rank: usize, total: usize, every: usize) -> Self {
        Self {
            label,
            rank,
            total,
            done: 0,
            every,
            started: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        snapshot_at(self.done, self.total, self.started.elapsed())
    }

    /// One more unit done; logs on every `every`-th unit and on the last.
    pub fn tick(&mut self) {
        self.done += 1;
        if self.every == 0 {
            return;
        }
        if self.done % self.every == 0 || self.done == self.total {
            let snap = self.snapshot();
            tracing::info!(
                rank = self.rank,
                phase = self.label,
                done = snap.done,
                total = snap.total,
                percent = format_args!("{:.1}", snap.percent()),
                elapsed_s = format_args!("{:.1}", snap.elapsed_seconds),
                eta_s = format_args!("{:.1}", snap.eta_seconds.unwrap_or(0.0)),
                "progress"
            );
        }
    }
}

fn snapshot_at(done: usize, total: usize, elapsed: Duration) -> ProgressSnapshot {
    let elapsed_seconds = elapsed.as_secs_f64();
    let eta_seconds = (done > 0).then(|| {
        let per_unit = elapsed_seconds / done as f64;
        per_unit * total.saturating_sub(done) as f64
    });
    ProgressSnapshot {
        done,
        total,
        elapsed_seconds,
        eta_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_extrapolates_linearly() {
        let snap = snapshot_at(25, 100, Duration::from_secs(10));
        assert_eq!(snap.eta_seconds, Some(30.0));
        assert_eq!(snap.percent(), 25.0);
        assert_eq!(snapshot_at(0, 100, Duration::from_secs(3)).eta_seconds, None);
        assert_eq!(snapshot_at(0, 0, Duration::ZERO).percent(), 100.0);
    }
}
