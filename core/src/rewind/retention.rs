//! History retention policy
//!
//! The newest `uncompressed` entries are kept at full density. Older entries
//! thin out so that their spacing grows geometrically by `factor` per entry,
//! which lets a buffer of `size` entries reach `horizon` frames into the past.
//! `factor` is solved from
//!
//! ```text
//! horizon = interval * (uncompressed + factor^1 + factor^2 + ... + factor^(size - uncompressed))
//! ```
//!
//! When the buffer is full, the entry in the thinned region whose neighbours
//! are closest together relative to the expected spacing is evicted. If no
//! entry is dense enough to qualify, the oldest entry goes instead.

/// Eviction only happens when the gap is this much denser than expected
const MAX_ERROR: f64 = 1.5;

/// Upper bound for the bisection; horizons beyond it are unreachable
const MAX_FACTOR: f64 = 1e8;

const BISECTION_STEPS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct RetentionPolicy {
    size: usize,
    uncompressed: usize,
    interval: u32,
    factor: f64,
}

impl RetentionPolicy {
    pub fn new(size: usize, uncompressed: usize, interval: u32, horizon: u64) -> Self {
        let size = size.max(1);
        let uncompressed = uncompressed.min(size);
        let interval = interval.max(1);
        let factor = solve_factor(size, uncompressed, interval, horizon);
        Self {
            size,
            uncompressed,
            interval,
            factor,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn uncompressed(&self) -> usize {
        self.uncompressed
    }

    /// Growth of the expected spacing per entry in the thinned region
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Every entry is kept at full density; eviction is first-in first-out
    pub fn is_fifo(&self) -> bool {
        self.uncompressed >= self.size
    }

    /// Rank of the entry to evict from a full history
    ///
    /// `frames` holds the capture frame of every entry in rank order, oldest
    /// first. The newest entry and the newest `uncompressed` entries are never
    /// chosen unless the policy is FIFO.
    pub fn select_victim(&self, frames: &[u64]) -> usize {
        let len = frames.len();
        if self.is_fifo() || len < 3 || len <= self.uncompressed {
            return 0;
        }

        let thinned_end = len - self.uncompressed;
        let mut expected = f64::from(self.interval) * self.factor * (1.0 + self.factor);
        let mut max_error = MAX_ERROR;
        let mut victim = 0;

        // Walk from newest to oldest so the expected spacing grows with age
        for rank in (1..len - 1).rev() {
            if rank >= thinned_end {
                continue;
            }
            expected *= self.factor;
            let gap = frames[rank + 1].saturating_sub(frames[rank - 1]);
            let error = if gap == 0 {
                f64::INFINITY
            } else {
                expected / gap as f64
            };
            if error > max_error {
                max_error = error;
                victim = rank;
            }
        }

        victim
    }
}

fn solve_factor(size: usize, uncompressed: usize, interval: u32, horizon: u64) -> f64 {
    let thinned = size - uncompressed;
    if thinned == 0 {
        return 1.0;
    }

    // Entries' worth of spacing the thinned region must cover
    let target = horizon as f64 / f64::from(interval) - uncompressed as f64;
    if target <= thinned as f64 {
        return 1.0;
    }

    let span = |factor: f64| -> f64 {
        let mut sum = 0.0;
        let mut term = 1.0;
        for _ in 0..thinned {
            term *= factor;
            sum += term;
            if sum > target {
                break;
            }
        }
        sum
    };

    let (mut low, mut high) = (1.0, MAX_FACTOR);
    for _ in 0..BISECTION_STEPS {
        let mid = (low + high) / 2.0;
        if span(mid) > target {
            high = mid;
        } else {
            low = mid;
        }
    }
    (low + high) / 2.0
}
