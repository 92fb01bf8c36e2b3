//! Progress ticks for long-running loops.

/// Callback receiving `(completed, total)` whenever a progress line is due.
pub type ProgressFn<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

/// Counts completed units and says when a progress line is due.
#[derive(Debug, Clone)]
pub struct ProgressTicker {
    total: usize,
    step: usize,
    completed: usize,
}

impl ProgressTicker {
    /// Tick every `step` units and on the last one.
    #[must_use]
    pub fn every(step: usize, total: usize) -> Self {
        Self {
            total,
            step: step.max(1),
            completed: 0,
        }
    }

    /// Tick at every tenth of `total`.
    #[must_use]
    pub fn tenths(total: usize) -> Self {
        Self::every(total / 10, total)
    }

    /// Record one completed unit. Returns the completed count when a line
    /// is due.
    pub fn advance(&mut self) -> Option<usize> {
        self.completed += 1;
        (self.completed % self.step == 0 || self.completed == self.total).then_some(self.completed)
    }

    #[must_use]
    pub const fn completed(&self) -> usize {
        self.completed
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks(mut ticker: ProgressTicker, units: usize) -> Vec<usize> {
        (0..units).filter_map(|_| ticker.advance()).collect()
    }

    #[test]
    fn test_tenths_of_large_total() {
        assert_eq!(
            ticks(ProgressTicker::tenths(100), 100),
            vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]
        );
    }

    #[test]
    fn test_uneven_total_always_ends_on_last() {
        let seen = ticks(ProgressTicker::tenths(25), 25);
        assert_eq!(seen.first(), Some(&2));
        assert_eq!(seen.last(), Some(&25));
        assert_eq!(seen.len(), 13);
    }

    #[test]
    fn test_small_total_ticks_every_unit() {
        assert_eq!(ticks(ProgressTicker::tenths(3), 3), vec![1, 2, 3]);
    }

    #[test]
    fn test_fixed_step() {
        let mut ticker = ProgressTicker::every(500, 1200);
        let seen: Vec<usize> = (0..1200).filter_map(|_| ticker.advance()).collect();
        assert_eq!(seen, vec![500, 1000, 1200]);
        assert_eq!(ticker.completed(), ticker.total());
    }
}
