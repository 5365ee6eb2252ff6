//! Fixed-capacity rolling window with a running mean.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: VecDeque::with_capacity(capacity.max(1)),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.values.push_back(value);
        self.sum += value;
    }

    /// Mean of the values in the window, or `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / self.values.len() as f64)
        }
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_over_last_capacity_values() {
        let mut w = RollingWindow::new(3);
        assert_eq!(w.mean(), None);
        for v in [1.0, 2.0, 3.0, 10.0] {
            w.push(v);
        }
        assert!(w.is_full());
        assert!((w.mean().unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn clear_resets_sum() {
        let mut w = RollingWindow::new(2);
        w.push(4.0);
        w.clear();
        w.push(2.0);
        assert_eq!(w.mean(), Some(2.0));
    }
}
