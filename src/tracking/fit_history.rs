// src/tracking/fit_history.rs

use std::collections::VecDeque;

use crate::types::LaneFit;

/// Bounded FIFO of past fits for one lane side. Only the running mean of
/// each coefficient is ever read back.
#[derive(Debug, Clone)]
pub struct FitHistory {
    fits: VecDeque<LaneFit>,
    capacity: usize,
}

impl FitHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            fits: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a fit, dropping the oldest once full.
    pub fn push(&mut self, fit: LaneFit) {
        self.fits.push_back(fit);
        if self.fits.len() > self.capacity {
            self.fits.pop_front();
        }
    }

    /// Per-coefficient arithmetic mean over the retained fits.
    pub fn mean(&self) -> Option<LaneFit> {
        if self.fits.is_empty() {
            return None;
        }
        let n = self.fits.len() as f64;
        let (a, b, c) = self
            .fits
            .iter()
            .fold((0.0, 0.0, 0.0), |(a, b, c), f| (a + f.a, b + f.b, c + f.c));
        Some(LaneFit::new(a / n, b / n, c / n))
    }

    pub fn len(&self) -> usize {
        self.fits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LaneFit> {
        self.fits.iter()
    }

    pub fn clear(&mut self) {
        self.fits.clear();
    }
}
