//! Theil–Sen linear regression over a rolling window.

use std::collections::VecDeque;

use crate::series::Series;
use crate::types::Precision;

/// Robust linear fit: the slope is the median of all pairwise slopes in
/// the window, which shrugs off single-impulse outliers that would drag
/// an OLS fit.
///
/// Pairwise slopes are maintained incrementally: each stored point owns a
/// bucket holding the slopes it forms with every later point, so evicting
/// the oldest point drops exactly its bucket.
#[derive(Debug, Clone)]
pub struct TSLinearSeries {
    max_length: usize,
    series_x: Series,
    series_y: Series,
    slope_buckets: VecDeque<Vec<Precision>>,
    coefficient_a: Precision,
}

impl TSLinearSeries {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            series_x: Series::new(max_length),
            series_y: Series::new(max_length),
            slope_buckets: VecDeque::with_capacity(max_length.max(1)),
            coefficient_a: 0.0,
        }
    }

    pub fn push(&mut self, x: Precision, y: Precision) {
        // The rolling series evicts its oldest point on push; drop that
        // point's slope bucket first and skip it below so indices align.
        let evict = self.max_length > 0 && self.series_x.len() == self.max_length;
        if evict {
            self.slope_buckets.pop_front();
        }
        let start = usize::from(evict);
        // Slopes between every surviving stored point and the incoming one.
        for i in start..self.series_x.len() {
            let dx = x - self.series_x[i];
            if dx != 0.0 {
                let slope = (y - self.series_y[i]) / dx;
                if let Some(bucket) = self.slope_buckets.get_mut(i - start) {
                    bucket.push(slope);
                }
            }
        }
        self.slope_buckets.push_back(Vec::new());
        self.series_x.push(x);
        self.series_y.push(y);
        self.coefficient_a = self.median();
    }

    /// Median of all pairwise slopes currently in the window.
    pub fn median(&self) -> Precision {
        let mut slopes: Vec<Precision> = self
            .slope_buckets
            .iter()
            .flat_map(|bucket| bucket.iter().copied())
            .collect();
        if slopes.is_empty() {
            return 0.0;
        }
        slopes.sort_unstable_by(|a, b| a.total_cmp(b));
        let mid = slopes.len() / 2;
        if slopes.len() % 2 == 1 {
            slopes[mid]
        } else {
            (slopes[mid - 1] + slopes[mid]) / 2.0
        }
    }

    /// Median pairwise slope, cached at the last push.
    pub fn coefficient_a(&self) -> Precision {
        self.coefficient_a
    }

    /// Median intercept corresponding to the median slope.
    pub fn coefficient_b(&self) -> Precision {
        if self.series_x.len() < 2 {
            return 0.0;
        }
        let mut intercepts = Series::new(self.series_x.len());
        for i in 0..self.series_x.len() {
            intercepts.push(self.series_y[i] - self.coefficient_a * self.series_x[i]);
        }
        intercepts.median()
    }

    pub fn len(&self) -> usize {
        self.series_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series_x.is_empty()
    }

    pub fn x_at_series_begin(&self) -> Precision {
        self.series_x.front()
    }

    pub fn y_at_series_begin(&self) -> Precision {
        self.series_y.front()
    }

    pub fn x_at_series_end(&self) -> Precision {
        self.series_x.back()
    }

    pub fn reset(&mut self) {
        self.series_x.reset();
        self.series_y.reset();
        self.slope_buckets.clear();
        self.coefficient_a = 0.0;
    }
}
