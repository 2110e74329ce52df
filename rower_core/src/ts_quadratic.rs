//! Theil–Sen quadratic regression over a rolling window.

use std::collections::VecDeque;

use crate::series::Series;
use crate::types::Precision;

/// Robust quadratic fit y = a·x² + b·x + c.
///
/// The leading coefficient is the median of the three-point determinant
/// solutions over every triple in the window; b and c come from a
/// Theil–Sen linear pass over the residuals after removing a·x². Triples
/// are bucketed by their earliest point so window eviction drops exactly
/// the affected combinations.
#[derive(Debug, Clone)]
pub struct TSQuadraticSeries {
    max_length: usize,
    series_x: Series,
    series_y: Series,
    a_buckets: VecDeque<Vec<Precision>>,
    a: Precision,
    b: Precision,
    c: Precision,
}

impl TSQuadraticSeries {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            series_x: Series::new(max_length),
            series_y: Series::new(max_length),
            a_buckets: VecDeque::with_capacity(max_length.max(1)),
            a: 0.0,
            b: 0.0,
            c: 0.0,
        }
    }

    pub fn push(&mut self, x: Precision, y: Precision) {
        let evict = self.max_length > 0 && self.series_x.len() == self.max_length;
        if evict {
            self.a_buckets.pop_front();
        }
        let start = usize::from(evict);
        let len = self.series_x.len();
        // Every pair of surviving points forms a triple with the incoming
        // point; file the solution under the pair's earliest index.
        for i in start..len {
            for j in (i + 1)..len {
                if let Some(a) = three_point_a(
                    self.series_x[i],
                    self.series_y[i],
                    self.series_x[j],
                    self.series_y[j],
                    x,
                    y,
                ) {
                    if let Some(bucket) = self.a_buckets.get_mut(i - start) {
                        bucket.push(a);
                    }
                }
            }
        }
        self.a_buckets.push_back(Vec::new());
        self.series_x.push(x);
        self.series_y.push(y);
        self.recalculate();
    }

    fn recalculate(&mut self) {
        if self.series_x.len() < 3 {
            self.a = 0.0;
            self.b = 0.0;
            self.c = 0.0;
            return;
        }
        let mut a_values: Vec<Precision> = self
            .a_buckets
            .iter()
            .flat_map(|bucket| bucket.iter().copied())
            .collect();
        if a_values.is_empty() {
            self.a = 0.0;
            self.b = 0.0;
            self.c = 0.0;
            return;
        }
        a_values.sort_unstable_by(|x, y| x.total_cmp(y));
        self.a = median_of_sorted(&a_values);

        // Theil–Sen linear pass on the residuals r = y − a·x².
        let n = self.series_x.len();
        let mut slopes = Vec::with_capacity(n * (n - 1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = self.series_x[j] - self.series_x[i];
                if dx != 0.0 {
                    let ri = self.series_y[i] - self.a * self.series_x[i] * self.series_x[i];
                    let rj = self.series_y[j] - self.a * self.series_x[j] * self.series_x[j];
                    slopes.push((rj - ri) / dx);
                }
            }
        }
        if slopes.is_empty() {
            self.b = 0.0;
            self.c = 0.0;
            return;
        }
        slopes.sort_unstable_by(|x, y| x.total_cmp(y));
        self.b = median_of_sorted(&slopes);

        let mut intercepts = Vec::with_capacity(n);
        for i in 0..n {
            let r = self.series_y[i] - self.a * self.series_x[i] * self.series_x[i];
            intercepts.push(r - self.b * self.series_x[i]);
        }
        intercepts.sort_unstable_by(|x, y| x.total_cmp(y));
        self.c = median_of_sorted(&intercepts);
    }

    /// dy/dx evaluated at the stored sample `position`.
    pub fn first_derivative_at_position(&self, position: usize) -> Precision {
        if self.series_x.len() > 2 && position < self.series_x.len() {
            2.0 * self.a * self.series_x[position] + self.b
        } else {
            0.0
        }
    }

    /// d²y/dx², constant across the window.
    pub fn second_derivative_at_position(&self, position: usize) -> Precision {
        if self.series_x.len() > 2 && position < self.series_x.len() {
            2.0 * self.a
        } else {
            0.0
        }
    }

    /// R² of the fitted parabola against the windowed samples.
    pub fn goodness_of_fit(&self) -> Precision {
        let n = self.series_x.len();
        if n < 3 {
            return 0.0;
        }
        let mean_y = self.series_y.sum() / n as Precision;
        let mut ss_tot = 0.0;
        let mut ss_res = 0.0;
        for i in 0..n {
            let x = self.series_x[i];
            let y = self.series_y[i];
            let fitted = self.a * x * x + self.b * x + self.c;
            ss_tot += (y - mean_y) * (y - mean_y);
            ss_res += (y - fitted) * (y - fitted);
        }
        if ss_tot <= 0.0 {
            return 0.0;
        }
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    }

    pub fn len(&self) -> usize {
        self.series_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series_x.is_empty()
    }

    pub fn x_at_series_end(&self) -> Precision {
        self.series_x.back()
    }

    pub fn reset(&mut self) {
        self.series_x.reset();
        self.series_y.reset();
        self.a_buckets.clear();
        self.a = 0.0;
        self.b = 0.0;
        self.c = 0.0;
    }
}

/// Leading coefficient of the parabola through three distinct points.
fn three_point_a(
    x1: Precision,
    y1: Precision,
    x2: Precision,
    y2: Precision,
    x3: Precision,
    y3: Precision,
) -> Option<Precision> {
    let denominator = (x1 - x2) * (x1 - x3) * (x2 - x3);
    if denominator == 0.0 {
        return None;
    }
    Some((x3 * (y2 - y1) + x2 * (y1 - y3) + x1 * (y3 - y2)) / denominator)
}

fn median_of_sorted(values: &[Precision]) -> Precision {
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}
