//! Scalar knot curves used for swing parameter profiles and torso height
//! profiles.

use serde::{Deserialize, Serialize};
use strider_core::ConfigError;

/// Piecewise-linear curve through `(x, y)` knots, clamped outside the knot
/// range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnotCurve {
    knots: Vec<[f64; 2]>,
}

impl KnotCurve {
    pub fn new(knots: Vec<[f64; 2]>) -> Self {
        Self { knots }
    }

    /// `y = x` on [0, 1].
    pub fn identity() -> Self {
        Self::new(vec![[0.0, 0.0], [1.0, 1.0]])
    }

    pub fn knots(&self) -> &[[f64; 2]] {
        &self.knots
    }

    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.knots.is_empty() {
            return Err(ConfigError::invalid(field, "at least one knot required"));
        }
        if self.knots.windows(2).any(|w| w[1][0] <= w[0][0]) {
            return Err(ConfigError::invalid(field, "knot x must be strictly increasing"));
        }
        Ok(())
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let (Some(first), Some(last)) = (self.knots.first(), self.knots.last()) else {
            return 0.0;
        };
        if x <= first[0] {
            return first[1];
        }
        if x >= last[0] {
            return last[1];
        }
        let i = self.knots.partition_point(|k| k[0] <= x);
        let [x0, y0] = self.knots[i - 1];
        let [x1, y1] = self.knots[i];
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

impl Default for KnotCurve {
    fn default() -> Self {
        Self::identity()
    }
}

/// Periodic C1 curve on the unit phase circle.
///
/// Knots at phases in [0, 1) are joined by cubic Hermite segments with
/// Catmull-Rom tangents; the last knot connects back to the first across the
/// wrap. An empty curve evaluates to zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodicCurve {
    knots: Vec<[f64; 2]>,
}

impl PeriodicCurve {
    pub fn new(knots: Vec<[f64; 2]>) -> Self {
        Self { knots }
    }

    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.knots.iter().any(|k| !(0.0..1.0).contains(&k[0])) {
            return Err(ConfigError::invalid(field, "knot phases must lie in [0, 1)"));
        }
        if self.knots.windows(2).any(|w| w[1][0] <= w[0][0]) {
            return Err(ConfigError::invalid(
                field,
                "knot phases must be strictly increasing",
            ));
        }
        Ok(())
    }

    pub fn evaluate(&self, phase: f64) -> f64 {
        let n = self.knots.len();
        match n {
            0 => return 0.0,
            1 => return self.knots[0][1],
            _ => {}
        }
        let phase = phase.rem_euclid(1.0);

        // Segment i runs from knot i to knot i + 1 (wrapping).
        let upper = self.knots.partition_point(|k| k[0] <= phase);
        let i = (upper + n - 1) % n;
        let knot = |j: usize| self.knots[j % n];

        let x0 = knot(i)[0];
        let mut x1 = knot(i + 1)[0];
        if x1 <= x0 {
            x1 += 1.0;
        }
        let mut x = phase;
        if x < x0 {
            x += 1.0;
        }

        let tangent = |j: usize| {
            let prev = knot(j + n - 1);
            let next = knot(j + 1);
            let mut span = next[0] - prev[0];
            if span <= 0.0 {
                span += 1.0;
            }
            (next[1] - prev[1]) / span
        };

        let h = x1 - x0;
        let t = (x - x0) / h;
        let (t2, t3) = (t * t, t * t * t);
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        h00 * knot(i)[1] + h10 * h * tangent(i) + h01 * knot(i + 1)[1] + h11 * h * tangent(i + 1)
    }
}
