//! Cubic Hermite interpolation between two samples with derivatives.

use std::ops::{Add, Mul, Sub};

use crate::time::Instant;

/// The cubic polynomial matching values and derivatives at both ends of `[t0, t1]`.
///
/// Stored in the power basis around `t0`: `a0 + a1·x + a2·x² + a3·x³` with `x = t − t0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hermite3<T> {
    t0: Instant,
    t1: Instant,
    a0: T,
    a1: T,
    a2: T,
    a3: T,
}

impl<T> Hermite3<T>
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
{
    /// # Panics
    /// If `times.1` is not after `times.0`.
    pub fn new(times: (Instant, Instant), values: (T, T), derivatives: (T, T)) -> Self {
        let (t0, t1) = times;
        assert!(t1 > t0, "empty Hermite interval [{t0}, {t1}]");
        let h = t1 - t0;
        let (v0, v1) = values;
        let (d0, d1) = derivatives;
        let slope = (v1 - v0) * (1.0 / h);
        Hermite3 {
            t0,
            t1,
            a0: v0,
            a1: d0,
            a2: (slope * 3.0 - d0 * 2.0 - d1) * (1.0 / h),
            a3: (d0 + d1 - slope * 2.0) * (1.0 / (h * h)),
        }
    }

    pub fn evaluate(&self, t: Instant) -> T {
        let x = t - self.t0;
        self.a0 + (self.a1 + (self.a2 + self.a3 * x) * x) * x
    }

    pub fn evaluate_derivative(&self, t: Instant) -> T {
        let x = t - self.t0;
        self.a1 + (self.a2 * 2.0 + self.a3 * (3.0 * x)) * x
    }
}

impl Hermite3<f64> {
    /// Instants of `[t0, t1]` where the derivative vanishes, in increasing order.
    pub fn find_extrema(&self) -> Vec<Instant> {
        // Roots of 3·a3·x² + 2·a2·x + a1.
        let (a, b, c) = (3.0 * self.a3, 2.0 * self.a2, self.a1);
        let mut roots = Vec::with_capacity(2);
        if a == 0.0 {
            if b != 0.0 {
                roots.push(-c / b);
            }
        } else {
            let discriminant = b * b - 4.0 * a * c;
            if discriminant >= 0.0 {
                let q = -0.5 * (b + b.signum() * discriminant.sqrt());
                roots.push(q / a);
                if q != 0.0 {
                    roots.push(c / q);
                }
            }
        }
        let h = self.t1 - self.t0;
        let mut extrema: Vec<Instant> = roots
            .into_iter()
            .filter(|x| (0.0..=h).contains(x))
            .map(|x| self.t0 + x)
            .collect();
        extrema.sort();
        extrema.dedup();
        extrema
    }
}
