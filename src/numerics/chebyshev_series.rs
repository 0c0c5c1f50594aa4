//! Chebyshev series of a vector-valued function of time.
//!
//! A [`ChebyshevSeries`] approximates a function `f: [t_min, t_max] → ℝ³` by
//!
//! ```text
//! f(t) ≈ Σₖ cₖ · Tₖ(x),   x = (2t − t_min − t_max) / (t_max − t_min)
//! ```
//!
//! where `Tₖ` is the Chebyshev polynomial of the first kind of degree `k`. Evaluation uses the
//! Clenshaw recurrence, which is both faster and numerically more stable than summing the
//! polynomials explicitly:
//!
//! ```text
//! bₖ = cₖ + 2x·bₖ₊₁ − bₖ₊₂,         f = c₀ + x·b₁ − b₂
//! b'ₖ = 2bₖ₊₁ + 2x·b'ₖ₊₁ − b'ₖ₊₂,   f' = b₁ + x·b'₁ − b'₂
//! ```
//!
//! and the derivative with respect to `t` is `f'·2/(t_max − t_min)`.
//!
//! The magnitude of the last coefficient is a cheap proxy for the truncation error of the
//! approximation.
//!
//! See also
//! -----------------
//! * [`crate::numerics::newhall`] – the least-squares fit producing series from samples.
//! * [`crate::physics::continuous_trajectory::ContinuousTrajectory`] – the piecewise owner.

use nalgebra::Vector3;

use crate::flow_errors::FlowError;
use crate::serialization::{ChebyshevSeriesMessage, CoordinatesMessage};
use crate::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct ChebyshevSeries {
    coefficients: Vec<Vector3<f64>>,
    t_min: Instant,
    t_max: Instant,
    // Precomputed for the evaluation: x = (t − t_mean)·two_over_duration.
    t_mean: Instant,
    two_over_duration: f64,
}

impl ChebyshevSeries {
    /// Build a series from its coefficients, lowest degree first.
    ///
    /// # Panics
    /// If `coefficients` is empty or `t_min >= t_max`.
    pub fn new(coefficients: Vec<Vector3<f64>>, t_min: Instant, t_max: Instant) -> Self {
        assert!(
            !coefficients.is_empty(),
            "a Chebyshev series needs at least one coefficient"
        );
        assert!(
            t_min < t_max,
            "empty Chebyshev series interval [{t_min}, {t_max}]"
        );
        let duration = t_max - t_min;
        ChebyshevSeries {
            coefficients,
            t_min,
            t_max,
            t_mean: t_min + 0.5 * duration,
            two_over_duration: 2.0 / duration,
        }
    }

    pub fn t_min(&self) -> Instant {
        self.t_min
    }

    pub fn t_max(&self) -> Instant {
        self.t_max
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[Vector3<f64>] {
        &self.coefficients
    }

    /// Coefficient of the highest degree, whose norm estimates the truncation error.
    pub fn last_coefficient(&self) -> &Vector3<f64> {
        &self.coefficients[self.coefficients.len() - 1]
    }

    fn scaled_argument(&self, t: Instant) -> f64 {
        assert!(
            self.t_min <= t && t <= self.t_max,
            "{t} is outside of the series interval [{}, {}]",
            self.t_min,
            self.t_max
        );
        (t - self.t_mean) * self.two_over_duration
    }

    /// Value of the series at `t`.
    ///
    /// # Panics
    /// If `t` is outside of `[t_min, t_max]`.
    pub fn evaluate(&self, t: Instant) -> Vector3<f64> {
        let x = self.scaled_argument(t);
        let two_x = 2.0 * x;
        let mut b_kplus2 = Vector3::zeros();
        let mut b_kplus1 = Vector3::zeros();
        for c_k in self.coefficients[1..].iter().rev() {
            let b_k = c_k + b_kplus1 * two_x - b_kplus2;
            b_kplus2 = b_kplus1;
            b_kplus1 = b_k;
        }
        self.coefficients[0] + b_kplus1 * x - b_kplus2
    }

    /// Time derivative of the series at `t`.
    ///
    /// # Panics
    /// If `t` is outside of `[t_min, t_max]`.
    pub fn evaluate_derivative(&self, t: Instant) -> Vector3<f64> {
        let x = self.scaled_argument(t);
        let two_x = 2.0 * x;
        let mut b_kplus2 = Vector3::zeros();
        let mut b_kplus1 = Vector3::zeros();
        let mut db_kplus2 = Vector3::zeros();
        let mut db_kplus1 = Vector3::zeros();
        for c_k in self.coefficients[1..].iter().rev() {
            let b_k = c_k + b_kplus1 * two_x - b_kplus2;
            let db_k = b_kplus1 * 2.0 + db_kplus1 * two_x - db_kplus2;
            b_kplus2 = b_kplus1;
            b_kplus1 = b_k;
            db_kplus2 = db_kplus1;
            db_kplus1 = db_k;
        }
        (b_kplus1 + db_kplus1 * x - db_kplus2) * self.two_over_duration
    }

    /// The same series shifted by a constant vector.
    pub(crate) fn translated(mut self, offset: &Vector3<f64>) -> Self {
        self.coefficients[0] += offset;
        self
    }

    pub fn write_to_message(&self) -> ChebyshevSeriesMessage {
        ChebyshevSeriesMessage {
            t_min: self.t_min.seconds_since_j2000(),
            t_max: self.t_max.seconds_since_j2000(),
            coefficients: self
                .coefficients
                .iter()
                .map(CoordinatesMessage::from)
                .collect(),
        }
    }

    pub fn read_from_message(message: &ChebyshevSeriesMessage) -> Result<Self, FlowError> {
        let t_min = Instant::from_seconds_since_j2000(message.t_min);
        let t_max = Instant::from_seconds_since_j2000(message.t_max);
        if message.coefficients.is_empty() || t_min >= t_max {
            return Err(FlowError::InvalidMessage(format!(
                "Chebyshev series with {} coefficients over [{t_min}, {t_max}]",
                message.coefficients.len()
            )));
        }
        Ok(ChebyshevSeries::new(
            message.coefficients.iter().map(Vector3::from).collect(),
            t_min,
            t_max,
        ))
    }
}
