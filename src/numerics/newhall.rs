//! Newhall approximation: Chebyshev fit of positions and velocities.
//!
//! Given positions `qᵢ` and velocities `vᵢ` sampled at the 9 points of a uniform subdivision
//! of `[t_min, t_max]` (8 intervals), the Newhall approximation of degree `n` is the Chebyshev
//! series with coefficients `c₀ … cₙ` minimising
//!
//! ```text
//! Σᵢ |Σₖ cₖ Tₖ(τᵢ) − qᵢ|² + w² Σᵢ |Σₖ cₖ T'ₖ(τᵢ) − vᵢ·Δt/2|²
//! ```
//!
//! subject to matching position and velocity exactly at both ends of the interval, so that
//! consecutive segments join with continuous position and velocity.
//!
//! The minimiser is linear in the samples: `c = M·b` where `b = [q₀ … q₈, v'₀ … v'₈]` with
//! `v'ᵢ = vᵢ·Δt/2`. The matrix `M` only depends on the degree; it is obtained once per degree
//! by solving the Karush–Kuhn–Tucker system of the constrained least-squares problem with a
//! LU decomposition, and cached for the lifetime of the process.
//!
//! Reference: X X Newhall (1989), *Numerical representation of planetary ephemerides*,
//! Celestial Mechanics 45.

use std::sync::LazyLock;

use nalgebra::{DMatrix, Vector3};

use super::chebyshev_series::ChebyshevSeries;
use crate::constants::{MAX_NEWHALL_DEGREE, MIN_NEWHALL_DEGREE, STEPS_PER_NEWHALL_FIT};
use crate::time::Instant;

/// Number of samples consumed by one fit.
pub const NEWHALL_SAMPLES: usize = STEPS_PER_NEWHALL_FIT + 1;

/// Relative weight of the velocity residuals.
const VELOCITY_WEIGHT: f64 = 0.4;

static NEWHALL_MATRICES: LazyLock<Vec<DMatrix<f64>>> = LazyLock::new(|| {
    (MIN_NEWHALL_DEGREE..=MAX_NEWHALL_DEGREE)
        .map(compute_newhall_matrix)
        .collect()
});

/// Values of `T₀(x) … Tₙ(x)` and of their derivatives.
fn chebyshev_values(degree: usize, x: f64) -> (Vec<f64>, Vec<f64>) {
    let mut t = vec![0.0; degree + 1];
    // Uₖ, the polynomials of the second kind: T'ₖ = k·Uₖ₋₁.
    let mut u = vec![0.0; degree + 1];
    t[0] = 1.0;
    u[0] = 1.0;
    if degree >= 1 {
        t[1] = x;
        u[1] = 2.0 * x;
    }
    for k in 2..=degree {
        t[k] = 2.0 * x * t[k - 1] - t[k - 2];
        u[k] = 2.0 * x * u[k - 1] - u[k - 2];
    }
    let dt = (0..=degree)
        .map(|k| if k == 0 { 0.0 } else { k as f64 * u[k - 1] })
        .collect();
    (t, dt)
}

fn compute_newhall_matrix(degree: usize) -> DMatrix<f64> {
    let unknowns = degree + 1;
    let rows = 2 * NEWHALL_SAMPLES;
    let constraints = 4;

    let mut a = DMatrix::<f64>::zeros(rows, unknowns);
    let mut weights = DMatrix::<f64>::zeros(rows, rows);
    for i in 0..NEWHALL_SAMPLES {
        let tau = -1.0 + 2.0 * i as f64 / STEPS_PER_NEWHALL_FIT as f64;
        let (t, dt) = chebyshev_values(degree, tau);
        for k in 0..unknowns {
            a[(i, k)] = t[k];
            a[(NEWHALL_SAMPLES + i, k)] = dt[k];
        }
        weights[(i, i)] = 1.0;
        weights[(NEWHALL_SAMPLES + i, NEWHALL_SAMPLES + i)] = VELOCITY_WEIGHT * VELOCITY_WEIGHT;
    }

    // Exact position and velocity at both ends, selected from b.
    let selected = [
        0,
        NEWHALL_SAMPLES - 1,
        NEWHALL_SAMPLES,
        2 * NEWHALL_SAMPLES - 1,
    ];
    let mut c = DMatrix::<f64>::zeros(constraints, unknowns);
    let mut s = DMatrix::<f64>::zeros(constraints, rows);
    for (row, &column) in selected.iter().enumerate() {
        for k in 0..unknowns {
            c[(row, k)] = a[(column, k)];
        }
        s[(row, column)] = 1.0;
    }

    let at_w = a.transpose() * &weights;
    let size = unknowns + constraints;
    let mut kkt = DMatrix::<f64>::zeros(size, size);
    kkt.view_mut((0, 0), (unknowns, unknowns))
        .copy_from(&(&at_w * &a * 2.0));
    kkt.view_mut((0, unknowns), (unknowns, constraints))
        .copy_from(&c.transpose());
    kkt.view_mut((unknowns, 0), (constraints, unknowns))
        .copy_from(&c);

    let mut rhs = DMatrix::<f64>::zeros(size, rows);
    rhs.view_mut((0, 0), (unknowns, rows))
        .copy_from(&(at_w * 2.0));
    rhs.view_mut((unknowns, 0), (constraints, rows))
        .copy_from(&s);

    match kkt.lu().solve(&rhs) {
        Some(solution) => solution.rows(0, unknowns).into_owned(),
        None => panic!("singular Newhall system for degree {degree}"),
    }
}

/// The matrix mapping `[q₀ … q₈, v'₀ … v'₈]` to the coefficients of degree `degree`.
///
/// # Panics
/// If `degree` is outside of `MIN_NEWHALL_DEGREE..=MAX_NEWHALL_DEGREE`.
pub fn newhall_matrix(degree: usize) -> &'static DMatrix<f64> {
    assert!(
        (MIN_NEWHALL_DEGREE..=MAX_NEWHALL_DEGREE).contains(&degree),
        "Newhall degree {degree} outside of [{MIN_NEWHALL_DEGREE}, {MAX_NEWHALL_DEGREE}]"
    );
    &NEWHALL_MATRICES[degree - MIN_NEWHALL_DEGREE]
}

/// Fit a Chebyshev series of the given degree to positions and velocities sampled at the
/// [`NEWHALL_SAMPLES`] points of a uniform subdivision of `[t_min, t_max]`.
///
/// Arguments
/// -----------------
/// * `degree`: degree of the series, in `MIN_NEWHALL_DEGREE..=MAX_NEWHALL_DEGREE`.
/// * `positions`, `velocities`: the samples, in increasing time order.
/// * `t_min`, `t_max`: the interval; the first and last samples lie on its ends.
///
/// Return
/// ----------
/// * the series, which matches the first and last samples exactly in position and velocity.
///
/// # Panics
/// If the degree is out of range or the number of samples is not [`NEWHALL_SAMPLES`].
pub fn newhall_approximation(
    degree: usize,
    positions: &[Vector3<f64>],
    velocities: &[Vector3<f64>],
    t_min: Instant,
    t_max: Instant,
) -> ChebyshevSeries {
    assert_eq!(positions.len(), NEWHALL_SAMPLES);
    assert_eq!(velocities.len(), NEWHALL_SAMPLES);
    let matrix = newhall_matrix(degree);
    let half_duration = 0.5 * (t_max - t_min);

    let mut coefficients = vec![Vector3::zeros(); degree + 1];
    for (k, coefficient) in coefficients.iter_mut().enumerate() {
        for (i, (q, v)) in positions.iter().zip(velocities).enumerate() {
            *coefficient += q * matrix[(k, i)];
            *coefficient += v * (half_duration * matrix[(k, NEWHALL_SAMPLES + i)]);
        }
    }
    ChebyshevSeries::new(coefficients, t_min, t_max)
}
