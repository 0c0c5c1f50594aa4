//! Dormand–Prince 5(4) embedded Runge–Kutta integration of `q'' = a(t, q)`.
//!
//! The second-order system is integrated as the first-order system `(q, v)' = (v, a)`.
//! Each step computes the 5th order solution and the difference with the embedded 4th order
//! one; the difference is measured separately on positions and velocities against their own
//! tolerances, and the step is accepted only when both are met.
//!
//! Reference: J. R. Dormand, P. J. Prince (1980), *A family of embedded Runge-Kutta formulae*.

use nalgebra::Vector3;
use tracing::trace;

use super::SystemState;
use crate::constants::{Length, Speed, Time};
use crate::time::Instant;

const STAGES: usize = 7;

const C: [f64; STAGES] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

const A: [[f64; STAGES - 1]; STAGES] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
    ],
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];

/// 5th order weights; equal to the last row of `A` (first same as last).
const B: [f64; STAGES] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];

/// Difference between the 5th and the embedded 4th order weights.
const B_ERR: [f64; STAGES] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

/// Step-size controller using an I-controller
///
/// h_new = safety * h * error^(-1/5)
#[derive(Debug, Clone)]
pub struct StepController {
    pub safety: f64,
    pub max_factor: f64,
    pub min_factor: f64,
    exponent: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
            exponent: 1.0 / 5.0,
        }
    }
}

impl StepController {
    pub fn compute_factor(&self, error_ratio: f64) -> f64 {
        if error_ratio == 0.0 {
            return self.max_factor;
        }
        let factor = self.safety * error_ratio.powf(-self.exponent);
        factor.clamp(self.min_factor, self.max_factor)
    }
}

/// Absolute tolerances on the local error of a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub length: Length,
    pub speed: Speed,
}

/// Integration statistics for diagnostics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub fn_evals: u64,
    pub accepted_steps: u64,
    pub rejected_steps: u64,
    /// Whether the requested final instant was reached.
    pub reached: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DormandPrince54 {
    controller: StepController,
}

impl DormandPrince54 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate `state` up to `t_final`.
    ///
    /// The first trial step spans the whole interval; the controller shrinks it as needed.
    /// `on_step` is called after every accepted step with the updated state. Integration stops
    /// early, with `reached == false`, after `max_steps` accepted steps.
    ///
    /// Arguments
    /// -----------------
    /// * `state`: initial state, updated in place.
    /// * `t_final`: target instant, not before `state.time`.
    /// * `tolerances`: bounds on the position and velocity parts of the local error estimate.
    /// * `max_steps`: budget of accepted steps.
    /// * `acceleration`: fills the accelerations of every body at the given instant and positions.
    /// * `on_step`: observer of accepted steps.
    ///
    /// Return
    /// ----------
    /// * The statistics of the integration, or the first error of `acceleration`.
    pub fn integrate<A, S, E>(
        &self,
        state: &mut SystemState,
        t_final: Instant,
        tolerances: &Tolerances,
        max_steps: u64,
        acceleration: &mut A,
        mut on_step: S,
    ) -> Result<Stats, E>
    where
        A: FnMut(Instant, &[Vector3<f64>], &mut [Vector3<f64>]) -> Result<(), E>,
        S: FnMut(&SystemState),
    {
        let n = state.len();
        let mut stats = Stats::default();
        let mut h: Time = t_final - state.time;

        // kq[i] are velocities and kv[i] accelerations at stage i.
        let mut kq = vec![vec![Vector3::zeros(); n]; STAGES];
        let mut kv = vec![vec![Vector3::zeros(); n]; STAGES];
        let mut stage_q = vec![Vector3::zeros(); n];
        let mut stage_v = vec![Vector3::zeros(); n];

        kq[0].clone_from(&state.velocities);
        acceleration(state.time, &state.positions, &mut kv[0])?;
        stats.fn_evals += 1;

        while state.time < t_final {
            if stats.accepted_steps >= max_steps {
                return Ok(stats);
            }
            let remaining = t_final - state.time;
            let last_step = h >= remaining;
            if last_step {
                h = remaining;
            }
            if state.time + h == state.time {
                tracing::warn!(t = %state.time, h, "step size underflow, stopping integration");
                return Ok(stats);
            }

            for i in 1..STAGES {
                for body in 0..n {
                    let mut dq = Vector3::zeros();
                    let mut dv = Vector3::zeros();
                    for j in 0..i {
                        dq += kq[j][body] * A[i][j];
                        dv += kv[j][body] * A[i][j];
                    }
                    stage_q[body] = state.positions[body] + dq * h;
                    stage_v[body] = state.velocities[body] + dv * h;
                }
                kq[i].clone_from(&stage_v);
                acceleration(state.time + C[i] * h, &stage_q, &mut kv[i])?;
                stats.fn_evals += 1;
            }

            let mut error_ratio: f64 = 0.0;
            for body in 0..n {
                let mut eq = Vector3::zeros();
                let mut ev = Vector3::zeros();
                for i in 0..STAGES {
                    eq += kq[i][body] * B_ERR[i];
                    ev += kv[i][body] * B_ERR[i];
                }
                error_ratio = error_ratio
                    .max((eq * h).norm() / tolerances.length)
                    .max((ev * h).norm() / tolerances.speed);
            }

            let factor = self.controller.compute_factor(error_ratio);
            if error_ratio <= 1.0 {
                for body in 0..n {
                    let mut dq = Vector3::zeros();
                    let mut dv = Vector3::zeros();
                    for i in 0..STAGES {
                        dq += kq[i][body] * B[i];
                        dv += kv[i][body] * B[i];
                    }
                    state.positions[body] += dq * h;
                    state.velocities[body] += dv * h;
                }
                state.time = if last_step { t_final } else { state.time + h };
                stats.accepted_steps += 1;
                on_step(state);

                // First same as last: the final stage is the derivative at the new state.
                let (first, rest) = kv.split_at_mut(1);
                first[0].clone_from(&rest[STAGES - 2]);
                kq[0].clone_from(&state.velocities);
            } else {
                stats.rejected_steps += 1;
                trace!(t = %state.time, h, error_ratio, "rejected adaptive step");
            }
            h *= factor;
        }
        stats.reached = true;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::convert::Infallible;

    #[test]
    fn test_controller_bounds() {
        let controller = StepController::default();
        assert_eq!(controller.compute_factor(0.0), 5.0);
        assert_eq!(controller.compute_factor(1e12), 0.2);
        assert_abs_diff_eq!(controller.compute_factor(1.0), 0.9, epsilon = 1e-15);
    }

    #[test]
    fn test_constant_acceleration_is_exact() {
        let mut state = SystemState::new(
            Instant::J2000,
            vec![Vector3::zeros()],
            vec![Vector3::new(1.0, 0.0, 0.0)],
        );
        let g = Vector3::new(0.0, 0.0, -9.81);
        let mut constant = |_: Instant, _: &[Vector3<f64>], a: &mut [Vector3<f64>]| {
            a[0] = g;
            Ok::<(), Infallible>(())
        };
        let tolerances = Tolerances {
            length: 1e-6,
            speed: 1e-6,
        };
        let stats = DormandPrince54::new().integrate(
            &mut state,
            Instant::J2000 + 10.0,
            &tolerances,
            u64::MAX,
            &mut constant,
            |_| {},
        )
        .unwrap();
        assert!(stats.reached);
        assert_eq!(stats.accepted_steps, 1);
        assert_eq!(state.time, Instant::J2000 + 10.0);
        assert_abs_diff_eq!(state.velocities[0].z, -98.1, epsilon = 1e-10);
        assert_abs_diff_eq!(state.positions[0].z, -490.5, epsilon = 1e-9);
        assert_abs_diff_eq!(state.positions[0].x, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_harmonic_oscillator_within_tolerance() {
        let mut state = SystemState::new(
            Instant::J2000,
            vec![Vector3::new(1.0, 0.0, 0.0)],
            vec![Vector3::new(0.0, 1.0, 0.0)],
        );
        let mut oscillator = |_: Instant, q: &[Vector3<f64>], a: &mut [Vector3<f64>]| {
            a[0] = -q[0];
            Ok::<(), Infallible>(())
        };
        let tolerances = Tolerances {
            length: 1e-10,
            speed: 1e-10,
        };
        let mut times = vec![];
        let stats = DormandPrince54::new().integrate(
            &mut state,
            Instant::J2000 + crate::constants::DPI,
            &tolerances,
            u64::MAX,
            &mut oscillator,
            |s| times.push(s.time),
        )
        .unwrap();
        assert!(stats.reached);
        assert!(stats.rejected_steps > 0);
        assert_eq!(times.len() as u64, stats.accepted_steps);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert_abs_diff_eq!(state.positions[0].x, 1.0, epsilon = 1e-7);
        assert_abs_diff_eq!(state.positions[0].y, 0.0, epsilon = 1e-7);
    }

    #[test]
    fn test_step_budget() {
        let mut state = SystemState::new(
            Instant::J2000,
            vec![Vector3::new(1.0, 0.0, 0.0)],
            vec![Vector3::new(0.0, 1.0, 0.0)],
        );
        let mut oscillator = |_: Instant, q: &[Vector3<f64>], a: &mut [Vector3<f64>]| {
            a[0] = -q[0];
            Ok::<(), Infallible>(())
        };
        let tolerances = Tolerances {
            length: 1e-10,
            speed: 1e-10,
        };
        let stats = DormandPrince54::new().integrate(
            &mut state,
            Instant::J2000 + 100.0,
            &tolerances,
            3,
            &mut oscillator,
            |_| {},
        )
        .unwrap();
        assert!(!stats.reached);
        assert_eq!(stats.accepted_steps, 3);
        assert!(state.time < Instant::J2000 + 100.0);
    }
}
