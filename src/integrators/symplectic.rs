//! Fixed-step symplectic integration.
//!
//! Every method here is a composition of kick-drift-kick leapfrog substeps of lengths
//! `wᵢ·h`. With the Yoshida weights the composition cancels the leading error terms of the
//! leapfrog, giving 4th or 6th order while remaining symplectic and time-reversible.
//!
//! The acceleration callback receives the instant of the positions it is evaluated at: after
//! each drift the substep time is advanced by `wᵢ·h`, so that time-dependent sources (the
//! massive bodies seen by a massless one) are sampled consistently.

use nalgebra::Vector3;

use super::{FixedStepIntegrator, SystemState};
use crate::constants::Time;
use crate::time::Instant;

const LEAPFROG_WEIGHTS: [f64; 1] = [1.0];

// w1 = 1 / (2 - 2^(1/3)), w0 = -2^(1/3) / (2 - 2^(1/3))
const YOSHIDA4_WEIGHTS: [f64; 3] = [
    1.351_207_191_959_657_8,
    -1.702_414_383_919_315_3,
    1.351_207_191_959_657_8,
];

// Solution A of Yoshida (1990); w0 = 1 - 2 (w1 + w2 + w3)
const YOSHIDA6_W1: f64 = -1.177_679_984_178_87;
const YOSHIDA6_W2: f64 = 0.235_573_213_359_357;
const YOSHIDA6_W3: f64 = 0.784_513_610_477_560;
const YOSHIDA6_W0: f64 = 1.0 - 2.0 * (YOSHIDA6_W1 + YOSHIDA6_W2 + YOSHIDA6_W3);
const YOSHIDA6_WEIGHTS: [f64; 7] = [
    YOSHIDA6_W3,
    YOSHIDA6_W2,
    YOSHIDA6_W1,
    YOSHIDA6_W0,
    YOSHIDA6_W1,
    YOSHIDA6_W2,
    YOSHIDA6_W3,
];

impl FixedStepIntegrator {
    /// Substep weights of the composition; they sum to 1.
    pub fn weights(&self) -> &'static [f64] {
        match self {
            FixedStepIntegrator::Leapfrog => &LEAPFROG_WEIGHTS,
            FixedStepIntegrator::Yoshida4 => &YOSHIDA4_WEIGHTS,
            FixedStepIntegrator::Yoshida6 => &YOSHIDA6_WEIGHTS,
        }
    }

    /// Offsets from the start of a step of length `h` of the earliest and latest instants at
    /// which [`FixedStepIntegrator::step`] evaluates the acceleration.
    ///
    /// The Yoshida weights include negative ones, so these fall outside of `[0, h]`. The
    /// offsets are accumulated exactly as in `step`.
    pub fn substep_offsets(&self, h: Time) -> (Time, Time) {
        let mut elapsed = 0.0;
        let (mut earliest, mut latest) = (0.0_f64, 0.0_f64);
        for &w in self.weights() {
            elapsed += w * h;
            earliest = earliest.min(elapsed);
            latest = latest.max(elapsed);
        }
        (earliest, latest)
    }

    /// Advance `state` by one step of length `h`.
    ///
    /// Arguments
    /// -----------------
    /// * `state`: positions and velocities, updated in place; `state.time` ends at `time + h`.
    /// * `h`: step length in seconds.
    /// * `acceleration`: fills the accelerations of every body at the given instant and
    ///   positions.
    ///
    /// Return
    /// ----------
    /// * The first error of `acceleration`, if any; `state` is then left mid-step.
    pub fn step<A, E>(
        &self,
        state: &mut SystemState,
        h: Time,
        acceleration: &mut A,
    ) -> Result<(), E>
    where
        A: FnMut(Instant, &[Vector3<f64>], &mut [Vector3<f64>]) -> Result<(), E>,
    {
        let start = state.time;
        let mut accelerations = vec![Vector3::zeros(); state.len()];
        acceleration(state.time, &state.positions, &mut accelerations)?;

        let mut elapsed = 0.0;
        for &w in self.weights() {
            let wh = w * h;
            kick(&mut state.velocities, &accelerations, 0.5 * wh);
            drift(&mut state.positions, &state.velocities, wh);
            elapsed += wh;
            state.time = start + elapsed;
            acceleration(state.time, &state.positions, &mut accelerations)?;
            kick(&mut state.velocities, &accelerations, 0.5 * wh);
        }
        // Rounding in the weights must not shift the step grid.
        state.time = start + h;
        Ok(())
    }
}

fn kick(velocities: &mut [Vector3<f64>], accelerations: &[Vector3<f64>], dt: f64) {
    for (v, a) in velocities.iter_mut().zip(accelerations) {
        *v += a * dt;
    }
}

fn drift(positions: &mut [Vector3<f64>], velocities: &[Vector3<f64>], dt: f64) {
    for (q, v) in positions.iter_mut().zip(velocities) {
        *q += v * dt;
    }
}
