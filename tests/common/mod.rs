#![allow(dead_code)]

use approx::assert_abs_diff_eq;
use nalgebra::Vector3;
use nbody_flow::config::{EphemerisParameters, FixedStepParameters};
use nbody_flow::geometry::{Barycentric, DegreesOfFreedom, Frame};
use nbody_flow::integrators::FixedStepIntegrator;
use nbody_flow::physics::{Ephemeris, MassiveBody};
use nbody_flow::time::Instant;

pub fn t(seconds: f64) -> Instant {
    Instant::from_seconds_since_j2000(seconds)
}

/// Start of the ephemerides of the tests, early enough for fixed-step flows from J2000.
pub const EPHEMERIS_START: f64 = -3600.0;

/// An ephemeris made of `body` at rest at the origin from an hour before J2000.
pub fn ephemeris_at_rest(
    body: MassiveBody,
    step: f64,
    fitting_tolerance: f64,
) -> Ephemeris<Barycentric> {
    let parameters = EphemerisParameters::builder()
        .fitting_tolerance(fitting_tolerance)
        .fixed_step(FixedStepParameters::new(FixedStepIntegrator::Yoshida6, step).unwrap())
        .build()
        .unwrap();
    Ephemeris::new(
        vec![body],
        &[DegreesOfFreedom::default()],
        t(EPHEMERIS_START),
        parameters,
    )
    .unwrap()
}

pub fn assert_dof_close<F: Frame>(
    actual: &DegreesOfFreedom<F>,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    epsilon: f64,
) {
    assert_abs_diff_eq!(*actual.position.coordinates(), position, epsilon = epsilon);
    assert_abs_diff_eq!(*actual.velocity.coordinates(), velocity, epsilon = epsilon);
}
