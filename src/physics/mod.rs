//! # Bodies, trajectories and the ephemeris
//!
//! - [`massive_body`] – massive bodies and their gravitational field (point mass and J2).
//! - [`continuous_trajectory`] – Chebyshev-compressed trajectories of massive bodies.
//! - [`discrete_trajectory`] – forkable sample histories of massless bodies.
//! - [`ephemeris`] – integration of the massive bodies and flows of massless bodies.
//! - [`apsides`] – apsides of a discrete trajectory around a massive body.

pub mod apsides;
pub mod continuous_trajectory;
pub mod discrete_trajectory;
pub mod ephemeris;
pub mod massive_body;

pub use apsides::compute_apsides;
pub use continuous_trajectory::ContinuousTrajectory;
pub use discrete_trajectory::{DiscreteTrajectory, ForkId, ForkMut, TRUNK};
pub use ephemeris::{
    no_intrinsic_acceleration, Ephemeris, EphemerisFlow, FixedStepInstance,
    IntrinsicAcceleration, UNLIMITED_MAX_EPHEMERIS_STEPS,
};
pub use massive_body::{MassiveBody, Oblateness};
