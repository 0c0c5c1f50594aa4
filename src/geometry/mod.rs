//! # Frame-tagged geometry
//!
//! Quantities in this crate are tagged, at compile time, with the reference frame they are
//! expressed in. A displacement in [`frames::RigidPileUp`] cannot be added to a position in
//! [`frames::Barycentric`]; crossing frames requires an explicit
//! [`rigid_motion::RigidMotion`].
//!
//! ## Overview
//!
//! - [`frames`] – zero-sized frame markers and their serialisation tags
//! - [`vector`] – `Vector<F>` (displacements, velocities, accelerations, forces) and the affine
//!   `Position<F>`
//! - [`degrees_of_freedom`] – position/velocity pairs and the weighted `BarycentreCalculator`
//! - [`rigid_motion`] – non-rotating frame changes

pub mod degrees_of_freedom;
pub mod frames;
pub mod rigid_motion;
pub mod vector;

pub use degrees_of_freedom::{BarycentreCalculator, DegreesOfFreedom};
pub use frames::{ApparentBubble, Barycentric, Frame, RigidPileUp};
pub use rigid_motion::RigidMotion;
pub use vector::{Acceleration, Displacement, Force, Position, Vector, Velocity};
