//! Gravitational flows of massive and massless bodies.
//!
//! An [`physics::Ephemeris`] integrates the massive bodies with a symplectic integrator and
//! compresses their motion into Chebyshev series; massless bodies are flowed in that field
//! and recorded in forkable [`physics::DiscreteTrajectory`] histories. Rigid clusters of
//! massless parts are advanced together as [`pile_up::PileUp`]s.

pub mod arena;
pub mod config;
pub mod constants;
pub mod flow_errors;
pub mod geometry;
pub mod integrators;
pub mod numerics;
pub mod physics;
pub mod pile_up;
pub mod serialization;
pub mod time;
