//! # Numerical integrators for Newtonian motion
//!
//! Two families of integrators advance systems of the form `q'' = a(t, q)`:
//!
//! - [`symplectic`] – fixed-step, structure-preserving compositions of the kick-drift-kick
//!   leapfrog (2nd order) with Yoshida weights (4th and 6th order). They are used for the
//!   massive bodies, whose trajectories must stay stable over long spans, and for the
//!   authoritative steps of massless bodies.
//! - [`embedded`] – the Dormand–Prince 5(4) embedded Runge–Kutta pair with an error-driven
//!   step-size controller, used for massless bodies whose motion must reach arbitrary instants.
//!
//! Both operate on a [`SystemState`] of plain coordinates. Frames are handled by the callers
//! in [`crate::physics::ephemeris`].

pub mod embedded;
pub mod symplectic;

use std::fmt;
use std::str::FromStr;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::flow_errors::FlowError;
use crate::time::Instant;

/// Positions and velocities of a set of bodies at a common instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemState {
    pub time: Instant,
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
}

impl SystemState {
    pub fn new(
        time: Instant,
        positions: Vec<Vector3<f64>>,
        velocities: Vec<Vector3<f64>>,
    ) -> Self {
        debug_assert_eq!(positions.len(), velocities.len());
        SystemState {
            time,
            positions,
            velocities,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Fixed-step symplectic integrators, by increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixedStepIntegrator {
    #[serde(rename = "leapfrog")]
    Leapfrog,
    #[serde(rename = "yoshida4")]
    Yoshida4,
    #[serde(rename = "yoshida6")]
    Yoshida6,
}

impl FixedStepIntegrator {
    pub fn name(&self) -> &'static str {
        match self {
            FixedStepIntegrator::Leapfrog => "leapfrog",
            FixedStepIntegrator::Yoshida4 => "yoshida4",
            FixedStepIntegrator::Yoshida6 => "yoshida6",
        }
    }

    pub fn order(&self) -> u32 {
        match self {
            FixedStepIntegrator::Leapfrog => 2,
            FixedStepIntegrator::Yoshida4 => 4,
            FixedStepIntegrator::Yoshida6 => 6,
        }
    }
}

impl FromStr for FixedStepIntegrator {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "leapfrog" => Ok(FixedStepIntegrator::Leapfrog),
            "yoshida4" => Ok(FixedStepIntegrator::Yoshida4),
            "yoshida6" => Ok(FixedStepIntegrator::Yoshida6),
            _ => Err(FlowError::UnknownIntegrator(s.to_string())),
        }
    }
}

impl fmt::Display for FixedStepIntegrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Embedded Runge–Kutta pairs with step-size control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaptiveStepIntegrator {
    #[serde(rename = "dormand_prince_54")]
    DormandPrince54,
}

impl AdaptiveStepIntegrator {
    pub fn name(&self) -> &'static str {
        match self {
            AdaptiveStepIntegrator::DormandPrince54 => "dormand_prince_54",
        }
    }
}

impl FromStr for AdaptiveStepIntegrator {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dormand_prince_54" => Ok(AdaptiveStepIntegrator::DormandPrince54),
            _ => Err(FlowError::UnknownIntegrator(s.to_string())),
        }
    }
}

impl fmt::Display for AdaptiveStepIntegrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
