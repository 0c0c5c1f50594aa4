//! Position and velocity pairs, and their weighted barycentres.

use super::frames::Frame;
use super::vector::{Displacement, Position, Velocity};

/// The state of a point mass in frame `F`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DegreesOfFreedom<F: Frame> {
    pub position: Position<F>,
    pub velocity: Velocity<F>,
}

impl<F: Frame> DegreesOfFreedom<F> {
    pub fn new(position: Position<F>, velocity: Velocity<F>) -> Self {
        DegreesOfFreedom { position, velocity }
    }
}

/// Accumulates weighted degrees of freedom and returns their barycentre.
///
/// Positions are accumulated as displacements from the frame origin, so the weighted mean
/// of the affine points is well defined.
#[derive(Debug, Clone, Default)]
pub struct BarycentreCalculator<F: Frame> {
    weighted_displacements: Displacement<F>,
    weighted_velocities: Velocity<F>,
    weight: f64,
}

impl<F: Frame> BarycentreCalculator<F> {
    pub fn new() -> Self {
        BarycentreCalculator {
            weighted_displacements: Displacement::zero(),
            weighted_velocities: Velocity::zero(),
            weight: 0.0,
        }
    }

    pub fn add(&mut self, degrees_of_freedom: &DegreesOfFreedom<F>, weight: f64) {
        self.weighted_displacements +=
            (degrees_of_freedom.position - Position::origin()) * weight;
        self.weighted_velocities += degrees_of_freedom.velocity * weight;
        self.weight += weight;
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// # Panics
    /// If no weight has been accumulated.
    pub fn get(&self) -> DegreesOfFreedom<F> {
        assert!(
            self.weight != 0.0,
            "barycentre of an empty set of degrees of freedom"
        );
        DegreesOfFreedom {
            position: Position::origin() + self.weighted_displacements / self.weight,
            velocity: self.weighted_velocities / self.weight,
        }
    }
}
