//! Non-rotating rigid motions between frames.

use std::marker::PhantomData;

use super::degrees_of_freedom::DegreesOfFreedom;
use super::frames::Frame;
use super::vector::{Position, Vector};

/// A change of frame from `From` to `To` where the axes of both frames are parallel and the
/// origin of `To` moves uniformly in `From`.
///
/// The motion is fully described by the degrees of freedom of the origin of `To`, expressed
/// in `From`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidMotion<From: Frame, To: Frame> {
    origin_of_to: DegreesOfFreedom<From>,
    _to: PhantomData<To>,
}

impl<From: Frame, To: Frame> RigidMotion<From, To> {
    /// The motion whose target frame has its origin at `origin_of_to`.
    pub fn new(origin_of_to: DegreesOfFreedom<From>) -> Self {
        RigidMotion {
            origin_of_to,
            _to: PhantomData,
        }
    }

    pub fn origin_of_to(&self) -> &DegreesOfFreedom<From> {
        &self.origin_of_to
    }

    pub fn apply(&self, degrees_of_freedom: &DegreesOfFreedom<From>) -> DegreesOfFreedom<To> {
        let displacement = degrees_of_freedom.position - self.origin_of_to.position;
        let velocity = degrees_of_freedom.velocity - self.origin_of_to.velocity;
        DegreesOfFreedom::new(
            Position::origin() + Vector::from_coordinates(*displacement.coordinates()),
            Vector::from_coordinates(*velocity.coordinates()),
        )
    }

    pub fn inverse(&self) -> RigidMotion<To, From> {
        let position = Position::origin() - self.origin_of_to.position;
        RigidMotion::new(DegreesOfFreedom::new(
            Position::origin() + Vector::from_coordinates(*position.coordinates()),
            Vector::from_coordinates(-*self.origin_of_to.velocity.coordinates()),
        ))
    }
}
