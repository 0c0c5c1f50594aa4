//! Parts: the massless bodies that pile-ups are made of.

use std::fmt;

use crate::arena::{Arena, IdLike};
use crate::constants::Mass;
use crate::flow_errors::FlowError;
use crate::geometry::{Barycentric, DegreesOfFreedom, Force};
use crate::physics::discrete_trajectory::{DiscreteTrajectory, TRUNK};
use crate::serialization::{
    read_degrees_of_freedom, read_vector, required, write_degrees_of_freedom, write_vector,
    PartMessage,
};

/// Stable identity of a part, also used in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartId(u64);

impl PartId {
    pub const fn new(raw: u64) -> Self {
        PartId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl IdLike for PartId {
    fn from_raw(index: u64) -> Self {
        PartId(index)
    }

    fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part #{}", self.0)
    }
}

/// All the parts of a simulation, by id.
pub type Parts = Arena<PartId, Part>;

#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    name: String,
    mass: Mass,
    /// Sum of the non-gravitational forces applied since the last clear.
    intrinsic_force: Force<Barycentric>,
    degrees_of_freedom: DegreesOfFreedom<Barycentric>,
    /// History of the part, appended when its pile-up advances.
    tail: DiscreteTrajectory<Barycentric>,
}

impl Part {
    pub fn new(
        name: impl Into<String>,
        mass: Mass,
        degrees_of_freedom: DegreesOfFreedom<Barycentric>,
    ) -> Result<Self, FlowError> {
        if !(mass > 0.0 && mass.is_finite()) {
            return Err(FlowError::InvalidParameter(format!(
                "part mass must be positive, got {mass}"
            )));
        }
        Ok(Part {
            name: name.into(),
            mass,
            intrinsic_force: Force::zero(),
            degrees_of_freedom,
            tail: DiscreteTrajectory::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mass(&self) -> Mass {
        self.mass
    }

    pub fn intrinsic_force(&self) -> Force<Barycentric> {
        self.intrinsic_force
    }

    pub fn increment_intrinsic_force(&mut self, force: Force<Barycentric>) {
        self.intrinsic_force += force;
    }

    pub fn clear_intrinsic_force(&mut self) {
        self.intrinsic_force = Force::zero();
    }

    pub fn degrees_of_freedom(&self) -> &DegreesOfFreedom<Barycentric> {
        &self.degrees_of_freedom
    }

    pub fn set_degrees_of_freedom(&mut self, degrees_of_freedom: DegreesOfFreedom<Barycentric>) {
        self.degrees_of_freedom = degrees_of_freedom;
    }

    pub fn tail(&self) -> &DiscreteTrajectory<Barycentric> {
        &self.tail
    }

    pub fn tail_mut(&mut self) -> &mut DiscreteTrajectory<Barycentric> {
        &mut self.tail
    }

    /// Whether no point of the tail awaits confirmation.
    pub fn tail_is_authoritative(&self) -> bool {
        self.tail.is_authoritative(TRUNK)
    }

    pub fn write_to_message(&self, id: PartId) -> PartMessage {
        PartMessage {
            id: id.raw(),
            name: self.name.clone(),
            mass: self.mass,
            intrinsic_force: Some(write_vector(&self.intrinsic_force)),
            degrees_of_freedom: Some(write_degrees_of_freedom(&self.degrees_of_freedom)),
            tail: Some(self.tail.write_to_message()),
        }
    }

    pub fn read_from_message(message: &PartMessage) -> Result<(PartId, Part), FlowError> {
        let mut part = Part::new(
            message.name.clone(),
            message.mass,
            read_degrees_of_freedom(required(
                &message.degrees_of_freedom,
                "degrees_of_freedom",
            )?)?,
        )?;
        part.intrinsic_force = read_vector(required(&message.intrinsic_force, "intrinsic_force")?)?;
        part.tail = DiscreteTrajectory::read_from_message(required(&message.tail, "tail")?)?;
        Ok((PartId::new(message.id), part))
    }
}
