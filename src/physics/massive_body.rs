//! Massive bodies and their gravitational field.
//!
//! A [`MassiveBody`] is a point mass, optionally oblate. The oblateness is modelled by the
//! second zonal harmonic `J2` about a fixed axis, which produces on a body at `r` (from the
//! centre of the oblate body) the perturbing acceleration
//!
//! ```text
//! a = −(3/2)·J2·μ·R²/r⁵ · [(1 − 5(r·ẑ)²/r²)·r + 2(r·ẑ)·ẑ]
//! ```

use nalgebra::Vector3;

use crate::constants::{GravitationalParameter, Length, Mass, GRAVITATIONAL_CONSTANT};
use crate::flow_errors::FlowError;
use crate::serialization::{required, MassiveBodyMessage, OblatenessMessage};

/// Second zonal harmonic of an oblate body.
#[derive(Debug, Clone, PartialEq)]
pub struct Oblateness {
    pub j2: f64,
    pub reference_radius: Length,
    /// Unit vector along the axis of symmetry.
    pub axis: Vector3<f64>,
}

impl Oblateness {
    pub fn new(j2: f64, reference_radius: Length, axis: Vector3<f64>) -> Result<Self, FlowError> {
        if !(reference_radius > 0.0) {
            return Err(FlowError::InvalidParameter(format!(
                "oblateness reference radius must be positive, got {reference_radius}"
            )));
        }
        let norm = axis.norm();
        if !(norm > 0.0 && norm.is_finite()) {
            return Err(FlowError::InvalidParameter(
                "oblateness axis must be a non-zero vector".into(),
            ));
        }
        Ok(Oblateness {
            j2,
            reference_radius,
            axis: axis / norm,
        })
    }

    /// Perturbing acceleration at `r` from the centre of a body with parameter `mu`.
    pub fn acceleration(&self, mu: GravitationalParameter, r: &Vector3<f64>) -> Vector3<f64> {
        let r2 = r.norm_squared();
        let r5 = r2 * r2 * r2.sqrt();
        let z = r.dot(&self.axis);
        let factor = -1.5 * self.j2 * mu * self.reference_radius * self.reference_radius / r5;
        (r * (1.0 - 5.0 * z * z / r2) + self.axis * (2.0 * z)) * factor
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MassiveBody {
    name: String,
    gravitational_parameter: GravitationalParameter,
    mean_radius: Length,
    oblateness: Option<Oblateness>,
}

impl MassiveBody {
    pub fn new(
        name: impl Into<String>,
        gravitational_parameter: GravitationalParameter,
        mean_radius: Length,
    ) -> Result<Self, FlowError> {
        if !(gravitational_parameter > 0.0 && gravitational_parameter.is_finite()) {
            return Err(FlowError::InvalidParameter(format!(
                "gravitational parameter must be positive, got {gravitational_parameter}"
            )));
        }
        if !(mean_radius >= 0.0) {
            return Err(FlowError::InvalidParameter(format!(
                "mean radius must be non-negative, got {mean_radius}"
            )));
        }
        Ok(MassiveBody {
            name: name.into(),
            gravitational_parameter,
            mean_radius,
            oblateness: None,
        })
    }

    /// A body of the given mass; μ = G·m.
    pub fn from_mass(
        name: impl Into<String>,
        mass: Mass,
        mean_radius: Length,
    ) -> Result<Self, FlowError> {
        Self::new(name, GRAVITATIONAL_CONSTANT * mass, mean_radius)
    }

    pub fn with_oblateness(mut self, oblateness: Oblateness) -> Self {
        self.oblateness = Some(oblateness);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gravitational_parameter(&self) -> GravitationalParameter {
        self.gravitational_parameter
    }

    pub fn mass(&self) -> Mass {
        self.gravitational_parameter / GRAVITATIONAL_CONSTANT
    }

    pub fn mean_radius(&self) -> Length {
        self.mean_radius
    }

    pub fn oblateness(&self) -> Option<&Oblateness> {
        self.oblateness.as_ref()
    }

    pub fn is_oblate(&self) -> bool {
        self.oblateness.is_some()
    }

    /// Gravitational acceleration exerted by this body at `r` from its centre.
    pub fn acceleration_at(&self, r: &Vector3<f64>) -> Vector3<f64> {
        let r2 = r.norm_squared();
        let mut acceleration = -r * (self.gravitational_parameter / (r2 * r2.sqrt()));
        if let Some(oblateness) = &self.oblateness {
            acceleration += oblateness.acceleration(self.gravitational_parameter, r);
        }
        acceleration
    }

    pub fn write_to_message(&self) -> MassiveBodyMessage {
        MassiveBodyMessage {
            name: self.name.clone(),
            gravitational_parameter: self.gravitational_parameter,
            mean_radius: self.mean_radius,
            oblateness: self.oblateness.as_ref().map(|o| OblatenessMessage {
                j2: o.j2,
                reference_radius: o.reference_radius,
                axis: Some((&o.axis).into()),
            }),
        }
    }

    pub fn read_from_message(message: &MassiveBodyMessage) -> Result<Self, FlowError> {
        let body = MassiveBody::new(
            message.name.clone(),
            message.gravitational_parameter,
            message.mean_radius,
        )?;
        match &message.oblateness {
            None => Ok(body),
            Some(o) => {
                let axis = required(&o.axis, "axis")?;
                // The axis was normalised when written: keep it bit for bit.
                let oblateness = Oblateness {
                    j2: o.j2,
                    reference_radius: o.reference_radius,
                    axis: axis.into(),
                };
                Ok(body.with_oblateness(oblateness))
            }
        }
    }
}
