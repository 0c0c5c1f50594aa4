//! # Integration parameters and their configuration files
//!
//! Three parameter sets drive the integrations of the crate:
//!
//! * [`FixedStepParameters`] – symplectic integrator and step, used for the massive bodies and
//!   for the authoritative history of pile-ups;
//! * [`AdaptiveStepParameters`] – embedded integrator, step budget and local error tolerances,
//!   used for the prolongation of massless trajectories;
//! * [`EphemerisParameters`] – the fitting tolerance of the Chebyshev compression together
//!   with the fixed-step parameters of the massive bodies.
//!
//! Each set has a fluent builder validating its values, and the whole configuration can be
//! loaded from TOML with [`FlowConfig::from_toml_str`]:
//!
//! ```toml
//! [ephemeris]
//! fitting_tolerance = 1.0
//!
//! [ephemeris.fixed_step]
//! integrator = "yoshida6"
//! step = 600.0
//!
//! [history]
//! integrator = "yoshida4"
//! step = 10.0
//!
//! [prolongation]
//! integrator = "dormand_prince_54"
//! max_steps = 1000
//! length_integration_tolerance = 1.0
//! speed_integration_tolerance = 1.0
//! ```
//!
//! Missing tables fall back to the [`Default`] of their parameter set.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{Length, Speed, Time};
use crate::flow_errors::FlowError;
use crate::integrators::{AdaptiveStepIntegrator, FixedStepIntegrator};
use crate::serialization::{AdaptiveStepParametersMessage, FixedStepParametersMessage};

/// Parameters of a fixed-step symplectic integration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedStepParameters {
    pub integrator: FixedStepIntegrator,
    /// Step in seconds, strictly positive.
    pub step: Time,
}

impl FixedStepParameters {
    pub fn new(integrator: FixedStepIntegrator, step: Time) -> Result<Self, FlowError> {
        let parameters = FixedStepParameters { integrator, step };
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn builder() -> FixedStepParametersBuilder {
        FixedStepParametersBuilder::default()
    }

    fn validate(&self) -> Result<(), FlowError> {
        if !(self.step > 0.0 && self.step.is_finite()) {
            return Err(FlowError::InvalidParameter(format!(
                "fixed step must be positive and finite, got {}",
                self.step
            )));
        }
        Ok(())
    }

    pub fn write_to_message(&self) -> FixedStepParametersMessage {
        FixedStepParametersMessage {
            integrator: self.integrator.name().to_string(),
            step: self.step,
        }
    }

    pub fn read_from_message(message: &FixedStepParametersMessage) -> Result<Self, FlowError> {
        FixedStepParameters::new(message.integrator.parse()?, message.step)
    }
}

impl Default for FixedStepParameters {
    fn default() -> Self {
        FixedStepParameters {
            integrator: FixedStepIntegrator::Yoshida6,
            step: 10.0,
        }
    }
}

/// Builder for [`FixedStepParameters`], with validation.
#[derive(Debug, Clone, Default)]
pub struct FixedStepParametersBuilder {
    params: FixedStepParameters,
}

impl FixedStepParametersBuilder {
    pub fn integrator(mut self, v: FixedStepIntegrator) -> Self {
        self.params.integrator = v;
        self
    }
    pub fn step(mut self, v: Time) -> Self {
        self.params.step = v;
        self
    }

    pub fn build(self) -> Result<FixedStepParameters, FlowError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

/// Parameters of an adaptive-step integration.
///
/// A step is accepted only if its local error estimate is below both tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveStepParameters {
    pub integrator: AdaptiveStepIntegrator,
    /// Maximal number of accepted steps per flow.
    pub max_steps: u64,
    pub length_integration_tolerance: Length,
    pub speed_integration_tolerance: Speed,
}

impl AdaptiveStepParameters {
    pub fn new(
        integrator: AdaptiveStepIntegrator,
        max_steps: u64,
        length_integration_tolerance: Length,
        speed_integration_tolerance: Speed,
    ) -> Result<Self, FlowError> {
        let parameters = AdaptiveStepParameters {
            integrator,
            max_steps,
            length_integration_tolerance,
            speed_integration_tolerance,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn builder() -> AdaptiveStepParametersBuilder {
        AdaptiveStepParametersBuilder::default()
    }

    fn validate(&self) -> Result<(), FlowError> {
        if self.max_steps == 0 {
            return Err(FlowError::InvalidParameter(
                "max_steps must be at least 1".into(),
            ));
        }
        if !(self.length_integration_tolerance > 0.0) {
            return Err(FlowError::InvalidParameter(format!(
                "length_integration_tolerance must be positive, got {}",
                self.length_integration_tolerance
            )));
        }
        if !(self.speed_integration_tolerance > 0.0) {
            return Err(FlowError::InvalidParameter(format!(
                "speed_integration_tolerance must be positive, got {}",
                self.speed_integration_tolerance
            )));
        }
        Ok(())
    }

    pub fn write_to_message(&self) -> AdaptiveStepParametersMessage {
        AdaptiveStepParametersMessage {
            integrator: self.integrator.name().to_string(),
            max_steps: self.max_steps,
            length_integration_tolerance: self.length_integration_tolerance,
            speed_integration_tolerance: self.speed_integration_tolerance,
        }
    }

    pub fn read_from_message(message: &AdaptiveStepParametersMessage) -> Result<Self, FlowError> {
        AdaptiveStepParameters::new(
            message.integrator.parse()?,
            message.max_steps,
            message.length_integration_tolerance,
            message.speed_integration_tolerance,
        )
    }
}

impl Default for AdaptiveStepParameters {
    fn default() -> Self {
        AdaptiveStepParameters {
            integrator: AdaptiveStepIntegrator::DormandPrince54,
            max_steps: 1000,
            length_integration_tolerance: 1.0,
            speed_integration_tolerance: 1.0,
        }
    }
}

/// Builder for [`AdaptiveStepParameters`], with validation.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveStepParametersBuilder {
    params: AdaptiveStepParameters,
}

impl AdaptiveStepParametersBuilder {
    pub fn integrator(mut self, v: AdaptiveStepIntegrator) -> Self {
        self.params.integrator = v;
        self
    }
    pub fn max_steps(mut self, v: u64) -> Self {
        self.params.max_steps = v;
        self
    }
    pub fn length_integration_tolerance(mut self, v: Length) -> Self {
        self.params.length_integration_tolerance = v;
        self
    }
    pub fn speed_integration_tolerance(mut self, v: Speed) -> Self {
        self.params.speed_integration_tolerance = v;
        self
    }

    pub fn build(self) -> Result<AdaptiveStepParameters, FlowError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

/// Parameters of an [`Ephemeris`](crate::physics::ephemeris::Ephemeris).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EphemerisParameters {
    /// Largest admissible distance between a Chebyshev segment and the integrated positions.
    pub fitting_tolerance: Length,
    pub fixed_step: FixedStepParameters,
}

impl EphemerisParameters {
    pub fn builder() -> EphemerisParametersBuilder {
        EphemerisParametersBuilder::default()
    }

    fn validate(&self) -> Result<(), FlowError> {
        if !(self.fitting_tolerance > 0.0) {
            return Err(FlowError::InvalidParameter(format!(
                "fitting_tolerance must be positive, got {}",
                self.fitting_tolerance
            )));
        }
        self.fixed_step.validate()
    }

    pub fn from_toml_str(text: &str) -> Result<Self, FlowError> {
        let parameters: EphemerisParameters = toml::from_str(text)?;
        parameters.validate()?;
        Ok(parameters)
    }
}

impl Default for EphemerisParameters {
    fn default() -> Self {
        EphemerisParameters {
            fitting_tolerance: 1.0,
            fixed_step: FixedStepParameters {
                integrator: FixedStepIntegrator::Yoshida6,
                step: 600.0,
            },
        }
    }
}

/// Builder for [`EphemerisParameters`], with validation.
#[derive(Debug, Clone, Default)]
pub struct EphemerisParametersBuilder {
    params: EphemerisParameters,
}

impl EphemerisParametersBuilder {
    pub fn fitting_tolerance(mut self, v: Length) -> Self {
        self.params.fitting_tolerance = v;
        self
    }
    pub fn fixed_step(mut self, v: FixedStepParameters) -> Self {
        self.params.fixed_step = v;
        self
    }

    pub fn build(self) -> Result<EphemerisParameters, FlowError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

/// Complete configuration of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub ephemeris: EphemerisParameters,
    /// Fixed-step parameters of the authoritative history of massless bodies.
    #[serde(default)]
    pub history: FixedStepParameters,
    /// Adaptive-step parameters of the speculative prolongation of massless bodies.
    #[serde(default)]
    pub prolongation: AdaptiveStepParameters,
}

impl FlowConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, FlowError> {
        let config: FlowConfig = toml::from_str(text)?;
        config.ephemeris.validate()?;
        config.history.validate()?;
        config.prolongation.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, FlowError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, FlowError> {
        toml::to_string(self).map_err(|e| FlowError::InvalidParameter(e.to_string()))
    }
}
