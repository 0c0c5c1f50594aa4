//! # Wire messages
//!
//! Every persistent object of the crate writes itself to, and reads itself from, one of the
//! `prost` messages below. The messages are declared directly in Rust with
//! `#[derive(prost::Message)]`, so no `.proto` compilation step is needed.
//!
//! Conventions
//! -----------------
//! * Instants are `double` seconds since J2000 (TDB); durations are `double` seconds.
//! * Frame-tagged values carry the [`Frame::TAG`] of their frame, checked on reading.
//! * Collections are written in a deterministic order (id order, time order), so that
//!   `write → read → write` produces byte-identical buffers.
//!
//! The conversions between messages and the geometric types live here; the objects
//! themselves implement `write_to_message` / `read_from_message` in their own modules.

use nalgebra::Vector3;
use prost::Message;

use crate::flow_errors::FlowError;
use crate::geometry::{DegreesOfFreedom, Frame, Position, Vector};
use crate::time::Instant;

#[derive(Clone, Copy, PartialEq, Message)]
pub struct CoordinatesMessage {
    #[prost(double, tag = "1")]
    pub x: f64,
    #[prost(double, tag = "2")]
    pub y: f64,
    #[prost(double, tag = "3")]
    pub z: f64,
}

#[derive(Clone, PartialEq, Message)]
pub struct VectorMessage {
    #[prost(int32, tag = "1")]
    pub frame: i32,
    #[prost(message, optional, tag = "2")]
    pub coordinates: Option<CoordinatesMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DegreesOfFreedomMessage {
    #[prost(int32, tag = "1")]
    pub frame: i32,
    #[prost(message, optional, tag = "2")]
    pub position: Option<CoordinatesMessage>,
    #[prost(message, optional, tag = "3")]
    pub velocity: Option<CoordinatesMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TimedDegreesOfFreedomMessage {
    #[prost(double, tag = "1")]
    pub time: f64,
    #[prost(message, optional, tag = "2")]
    pub degrees_of_freedom: Option<DegreesOfFreedomMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChebyshevSeriesMessage {
    #[prost(double, tag = "1")]
    pub t_min: f64,
    #[prost(double, tag = "2")]
    pub t_max: f64,
    #[prost(message, repeated, tag = "3")]
    pub coefficients: Vec<CoordinatesMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ContinuousTrajectoryMessage {
    #[prost(int32, tag = "1")]
    pub frame: i32,
    #[prost(double, tag = "2")]
    pub step: f64,
    #[prost(double, tag = "3")]
    pub tolerance: f64,
    #[prost(uint32, tag = "4")]
    pub degree: u32,
    #[prost(message, repeated, tag = "5")]
    pub series: Vec<ChebyshevSeriesMessage>,
    /// Dense samples of the segment still being fitted.
    #[prost(message, repeated, tag = "6")]
    pub open_samples: Vec<TimedDegreesOfFreedomMessage>,
    /// Whether the last series covers the open samples.
    #[prost(bool, tag = "7")]
    pub open_segment_fitted: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct ForkMessage {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, optional, tag = "2")]
    pub parent: Option<u64>,
    #[prost(double, optional, tag = "3")]
    pub fork_time: Option<f64>,
    #[prost(message, repeated, tag = "4")]
    pub timeline: Vec<TimedDegreesOfFreedomMessage>,
    #[prost(uint64, tag = "5")]
    pub speculative: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct DiscreteTrajectoryMessage {
    #[prost(int32, tag = "1")]
    pub frame: i32,
    #[prost(uint64, tag = "2")]
    pub next_fork_id: u64,
    #[prost(message, repeated, tag = "3")]
    pub forks: Vec<ForkMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OblatenessMessage {
    #[prost(double, tag = "1")]
    pub j2: f64,
    #[prost(double, tag = "2")]
    pub reference_radius: f64,
    #[prost(message, optional, tag = "3")]
    pub axis: Option<CoordinatesMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MassiveBodyMessage {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(double, tag = "2")]
    pub gravitational_parameter: f64,
    #[prost(double, tag = "3")]
    pub mean_radius: f64,
    #[prost(message, optional, tag = "4")]
    pub oblateness: Option<OblatenessMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FixedStepParametersMessage {
    #[prost(string, tag = "1")]
    pub integrator: String,
    #[prost(double, tag = "2")]
    pub step: f64,
}

#[derive(Clone, PartialEq, Message)]
pub struct AdaptiveStepParametersMessage {
    #[prost(string, tag = "1")]
    pub integrator: String,
    #[prost(uint64, tag = "2")]
    pub max_steps: u64,
    #[prost(double, tag = "3")]
    pub length_integration_tolerance: f64,
    #[prost(double, tag = "4")]
    pub speed_integration_tolerance: f64,
}

#[derive(Clone, PartialEq, Message)]
pub struct EphemerisMessage {
    #[prost(int32, tag = "1")]
    pub frame: i32,
    #[prost(message, repeated, tag = "2")]
    pub bodies: Vec<MassiveBodyMessage>,
    #[prost(message, repeated, tag = "3")]
    pub trajectories: Vec<ContinuousTrajectoryMessage>,
    #[prost(double, tag = "4")]
    pub fitting_tolerance: f64,
    #[prost(message, optional, tag = "5")]
    pub fixed_step_parameters: Option<FixedStepParametersMessage>,
    /// State of the massive bodies reached by the fixed-step integration.
    #[prost(double, tag = "6")]
    pub time: f64,
    #[prost(message, repeated, tag = "7")]
    pub positions: Vec<CoordinatesMessage>,
    #[prost(message, repeated, tag = "8")]
    pub velocities: Vec<CoordinatesMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PartMessage {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(double, tag = "3")]
    pub mass: f64,
    #[prost(message, optional, tag = "4")]
    pub intrinsic_force: Option<VectorMessage>,
    #[prost(message, optional, tag = "5")]
    pub degrees_of_freedom: Option<DegreesOfFreedomMessage>,
    #[prost(message, optional, tag = "6")]
    pub tail: Option<DiscreteTrajectoryMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PartDegreesOfFreedomMessage {
    #[prost(uint64, tag = "1")]
    pub part_id: u64,
    #[prost(message, optional, tag = "2")]
    pub degrees_of_freedom: Option<DegreesOfFreedomMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PileUpMessage {
    #[prost(uint64, repeated, tag = "1")]
    pub part_id: Vec<u64>,
    #[prost(message, optional, tag = "2")]
    pub psychohistory: Option<DiscreteTrajectoryMessage>,
    #[prost(message, repeated, tag = "3")]
    pub actual_part_degrees_of_freedom: Vec<PartDegreesOfFreedomMessage>,
    #[prost(message, repeated, tag = "4")]
    pub apparent_part_degrees_of_freedom: Vec<PartDegreesOfFreedomMessage>,
    #[prost(message, optional, tag = "5")]
    pub intrinsic_force: Option<VectorMessage>,
    #[prost(message, optional, tag = "6")]
    pub adaptive_step_parameters: Option<AdaptiveStepParametersMessage>,
    #[prost(message, optional, tag = "7")]
    pub fixed_step_parameters: Option<FixedStepParametersMessage>,
}

impl From<&Vector3<f64>> for CoordinatesMessage {
    fn from(v: &Vector3<f64>) -> Self {
        CoordinatesMessage {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<&CoordinatesMessage> for Vector3<f64> {
    fn from(m: &CoordinatesMessage) -> Self {
        Vector3::new(m.x, m.y, m.z)
    }
}

/// Unwrap an optional sub-message, naming the missing field in the error.
pub fn required<'a, T>(field: &'a Option<T>, name: &str) -> Result<&'a T, FlowError> {
    field
        .as_ref()
        .ok_or_else(|| FlowError::InvalidMessage(format!("missing field {name}")))
}

pub fn write_vector<F: Frame>(vector: &Vector<F>) -> VectorMessage {
    VectorMessage {
        frame: F::TAG,
        coordinates: Some(vector.coordinates().into()),
    }
}

pub fn read_vector<F: Frame>(message: &VectorMessage) -> Result<Vector<F>, FlowError> {
    F::check_tag(message.frame)?;
    let coordinates = required(&message.coordinates, "coordinates")?;
    Ok(Vector::from_coordinates(coordinates.into()))
}

pub fn write_degrees_of_freedom<F: Frame>(
    degrees_of_freedom: &DegreesOfFreedom<F>,
) -> DegreesOfFreedomMessage {
    DegreesOfFreedomMessage {
        frame: F::TAG,
        position: Some(degrees_of_freedom.position.coordinates().into()),
        velocity: Some(degrees_of_freedom.velocity.coordinates().into()),
    }
}

pub fn read_degrees_of_freedom<F: Frame>(
    message: &DegreesOfFreedomMessage,
) -> Result<DegreesOfFreedom<F>, FlowError> {
    F::check_tag(message.frame)?;
    let position = required(&message.position, "position")?;
    let velocity = required(&message.velocity, "velocity")?;
    Ok(DegreesOfFreedom::new(
        Position::from_coordinates(position.into()),
        Vector::from_coordinates(velocity.into()),
    ))
}

pub fn write_timed_degrees_of_freedom<F: Frame>(
    time: Instant,
    degrees_of_freedom: &DegreesOfFreedom<F>,
) -> TimedDegreesOfFreedomMessage {
    TimedDegreesOfFreedomMessage {
        time: time.seconds_since_j2000(),
        degrees_of_freedom: Some(write_degrees_of_freedom(degrees_of_freedom)),
    }
}

pub fn read_timed_degrees_of_freedom<F: Frame>(
    message: &TimedDegreesOfFreedomMessage,
) -> Result<(Instant, DegreesOfFreedom<F>), FlowError> {
    let degrees_of_freedom = read_degrees_of_freedom(required(
        &message.degrees_of_freedom,
        "degrees_of_freedom",
    )?)?;
    Ok((
        Instant::from_seconds_since_j2000(message.time),
        degrees_of_freedom,
    ))
}

/// Encode any message to bytes.
pub fn to_bytes<M: Message>(message: &M) -> Vec<u8> {
    message.encode_to_vec()
}

/// Decode a message from bytes.
pub fn from_bytes<M: Message + Default>(bytes: &[u8]) -> Result<M, FlowError> {
    Ok(M::decode(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Barycentric, RigidPileUp};

    #[test]
    fn test_degrees_of_freedom_round_trip() {
        let dof = DegreesOfFreedom::<Barycentric>::new(
            Position::new(1.0, -2.0, 3.5),
            Vector::new(0.25, 0.0, -7.0),
        );
        let message = write_degrees_of_freedom(&dof);
        let bytes = to_bytes(&message);
        let decoded: DegreesOfFreedomMessage = from_bytes(&bytes).unwrap();
        assert_eq!(read_degrees_of_freedom::<Barycentric>(&decoded).unwrap(), dof);
        assert!(matches!(
            read_degrees_of_freedom::<RigidPileUp>(&decoded),
            Err(FlowError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_missing_field() {
        let message = VectorMessage {
            frame: Barycentric::TAG,
            coordinates: None,
        };
        assert_eq!(
            read_vector::<Barycentric>(&message),
            Err(FlowError::InvalidMessage(
                "missing field coordinates".to_string()
            ))
        );
    }

    #[test]
    fn test_garbage_bytes() {
        let result: Result<DegreesOfFreedomMessage, _> = from_bytes(&[0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(FlowError::Decode(_))));
    }
}
