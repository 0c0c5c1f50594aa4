//! # Ephemeris of the massive bodies and gravitational flows
//!
//! The [`Ephemeris`] owns the massive bodies of a system and their
//! [`ContinuousTrajectory`]s. It integrates the N-body problem of the massive bodies with a
//! fixed-step symplectic integrator, compressing every step into the Chebyshev segments of
//! the trajectories, and it exposes two flows for massless bodies moving in the resulting
//! gravitational field:
//!
//! * [`Ephemeris::flow_with_fixed_step`] – a symplectic integration of several massless
//!   bodies on a fixed grid, driven by a persistent [`FixedStepInstance`]. The instance is
//!   bound to the intrinsic accelerations it was created with; callers drop it and create a
//!   new one when those change.
//! * [`Ephemeris::flow_with_adaptive_step`] – an embedded Runge–Kutta integration of one
//!   massless body up to an arbitrary instant, with an intrinsic acceleration evaluated at
//!   every stage.
//!
//! ## Coverage
//!
//! The massive bodies are only integrated on demand, by [`Ephemeris::prolong`]. Both flows
//! prolong the ephemeris as far as they need it, never further. The adaptive flow accepts a
//! budget of ephemeris steps and reports a partial flow instead of exceeding it.
//!
//! The Yoshida compositions evaluate the acceleration slightly before the start and after
//! the end of each step. A fixed-step flow therefore prolongs past the end of its last step,
//! and fails with [`FlowError::OutOfRange`] if a step would look at the massive bodies
//! before the start of the ephemeris.
//!
//! ## Forces
//!
//! Every massive body attracts every other body as a point mass. An oblate body adds the
//! acceleration of its second zonal harmonic, and the oblate body itself feels the reaction.
//!
//! See also
//! -----------------
//! * [`EphemerisFlow`] – the seam through which pile-ups use an ephemeris.
//! * [`crate::integrators`] – the integrators behind both flows.

use std::convert::Infallible;
use std::fmt;

use nalgebra::Vector3;
use tracing::debug;

use crate::config::{AdaptiveStepParameters, EphemerisParameters, FixedStepParameters};
use crate::flow_errors::FlowError;
use crate::geometry::{Acceleration, DegreesOfFreedom, Frame, Position, Velocity};
use crate::integrators::embedded::{DormandPrince54, Tolerances};
use crate::integrators::{AdaptiveStepIntegrator, SystemState};
use crate::physics::continuous_trajectory::ContinuousTrajectory;
use crate::physics::discrete_trajectory::ForkMut;
use crate::physics::massive_body::MassiveBody;
use crate::serialization::{required, EphemerisMessage};
use crate::time::Instant;

/// Budget of ephemeris steps that never stops a flow.
pub const UNLIMITED_MAX_EPHEMERIS_STEPS: u64 = u64::MAX;

/// An acceleration of a massless body that does not come from gravitation.
pub type IntrinsicAcceleration<F> = Box<dyn Fn(Instant) -> Acceleration<F>>;

/// The intrinsic acceleration of a body in free fall.
pub fn no_intrinsic_acceleration<F: Frame>(_t: Instant) -> Acceleration<F> {
    Acceleration::zero()
}

/// State of a fixed-step integration of massless bodies, kept between flows.
pub struct FixedStepInstance<F: Frame> {
    state: SystemState,
    intrinsic_accelerations: Vec<IntrinsicAcceleration<F>>,
    parameters: FixedStepParameters,
}

impl<F: Frame> FixedStepInstance<F> {
    /// # Panics
    /// If there are no bodies, or not one intrinsic acceleration per body.
    pub fn new(
        t: Instant,
        degrees_of_freedom: &[DegreesOfFreedom<F>],
        intrinsic_accelerations: Vec<IntrinsicAcceleration<F>>,
        parameters: FixedStepParameters,
    ) -> Self {
        assert!(
            !degrees_of_freedom.is_empty(),
            "fixed-step instance without bodies"
        );
        assert_eq!(
            degrees_of_freedom.len(),
            intrinsic_accelerations.len(),
            "one intrinsic acceleration per body is required"
        );
        FixedStepInstance {
            state: SystemState::new(
                t,
                degrees_of_freedom
                    .iter()
                    .map(|dof| *dof.position.coordinates())
                    .collect(),
                degrees_of_freedom
                    .iter()
                    .map(|dof| *dof.velocity.coordinates())
                    .collect(),
            ),
            intrinsic_accelerations,
            parameters,
        }
    }

    /// Time of the last completed step.
    pub fn time(&self) -> Instant {
        self.state.time
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn parameters(&self) -> &FixedStepParameters {
        &self.parameters
    }

    pub fn degrees_of_freedom(&self, index: usize) -> DegreesOfFreedom<F> {
        degrees_of_freedom_at(&self.state, index)
    }
}

impl<F: Frame> fmt::Debug for FixedStepInstance<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedStepInstance")
            .field("state", &self.state)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

fn degrees_of_freedom_at<F: Frame>(state: &SystemState, index: usize) -> DegreesOfFreedom<F> {
    DegreesOfFreedom::new(
        Position::from_coordinates(state.positions[index]),
        Velocity::from_coordinates(state.velocities[index]),
    )
}

/// Gravitational flows of massless bodies.
///
/// Implemented by [`Ephemeris`]; pile-ups only depend on this trait.
pub trait EphemerisFlow<F: Frame> {
    /// A fixed-step integration starting from the given state at `t`.
    fn new_instance(
        &self,
        t: Instant,
        degrees_of_freedom: &[DegreesOfFreedom<F>],
        intrinsic_accelerations: Vec<IntrinsicAcceleration<F>>,
        parameters: FixedStepParameters,
    ) -> FixedStepInstance<F> {
        FixedStepInstance::new(t, degrees_of_freedom, intrinsic_accelerations, parameters)
    }

    /// Advance `instance` by whole steps as long as they do not pass `t`, appending the
    /// state of body `i` after every step to `trajectories[i]`.
    ///
    /// Fails without taking the step when a step needs the massive bodies outside of the
    /// range the ephemeris can cover; the steps already taken are kept.
    ///
    /// # Panics
    /// If there is not one trajectory per body of the instance.
    fn flow_with_fixed_step(
        &mut self,
        t: Instant,
        instance: &mut FixedStepInstance<F>,
        trajectories: &mut [ForkMut<'_, F>],
    ) -> Result<(), FlowError>;

    /// Integrate `trajectory` from its last point to `t`.
    ///
    /// Returns whether `t` was reached. The flow stops early when the ephemeris cannot be
    /// prolonged within `max_ephemeris_steps` steps or when the integrator exhausts its own
    /// budget of steps; what was integrated is kept. With `last_point_only`, only the final
    /// state is appended. Fails if `trajectory` ends before the start of the ephemeris.
    ///
    /// # Panics
    /// If `trajectory` is empty.
    fn flow_with_adaptive_step(
        &mut self,
        trajectory: ForkMut<'_, F>,
        intrinsic_acceleration: &dyn Fn(Instant) -> Acceleration<F>,
        t: Instant,
        parameters: &AdaptiveStepParameters,
        max_ephemeris_steps: u64,
        last_point_only: bool,
    ) -> Result<bool, FlowError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ephemeris<F: Frame> {
    bodies: Vec<MassiveBody>,
    trajectories: Vec<ContinuousTrajectory<F>>,
    parameters: EphemerisParameters,
    /// Massive bodies at the last fixed step.
    state: SystemState,
}

impl<F: Frame> Ephemeris<F> {
    /// An ephemeris of `bodies`, starting from `initial_state` (one entry per body) at `t0`.
    pub fn new(
        bodies: Vec<MassiveBody>,
        initial_state: &[DegreesOfFreedom<F>],
        t0: Instant,
        parameters: EphemerisParameters,
    ) -> Result<Self, FlowError> {
        if bodies.is_empty() {
            return Err(FlowError::InvalidParameter(
                "an ephemeris needs at least one massive body".into(),
            ));
        }
        if bodies.len() != initial_state.len() {
            return Err(FlowError::InvalidParameter(format!(
                "{} bodies but {} initial states",
                bodies.len(),
                initial_state.len()
            )));
        }
        if !t0.is_finite() {
            return Err(FlowError::InvalidParameter(format!(
                "initial time must be finite, got {t0}"
            )));
        }

        let mut trajectories = Vec::with_capacity(bodies.len());
        for dof in initial_state {
            let mut trajectory = ContinuousTrajectory::new(
                parameters.fixed_step.step,
                parameters.fitting_tolerance,
            )?;
            trajectory.append(t0, *dof);
            trajectories.push(trajectory);
        }
        let state = SystemState::new(
            t0,
            initial_state
                .iter()
                .map(|dof| *dof.position.coordinates())
                .collect(),
            initial_state
                .iter()
                .map(|dof| *dof.velocity.coordinates())
                .collect(),
        );
        debug!(
            bodies = bodies.len(),
            %t0,
            integrator = %parameters.fixed_step.integrator,
            step = parameters.fixed_step.step,
            "created ephemeris"
        );
        Ok(Ephemeris {
            bodies,
            trajectories,
            parameters,
            state,
        })
    }

    pub fn bodies(&self) -> &[MassiveBody] {
        &self.bodies
    }

    pub fn body_index(&self, name: &str) -> Option<usize> {
        self.bodies.iter().position(|body| body.name() == name)
    }

    /// # Panics
    /// If `index` is not the index of a body.
    pub fn trajectory(&self, index: usize) -> &ContinuousTrajectory<F> {
        &self.trajectories[index]
    }

    pub fn parameters(&self) -> &EphemerisParameters {
        &self.parameters
    }

    /// Start of the range where every massive body can be evaluated.
    pub fn t_min(&self) -> Instant {
        self.trajectories
            .iter()
            .map(ContinuousTrajectory::t_min)
            .max()
            .unwrap_or(Instant::INFINITE_FUTURE)
    }

    /// End of the range where every massive body can be evaluated.
    pub fn t_max(&self) -> Instant {
        self.trajectories
            .iter()
            .map(ContinuousTrajectory::t_max)
            .min()
            .unwrap_or(Instant::INFINITE_PAST)
    }

    /// Integrate the massive bodies until every trajectory covers `t`.
    ///
    /// # Panics
    /// If `t` is not finite.
    pub fn prolong(&mut self, t: Instant) {
        self.prolong_bounded(t, UNLIMITED_MAX_EPHEMERIS_STEPS);
    }

    /// Same as [`Ephemeris::prolong`], with at most `max_steps` steps. Returns whether `t` is
    /// covered.
    pub fn prolong_bounded(&mut self, t: Instant, max_steps: u64) -> bool {
        assert!(t.is_finite(), "cannot prolong the ephemeris to {t}");
        let start = self.state.time;
        let mut steps: u64 = 0;
        while self.t_max() < t {
            if steps == max_steps {
                debug!(%t, t_max = %self.t_max(), steps, "ephemeris step budget exhausted");
                return false;
            }
            self.step_massive_bodies();
            steps += 1;
        }
        if steps > 0 {
            debug!(from = %start, to = %self.state.time, steps, "prolonged ephemeris");
        }
        true
    }

    fn step_massive_bodies(&mut self) {
        let bodies = &self.bodies;
        let mut acceleration = |_t: Instant, q: &[Vector3<f64>], a: &mut [Vector3<f64>]| {
            compute_massive_accelerations(bodies, q, a);
            Ok::<(), Infallible>(())
        };
        let FixedStepParameters { integrator, step } = self.parameters.fixed_step;
        if let Err(never) = integrator.step(&mut self.state, step, &mut acceleration) {
            match never {}
        }
        for (index, trajectory) in self.trajectories.iter_mut().enumerate() {
            trajectory.append(self.state.time, degrees_of_freedom_at(&self.state, index));
        }
    }

    /// Gravitational acceleration exerted by the massive bodies at `position` and `t`.
    pub fn compute_gravitational_acceleration_on_massless_body(
        &self,
        position: &Position<F>,
        t: Instant,
    ) -> Result<Acceleration<F>, FlowError> {
        if t < self.t_min() || t > self.t_max() {
            return Err(self.out_of_range(t));
        }
        Ok(Acceleration::from_coordinates(
            self.massless_acceleration(position.coordinates(), t)?,
        ))
    }

    fn massless_acceleration(
        &self,
        q: &Vector3<f64>,
        t: Instant,
    ) -> Result<Vector3<f64>, FlowError> {
        let mut acceleration = Vector3::zeros();
        for (body, trajectory) in self.bodies.iter().zip(&self.trajectories) {
            let centre = trajectory.evaluate_position_coordinates(t)?;
            acceleration += body.acceleration_at(&(q - centre));
        }
        Ok(acceleration)
    }

    fn out_of_range(&self, t: Instant) -> FlowError {
        FlowError::OutOfRange {
            t,
            t_min: self.t_min(),
            t_max: self.t_max(),
        }
    }

    pub fn write_to_message(&self) -> EphemerisMessage {
        EphemerisMessage {
            frame: F::TAG,
            bodies: self.bodies.iter().map(MassiveBody::write_to_message).collect(),
            trajectories: self
                .trajectories
                .iter()
                .map(ContinuousTrajectory::write_to_message)
                .collect(),
            fitting_tolerance: self.parameters.fitting_tolerance,
            fixed_step_parameters: Some(self.parameters.fixed_step.write_to_message()),
            time: self.state.time.seconds_since_j2000(),
            positions: self.state.positions.iter().map(Into::into).collect(),
            velocities: self.state.velocities.iter().map(Into::into).collect(),
        }
    }

    pub fn read_from_message(message: &EphemerisMessage) -> Result<Self, FlowError> {
        F::check_tag(message.frame)?;
        let fixed_step = FixedStepParameters::read_from_message(required(
            &message.fixed_step_parameters,
            "fixed_step_parameters",
        )?)?;
        let parameters = EphemerisParameters::builder()
            .fitting_tolerance(message.fitting_tolerance)
            .fixed_step(fixed_step)
            .build()?;
        let bodies = message
            .bodies
            .iter()
            .map(MassiveBody::read_from_message)
            .collect::<Result<Vec<_>, _>>()?;
        let trajectories = message
            .trajectories
            .iter()
            .map(ContinuousTrajectory::read_from_message)
            .collect::<Result<Vec<_>, _>>()?;
        let n = bodies.len();
        if n == 0
            || trajectories.len() != n
            || message.positions.len() != n
            || message.velocities.len() != n
        {
            return Err(FlowError::InvalidMessage(format!(
                "ephemeris with {n} bodies, {} trajectories and {} states",
                trajectories.len(),
                message.positions.len()
            )));
        }
        let state = SystemState::new(
            Instant::from_seconds_since_j2000(message.time),
            message.positions.iter().map(Into::into).collect(),
            message.velocities.iter().map(Into::into).collect(),
        );
        Ok(Ephemeris {
            bodies,
            trajectories,
            parameters,
            state,
        })
    }
}

impl<F: Frame> EphemerisFlow<F> for Ephemeris<F> {
    fn flow_with_fixed_step(
        &mut self,
        t: Instant,
        instance: &mut FixedStepInstance<F>,
        trajectories: &mut [ForkMut<'_, F>],
    ) -> Result<(), FlowError> {
        assert_eq!(
            trajectories.len(),
            instance.len(),
            "one trajectory per body of the instance is required"
        );
        let FixedStepParameters { integrator, step } = instance.parameters;
        let (earliest, latest) = integrator.substep_offsets(step);
        while instance.state.time + step <= t {
            let start = instance.state.time;
            self.prolong(start + latest);
            if start + earliest < self.t_min() {
                return Err(self.out_of_range(start + earliest));
            }
            let intrinsic_accelerations = &instance.intrinsic_accelerations;
            let ephemeris = &*self;
            let mut acceleration = |time: Instant,
                                    q: &[Vector3<f64>],
                                    a: &mut [Vector3<f64>]|
             -> Result<(), FlowError> {
                for (i, (a_i, q_i)) in a.iter_mut().zip(q).enumerate() {
                    *a_i = ephemeris.massless_acceleration(q_i, time)?
                        + intrinsic_accelerations[i](time).coordinates();
                }
                Ok(())
            };
            integrator.step(&mut instance.state, step, &mut acceleration)?;
            for (index, trajectory) in trajectories.iter_mut().enumerate() {
                trajectory.append(
                    instance.state.time,
                    degrees_of_freedom_at(&instance.state, index),
                );
            }
        }
        Ok(())
    }

    fn flow_with_adaptive_step(
        &mut self,
        mut trajectory: ForkMut<'_, F>,
        intrinsic_acceleration: &dyn Fn(Instant) -> Acceleration<F>,
        t: Instant,
        parameters: &AdaptiveStepParameters,
        max_ephemeris_steps: u64,
        last_point_only: bool,
    ) -> Result<bool, FlowError> {
        let Some((t0, dof0)) = trajectory.last() else {
            panic!("cannot flow the empty fork {:?}", trajectory.fork());
        };
        if t <= t0 {
            return Ok(true);
        }
        self.prolong_bounded(t, max_ephemeris_steps);
        let t_final = t.min(self.t_max());
        if t_final <= t0 {
            debug!(%t, t_max = %self.t_max(), "no ephemeris coverage for the adaptive flow");
            return Ok(false);
        }
        if t0 < self.t_min() {
            return Err(self.out_of_range(t0));
        }

        let mut state = SystemState::new(
            t0,
            vec![*dof0.position.coordinates()],
            vec![*dof0.velocity.coordinates()],
        );
        let tolerances = Tolerances {
            length: parameters.length_integration_tolerance,
            speed: parameters.speed_integration_tolerance,
        };
        let ephemeris = &*self;
        let mut acceleration = |time: Instant,
                                q: &[Vector3<f64>],
                                a: &mut [Vector3<f64>]|
         -> Result<(), FlowError> {
            a[0] = ephemeris.massless_acceleration(&q[0], time)?
                + intrinsic_acceleration(time).coordinates();
            Ok(())
        };
        let stats = match parameters.integrator {
            AdaptiveStepIntegrator::DormandPrince54 => DormandPrince54::new().integrate(
                &mut state,
                t_final,
                &tolerances,
                parameters.max_steps,
                &mut acceleration,
                |s: &SystemState| {
                    if !last_point_only {
                        trajectory.append(s.time, degrees_of_freedom_at(s, 0));
                    }
                },
            )?,
        };
        if last_point_only && state.time > t0 {
            trajectory.append(state.time, degrees_of_freedom_at(&state, 0));
        }

        let reached = stats.reached && t_final == t;
        if !reached {
            debug!(
                %t,
                stopped_at = %state.time,
                accepted_steps = stats.accepted_steps,
                rejected_steps = stats.rejected_steps,
                "adaptive flow stopped early"
            );
        }
        Ok(reached)
    }
}

/// Accelerations of the massive bodies at positions `q`.
fn compute_massive_accelerations(
    bodies: &[MassiveBody],
    q: &[Vector3<f64>],
    accelerations: &mut [Vector3<f64>],
) {
    accelerations.fill(Vector3::zeros());
    for i in 0..bodies.len() {
        let mu_i = bodies[i].gravitational_parameter();
        for j in (i + 1)..bodies.len() {
            let mu_j = bodies[j].gravitational_parameter();
            // From body i to body j.
            let r = q[j] - q[i];
            let r2 = r.norm_squared();
            let inverse_r3 = 1.0 / (r2 * r2.sqrt());
            accelerations[i] += r * (mu_j * inverse_r3);
            accelerations[j] -= r * (mu_i * inverse_r3);

            if let Some(oblateness) = bodies[j].oblateness() {
                let a = oblateness.acceleration(mu_j, &-r);
                accelerations[i] += a;
                accelerations[j] -= a * (mu_i / mu_j);
            }
            if let Some(oblateness) = bodies[i].oblateness() {
                let a = oblateness.acceleration(mu_i, &r);
                accelerations[j] += a;
                accelerations[i] -= a * (mu_j / mu_i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ASTRONOMICAL_UNIT, DPI, SOLAR_GRAVITATIONAL_PARAMETER};
    use crate::geometry::{Barycentric, Vector};
    use crate::integrators::FixedStepIntegrator;
    use crate::physics::discrete_trajectory::{DiscreteTrajectory, TRUNK};
    use crate::physics::massive_body::Oblateness;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    const EARTH_MU: f64 = 3.986_004_418e14;

    fn earth_at_rest(step: f64) -> Ephemeris<Barycentric> {
        let earth = MassiveBody::new("Earth", EARTH_MU, 6.371e6).unwrap();
        let parameters = EphemerisParameters::builder()
            .fitting_tolerance(1e-3)
            .fixed_step(FixedStepParameters::new(FixedStepIntegrator::Yoshida6, step).unwrap())
            .build()
            .unwrap();
        Ephemeris::new(
            vec![earth],
            &[DegreesOfFreedom::default()],
            Instant::J2000,
            parameters,
        )
        .unwrap()
    }

    fn circular_orbiter(radius: f64) -> DiscreteTrajectory<Barycentric> {
        let mut trajectory = DiscreteTrajectory::new();
        trajectory.append(
            TRUNK,
            Instant::J2000,
            DegreesOfFreedom::new(
                Position::new(radius, 0.0, 0.0),
                Vector::new(0.0, (EARTH_MU / radius).sqrt(), 0.0),
            ),
        );
        trajectory
    }

    fn free_fall() -> IntrinsicAcceleration<Barycentric> {
        Box::new(no_intrinsic_acceleration::<Barycentric>)
    }

    fn tight_parameters() -> AdaptiveStepParameters {
        AdaptiveStepParameters::builder()
            .max_steps(100_000)
            .length_integration_tolerance(1e-4)
            .speed_integration_tolerance(1e-7)
            .build()
            .unwrap()
    }

    #[test]
    fn test_invalid_construction() {
        let parameters = EphemerisParameters::default();
        assert!(matches!(
            Ephemeris::<Barycentric>::new(vec![], &[], Instant::J2000, parameters),
            Err(FlowError::InvalidParameter(_))
        ));
        let sun = MassiveBody::new("Sun", SOLAR_GRAVITATIONAL_PARAMETER, 7e8).unwrap();
        assert!(matches!(
            Ephemeris::<Barycentric>::new(vec![sun], &[], Instant::J2000, parameters),
            Err(FlowError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_prolong_covers_requested_instant() {
        let mut ephemeris = earth_at_rest(10.0);
        assert_eq!(ephemeris.t_max(), Instant::INFINITE_PAST);
        let target = Instant::from_seconds_since_j2000(1234.0);
        ephemeris.prolong(target);
        assert!(ephemeris.t_max() >= target);
        // Fits happen every 8 steps, so the coverage does not overshoot by more than that.
        assert!(ephemeris.t_max() < target + 80.0);
        assert_eq!(ephemeris.t_min(), Instant::J2000);
        assert_eq!(ephemeris.body_index("Earth"), Some(0));
        assert_eq!(ephemeris.body_index("Moon"), None);
    }

    #[test]
    fn test_two_body_circular_orbit() {
        let planet_mu = EARTH_MU;
        let total_mu = SOLAR_GRAVITATIONAL_PARAMETER + planet_mu;
        let d = ASTRONOMICAL_UNIT;
        let omega = (total_mu / (d * d * d)).sqrt();
        let sun_radius = -d * planet_mu / total_mu;
        let planet_radius = d * SOLAR_GRAVITATIONAL_PARAMETER / total_mu;
        let state = |radius: f64, t: f64| {
            let (s, c) = (omega * t).sin_cos();
            DegreesOfFreedom::<Barycentric>::new(
                Position::new(radius * c, radius * s, 0.0),
                Vector::new(-radius * omega * s, radius * omega * c, 0.0),
            )
        };

        let parameters = EphemerisParameters::builder()
            .fitting_tolerance(1.0)
            .fixed_step(FixedStepParameters::new(FixedStepIntegrator::Yoshida6, 3600.0).unwrap())
            .build()
            .unwrap();
        let mut ephemeris = Ephemeris::new(
            vec![
                MassiveBody::new("Sun", SOLAR_GRAVITATIONAL_PARAMETER, 6.957e8).unwrap(),
                MassiveBody::new("Earth", planet_mu, 6.371e6).unwrap(),
            ],
            &[state(sun_radius, 0.0), state(planet_radius, 0.0)],
            Instant::J2000,
            parameters,
        )
        .unwrap();
        let end = 30.0 * 86_400.0;
        ephemeris.prolong(Instant::from_seconds_since_j2000(end));

        for k in 0..=60 {
            let t = k as f64 * end / 60.0;
            let time = Instant::from_seconds_since_j2000(t);
            let planet = ephemeris.trajectory(1).evaluate_degrees_of_freedom(time).unwrap();
            let expected = state(planet_radius, t);
            assert!((planet.position - expected.position).norm() < 10.0);
            assert!((planet.velocity - expected.velocity).norm() < 1e-3);
        }
    }

    #[test]
    fn test_oblateness_conserves_momentum() {
        let bodies = vec![
            MassiveBody::new("Earth", EARTH_MU, 6.371e6)
                .unwrap()
                .with_oblateness(
                    Oblateness::new(1.08e-3, 6.378e6, Vector3::new(0.0, 0.3, 1.0)).unwrap(),
                ),
            MassiveBody::new("Moon", 4.904_869_5e12, 1.737e6).unwrap(),
        ];
        let q = [Vector3::new(0.0, 0.0, 0.0), Vector3::new(3.8e8, 1e7, 4e7)];
        let mut a = [Vector3::zeros(); 2];
        compute_massive_accelerations(&bodies, &q, &mut a);
        let momentum_rate = a[0] * bodies[0].gravitational_parameter()
            + a[1] * bodies[1].gravitational_parameter();
        assert!(momentum_rate.norm() <= 1e-12 * (a[0].norm() * EARTH_MU));

        // The moon feels more than the point mass of the Earth.
        let point_mass = q[0] - q[1];
        let point_mass = point_mass * (EARTH_MU / point_mass.norm().powi(3));
        assert!((a[1] - point_mass).norm() > 1e-9 * point_mass.norm());
    }

    #[test]
    fn test_gravitational_acceleration_on_massless_body() {
        let mut ephemeris = earth_at_rest(10.0);
        let position = Position::<Barycentric>::new(7.0e6, 0.0, 0.0);
        assert!(matches!(
            ephemeris.compute_gravitational_acceleration_on_massless_body(&position, Instant::J2000),
            Err(FlowError::OutOfRange { .. })
        ));
        ephemeris.prolong(Instant::from_seconds_since_j2000(100.0));
        let a = ephemeris
            .compute_gravitational_acceleration_on_massless_body(&position, Instant::J2000)
            .unwrap();
        assert_relative_eq!(a.coordinates().x, -EARTH_MU / 4.9e13, max_relative = 1e-12);
        assert_eq!(a.coordinates().y, 0.0);
    }

    #[test]
    fn test_adaptive_flow_closes_circular_orbit() {
        let radius: f64 = 7.0e6;
        let period = DPI * (radius.powi(3) / EARTH_MU).sqrt();
        let mut ephemeris = earth_at_rest(60.0);
        let mut vessel = circular_orbiter(radius);
        let end = Instant::from_seconds_since_j2000(period);

        let reached = ephemeris.flow_with_adaptive_step(
            vessel.trunk_mut(),
            &no_intrinsic_acceleration::<Barycentric>,
            end,
            &tight_parameters(),
            UNLIMITED_MAX_EPHEMERIS_STEPS,
            false,
        )
        .unwrap();
        assert!(reached);
        assert!(vessel.size(TRUNK) > 10);
        let (t, dof) = vessel.last(TRUNK).unwrap();
        assert_eq!(t, end);
        assert_abs_diff_eq!(dof.position.coordinates().x, radius, epsilon = 1.0);
        assert_abs_diff_eq!(dof.position.coordinates().y, 0.0, epsilon = 1.0);
        for (_, dof) in vessel.iter(TRUNK) {
            assert_abs_diff_eq!(dof.position.coordinates().norm(), radius, epsilon = 1.0);
        }
    }

    #[test]
    fn test_adaptive_flow_last_point_only() {
        let mut ephemeris = earth_at_rest(60.0);
        let mut vessel = circular_orbiter(7.0e6);
        let reached = ephemeris.flow_with_adaptive_step(
            vessel.trunk_mut(),
            &no_intrinsic_acceleration::<Barycentric>,
            Instant::from_seconds_since_j2000(1000.0),
            &tight_parameters(),
            UNLIMITED_MAX_EPHEMERIS_STEPS,
            true,
        )
        .unwrap();
        assert!(reached);
        assert_eq!(vessel.size(TRUNK), 2);
    }

    #[test]
    fn test_adaptive_flow_within_ephemeris_budget() {
        let mut ephemeris = earth_at_rest(60.0);
        let mut vessel = circular_orbiter(7.0e6);
        let reached = ephemeris.flow_with_adaptive_step(
            vessel.trunk_mut(),
            &no_intrinsic_acceleration::<Barycentric>,
            Instant::from_seconds_since_j2000(5000.0),
            &tight_parameters(),
            20,
            false,
        )
        .unwrap();
        assert!(!reached);
        // 20 steps give 2 fits of 8 steps.
        assert_eq!(ephemeris.t_max(), Instant::from_seconds_since_j2000(960.0));
        assert_eq!(vessel.last(TRUNK).unwrap().0, ephemeris.t_max());

        let reached = ephemeris.flow_with_adaptive_step(
            vessel.trunk_mut(),
            &no_intrinsic_acceleration::<Barycentric>,
            Instant::from_seconds_since_j2000(5000.0),
            &tight_parameters(),
            UNLIMITED_MAX_EPHEMERIS_STEPS,
            false,
        )
        .unwrap();
        assert!(reached);
    }

    #[test]
    fn test_adaptive_flow_with_intrinsic_acceleration() {
        let mut ephemeris = earth_at_rest(60.0);
        let mut vessel = DiscreteTrajectory::<Barycentric>::new();
        let far = 1.0e13;
        vessel.append(
            TRUNK,
            Instant::J2000,
            DegreesOfFreedom::new(Position::new(far, 0.0, 0.0), Vector::new(0.0, 5.0, 0.0)),
        );
        let thrust = |_t: Instant| Acceleration::<Barycentric>::new(0.0, 0.0, 2.0);
        assert!(ephemeris.flow_with_adaptive_step(
            vessel.trunk_mut(),
            &thrust,
            Instant::from_seconds_since_j2000(100.0),
            &tight_parameters(),
            UNLIMITED_MAX_EPHEMERIS_STEPS,
            true,
        )
        .unwrap());
        let (_, dof) = vessel.last(TRUNK).unwrap();
        assert_abs_diff_eq!(dof.velocity.coordinates().z, 200.0, epsilon = 1e-6);
        assert_abs_diff_eq!(dof.position.coordinates().z, 10_000.0, epsilon = 1e-3);
        assert_abs_diff_eq!(dof.position.coordinates().y, 500.0, epsilon = 1e-3);
    }

    #[test]
    fn test_fixed_step_flow() {
        let mut ephemeris = earth_at_rest(60.0);
        let far = 1.0e12;
        let start = Instant::from_seconds_since_j2000(100.0);
        let initial = [
            DegreesOfFreedom::<Barycentric>::new(
                Position::new(far, 0.0, 0.0),
                Vector::new(0.0, 0.0, 0.0),
            ),
            DegreesOfFreedom::new(Position::new(0.0, far, 0.0), Vector::new(3.0, 0.0, 0.0)),
        ];
        let mut first = DiscreteTrajectory::new();
        let mut second = DiscreteTrajectory::new();
        first.append(TRUNK, start, initial[0]);
        second.append(TRUNK, start, initial[1]);

        let thrust: IntrinsicAcceleration<Barycentric> =
            Box::new(|_| Acceleration::new(1.0, 0.0, 0.0));
        let coast: IntrinsicAcceleration<Barycentric> =
            Box::new(no_intrinsic_acceleration::<Barycentric>);
        let mut instance = ephemeris.new_instance(
            start,
            &initial,
            vec![thrust, coast],
            FixedStepParameters::new(FixedStepIntegrator::Yoshida4, 100.0).unwrap(),
        );
        ephemeris
            .flow_with_fixed_step(
                Instant::from_seconds_since_j2000(1150.0),
                &mut instance,
                &mut [first.trunk_mut(), second.trunk_mut()],
            )
            .unwrap();

        assert_eq!(instance.time(), Instant::from_seconds_since_j2000(1100.0));
        assert_eq!(first.size(TRUNK), 11);
        assert_eq!(second.size(TRUNK), 11);
        let (_, pushed) = first.last(TRUNK).unwrap();
        assert_abs_diff_eq!(pushed.velocity.coordinates().x, 1000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(pushed.position.coordinates().x, far + 5.0e5, epsilon = 1e-2);
        let coasting = instance.degrees_of_freedom(1);
        assert_abs_diff_eq!(coasting.position.coordinates().x, 3000.0, epsilon = 1e-2);
    }

    #[test]
    fn test_fixed_step_flow_covers_substeps() {
        let radius = 7.0e6;
        let mut ephemeris = earth_at_rest(10.0);
        let start = Instant::from_seconds_since_j2000(100.0);
        ephemeris.prolong(start);
        let mut vessel = circular_orbiter(radius);
        let (_, initial) = vessel.last(TRUNK).unwrap();
        let mut instance = ephemeris.new_instance(
            start,
            &[initial],
            vec![free_fall()],
            FixedStepParameters::new(FixedStepIntegrator::Yoshida6, 10.0).unwrap(),
        );

        let end = Instant::from_seconds_since_j2000(200.0);
        ephemeris
            .flow_with_fixed_step(end, &mut instance, &mut [vessel.trunk_mut()])
            .unwrap();
        assert_eq!(instance.time(), end);
        let (_, latest) = FixedStepIntegrator::Yoshida6.substep_offsets(10.0);
        assert!(ephemeris.t_max() >= end + latest);

        // Step right up to the coverage of the ephemeris, and past it.
        let beyond = ephemeris.t_max() + 25.0;
        ephemeris
            .flow_with_fixed_step(beyond, &mut instance, &mut [vessel.trunk_mut()])
            .unwrap();
        assert!(instance.time() + 10.0 > beyond);
        assert!(ephemeris.t_max() >= instance.time() + latest);
        for (_, dof) in vessel.iter(TRUNK) {
            assert_abs_diff_eq!(dof.position.coordinates().norm(), radius, epsilon = 1.0);
        }
    }

    #[test]
    fn test_fixed_step_flow_before_ephemeris() {
        let mut ephemeris = earth_at_rest(10.0);
        let mut vessel = circular_orbiter(7.0e6);
        let (_, initial) = vessel.last(TRUNK).unwrap();
        let mut instance = ephemeris.new_instance(
            Instant::J2000,
            &[initial],
            vec![free_fall()],
            FixedStepParameters::new(FixedStepIntegrator::Yoshida6, 10.0).unwrap(),
        );
        let result = ephemeris.flow_with_fixed_step(
            Instant::from_seconds_since_j2000(100.0),
            &mut instance,
            &mut [vessel.trunk_mut()],
        );
        let Err(FlowError::OutOfRange { t, t_min, .. }) = result else {
            panic!("expected an out of range error, got {result:?}");
        };
        assert!(t < Instant::J2000);
        assert_eq!(t_min, Instant::J2000);
        assert_eq!(instance.time(), Instant::J2000);
        assert_eq!(vessel.size(TRUNK), 1);

        // The leapfrog stays within its steps.
        let mut instance = ephemeris.new_instance(
            Instant::J2000,
            &[initial],
            vec![free_fall()],
            FixedStepParameters::new(FixedStepIntegrator::Leapfrog, 10.0).unwrap(),
        );
        ephemeris
            .flow_with_fixed_step(
                Instant::from_seconds_since_j2000(100.0),
                &mut instance,
                &mut [vessel.trunk_mut()],
            )
            .unwrap();
        assert_eq!(vessel.size(TRUNK), 11);
    }

    #[test]
    fn test_adaptive_flow_before_ephemeris() {
        let mut ephemeris = earth_at_rest(60.0);
        let mut vessel = DiscreteTrajectory::<Barycentric>::new();
        vessel.append(
            TRUNK,
            Instant::from_seconds_since_j2000(-100.0),
            DegreesOfFreedom::new(Position::new(7.0e6, 0.0, 0.0), Vector::new(0.0, 7.5e3, 0.0)),
        );
        let result = ephemeris.flow_with_adaptive_step(
            vessel.trunk_mut(),
            &no_intrinsic_acceleration::<Barycentric>,
            Instant::from_seconds_since_j2000(100.0),
            &tight_parameters(),
            UNLIMITED_MAX_EPHEMERIS_STEPS,
            false,
        );
        assert!(matches!(result, Err(FlowError::OutOfRange { .. })));
        assert_eq!(vessel.size(TRUNK), 1);
    }

    #[test]
    fn test_message_round_trip() {
        let mut ephemeris = earth_at_rest(10.0);
        ephemeris.prolong(Instant::from_seconds_since_j2000(500.0));
        let message = ephemeris.write_to_message();
        let mut read = Ephemeris::<Barycentric>::read_from_message(&message).unwrap();
        assert_eq!(read, ephemeris);
        assert_eq!(read.write_to_message(), message);

        let later = Instant::from_seconds_since_j2000(2000.0);
        read.prolong(later);
        ephemeris.prolong(later);
        assert_eq!(read.write_to_message(), ephemeris.write_to_message());
    }
}
