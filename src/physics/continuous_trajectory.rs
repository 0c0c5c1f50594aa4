//! # Chebyshev-compressed trajectories of massive bodies
//!
//! A [`ContinuousTrajectory`] stores the motion of one massive body as a sequence of
//! [`ChebyshevSeries`] segments whose intervals are contiguous and non-overlapping. Any instant
//! of the covered range `[t_min, t_max]` can be evaluated in logarithmic time in the number of
//! segments.
//!
//! ## Growth policy
//!
//! The trajectory is fed one fixed-step sample at a time by the ephemeris
//! ([`ContinuousTrajectory::append`]). The samples of the *open* (last) segment are kept
//! densely until that segment is frozen:
//!
//! 1. Every [`STEPS_PER_NEWHALL_FIT`] steps, the whole open segment is refitted with the
//!    degree of the last segment, from a uniform 9-point subsample. If the fit is within the
//!    fitting tolerance at *every* dense sample and the segment spans at most
//!    [`MAX_STEPS_PER_SEGMENT`] steps, the last series is replaced by the longer one.
//! 2. Otherwise the last series is frozen as it is, and a new segment is started over the
//!    last [`STEPS_PER_NEWHALL_FIT`] steps. Its degree is searched starting one below the
//!    previous degree, then climbing until the tolerance is met (or the maximal degree is
//!    reached, which is reported as a warning).
//!
//! Segments therefore cover the longest interval the current degree can represent, and the
//! degree adapts to the local curvature of the motion.
//!
//! Positions are fitted relative to the first sample of the segment, so that the fit error
//! does not depend on the distance of the body to the origin of the frame.
//!
//! See also
//! -----------------
//! * [`crate::numerics::newhall`] – the fit itself.
//! * [`crate::physics::ephemeris::Ephemeris`] – the owner and only writer of these trajectories.

use std::marker::PhantomData;

use itertools::Itertools;
use nalgebra::Vector3;
use tracing::{trace, warn};

use crate::constants::{
    Length, Time, MAX_NEWHALL_DEGREE, MAX_STEPS_PER_SEGMENT, MIN_NEWHALL_DEGREE,
    STEPS_PER_NEWHALL_FIT,
};
use crate::flow_errors::FlowError;
use crate::geometry::{DegreesOfFreedom, Frame, Position, Velocity};
use crate::numerics::{newhall_approximation, ChebyshevSeries, NEWHALL_SAMPLES};
use crate::serialization::{
    read_timed_degrees_of_freedom, write_timed_degrees_of_freedom, ContinuousTrajectoryMessage,
};
use crate::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousTrajectory<F: Frame> {
    step: Time,
    tolerance: Length,
    series: Vec<ChebyshevSeries>,
    /// Degree of the last segment; the next degree search starts from it.
    degree: usize,
    /// Dense samples of the open segment; the first one is the end of the previous segment.
    open_samples: Vec<(Instant, DegreesOfFreedom<F>)>,
    /// Whether the last element of `series` covers `open_samples`.
    open_segment_fitted: bool,
    _frame: PhantomData<F>,
}

impl<F: Frame> ContinuousTrajectory<F> {
    /// An empty trajectory fed every `step` seconds and fitted within `tolerance` metres.
    pub fn new(step: Time, tolerance: Length) -> Result<Self, FlowError> {
        if !(step > 0.0 && step.is_finite()) {
            return Err(FlowError::InvalidParameter(format!(
                "continuous trajectory step must be positive, got {step}"
            )));
        }
        if !(tolerance > 0.0) {
            return Err(FlowError::InvalidParameter(format!(
                "fitting tolerance must be positive, got {tolerance}"
            )));
        }
        Ok(ContinuousTrajectory {
            step,
            tolerance,
            series: Vec::new(),
            degree: MIN_NEWHALL_DEGREE,
            open_samples: Vec::new(),
            open_segment_fitted: false,
            _frame: PhantomData,
        })
    }

    pub fn step(&self) -> Time {
        self.step
    }

    pub fn tolerance(&self) -> Length {
        self.tolerance
    }

    /// True until the first segment has been fitted.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    pub fn segments(&self) -> &[ChebyshevSeries] {
        &self.series
    }

    /// Degree of the most recent segment.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Start of the coverage; [`Instant::INFINITE_FUTURE`] when empty.
    pub fn t_min(&self) -> Instant {
        self.series
            .first()
            .map_or(Instant::INFINITE_FUTURE, ChebyshevSeries::t_min)
    }

    /// End of the coverage; [`Instant::INFINITE_PAST`] when empty.
    pub fn t_max(&self) -> Instant {
        self.series
            .last()
            .map_or(Instant::INFINITE_PAST, ChebyshevSeries::t_max)
    }

    /// Time of the most recent sample, fitted or not.
    pub fn last_sample_time(&self) -> Option<Instant> {
        self.open_samples.last().map(|(t, _)| *t)
    }

    /// Feed the sample of the next fixed step.
    ///
    /// # Panics
    /// If `t` is not one step after the previous sample.
    pub fn append(&mut self, t: Instant, degrees_of_freedom: DegreesOfFreedom<F>) {
        if let Some(&(last, _)) = self.open_samples.last() {
            assert!(
                t > last && ((t - last) - self.step).abs() <= 1e-6 * self.step,
                "sample at {t} does not follow {last} by one step of {} s",
                self.step
            );
        }
        self.open_samples.push((t, degrees_of_freedom));
        let steps = self.open_samples.len() - 1;
        if steps > 0 && steps % STEPS_PER_NEWHALL_FIT == 0 {
            self.fit_open_segment();
        }
    }

    fn fit_open_segment(&mut self) {
        let steps = self.open_samples.len() - 1;
        if self.open_segment_fitted {
            if steps <= MAX_STEPS_PER_SEGMENT {
                let (series, error) = self.fit(self.degree);
                if error <= self.tolerance {
                    trace!(
                        degree = self.degree,
                        t_min = %series.t_min(),
                        t_max = %series.t_max(),
                        error,
                        "extended Chebyshev segment"
                    );
                    if let Some(last) = self.series.last_mut() {
                        *last = series;
                    }
                    return;
                }
            }
            // Freeze the last series and restart from the most recent fit window.
            self.open_samples
                .drain(..steps - STEPS_PER_NEWHALL_FIT);
            self.open_segment_fitted = false;
        }

        let series = self.fit_new_segment();
        self.series.push(series);
        self.open_segment_fitted = true;
    }

    /// Degree search for a segment of `STEPS_PER_NEWHALL_FIT` steps.
    fn fit_new_segment(&mut self) -> ChebyshevSeries {
        if self.degree > MIN_NEWHALL_DEGREE {
            let (series, error) = self.fit(self.degree - 1);
            if error <= self.tolerance {
                self.degree -= 1;
                trace!(degree = self.degree, error, "lowered Chebyshev degree");
                return series;
            }
        }
        let mut degree = self.degree;
        loop {
            let (series, error) = self.fit(degree);
            if error <= self.tolerance {
                self.degree = degree;
                trace!(
                    degree,
                    t_min = %series.t_min(),
                    t_max = %series.t_max(),
                    error,
                    "new Chebyshev segment"
                );
                return series;
            }
            if degree == MAX_NEWHALL_DEGREE {
                warn!(
                    degree,
                    error,
                    tolerance = self.tolerance,
                    t_min = %series.t_min(),
                    "fitting tolerance not met at the maximal Chebyshev degree"
                );
                self.degree = degree;
                return series;
            }
            degree += 1;
        }
    }

    /// Fit the open samples at the given degree; returns the series and the largest distance
    /// between the series and a dense sample.
    fn fit(&self, degree: usize) -> (ChebyshevSeries, Length) {
        let steps = self.open_samples.len() - 1;
        let stride = steps / STEPS_PER_NEWHALL_FIT;
        let reference = *self.open_samples[0].1.position.coordinates();

        let mut positions = Vec::with_capacity(NEWHALL_SAMPLES);
        let mut velocities = Vec::with_capacity(NEWHALL_SAMPLES);
        for (_, dof) in self.open_samples.iter().step_by(stride) {
            positions.push(dof.position.coordinates() - reference);
            velocities.push(*dof.velocity.coordinates());
        }
        let t_min = self.open_samples[0].0;
        let t_max = self.open_samples[steps].0;
        let series = newhall_approximation(degree, &positions, &velocities, t_min, t_max);

        let error = self
            .open_samples
            .iter()
            .map(|(t, dof)| {
                (series.evaluate(*t) - (dof.position.coordinates() - reference)).norm()
            })
            .fold(0.0, f64::max);
        (series.translated(&reference), error)
    }

    fn find_series(&self, t: Instant) -> Result<&ChebyshevSeries, FlowError> {
        if self.is_empty() || t < self.t_min() || t > self.t_max() {
            return Err(FlowError::OutOfRange {
                t,
                t_min: self.t_min(),
                t_max: self.t_max(),
            });
        }
        let index = self.series.partition_point(|s| s.t_max() < t);
        Ok(&self.series[index])
    }

    pub fn evaluate_position(&self, t: Instant) -> Result<Position<F>, FlowError> {
        Ok(Position::from_coordinates(self.find_series(t)?.evaluate(t)))
    }

    pub fn evaluate_velocity(&self, t: Instant) -> Result<Velocity<F>, FlowError> {
        Ok(Velocity::from_coordinates(
            self.find_series(t)?.evaluate_derivative(t),
        ))
    }

    pub fn evaluate_degrees_of_freedom(
        &self,
        t: Instant,
    ) -> Result<DegreesOfFreedom<F>, FlowError> {
        let series = self.find_series(t)?;
        Ok(DegreesOfFreedom::new(
            Position::from_coordinates(series.evaluate(t)),
            Velocity::from_coordinates(series.evaluate_derivative(t)),
        ))
    }

    /// Raw coordinates of the position, for the inner loops of the integrators.
    pub(crate) fn evaluate_position_coordinates(
        &self,
        t: Instant,
    ) -> Result<Vector3<f64>, FlowError> {
        Ok(self.find_series(t)?.evaluate(t))
    }

    pub fn write_to_message(&self) -> ContinuousTrajectoryMessage {
        ContinuousTrajectoryMessage {
            frame: F::TAG,
            step: self.step,
            tolerance: self.tolerance,
            degree: self.degree as u32,
            series: self
                .series
                .iter()
                .map(ChebyshevSeries::write_to_message)
                .collect(),
            open_samples: self
                .open_samples
                .iter()
                .map(|(t, dof)| write_timed_degrees_of_freedom(*t, dof))
                .collect(),
            open_segment_fitted: self.open_segment_fitted,
        }
    }

    pub fn read_from_message(message: &ContinuousTrajectoryMessage) -> Result<Self, FlowError> {
        F::check_tag(message.frame)?;
        let mut trajectory = ContinuousTrajectory::new(message.step, message.tolerance)?;
        let degree = message.degree as usize;
        if !(MIN_NEWHALL_DEGREE..=MAX_NEWHALL_DEGREE).contains(&degree) {
            return Err(FlowError::InvalidMessage(format!(
                "continuous trajectory degree {degree} out of range"
            )));
        }
        trajectory.degree = degree;
        trajectory.series = message
            .series
            .iter()
            .map(ChebyshevSeries::read_from_message)
            .collect::<Result<_, _>>()?;
        trajectory.open_samples = message
            .open_samples
            .iter()
            .map(read_timed_degrees_of_freedom)
            .collect::<Result<_, _>>()?;
        trajectory.open_segment_fitted = message.open_segment_fitted;

        let contiguous = trajectory
            .series
            .iter()
            .tuple_windows()
            .all(|(previous, next)| previous.t_max() == next.t_min());
        if !contiguous || (trajectory.open_segment_fitted && trajectory.series.is_empty()) {
            return Err(FlowError::InvalidMessage(
                "continuous trajectory segments are not contiguous".into(),
            ));
        }
        Ok(trajectory)
    }
}
