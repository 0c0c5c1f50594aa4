//! Apsides of a trajectory with respect to a massive body.
//!
//! An apsis is a local extremum of the distance between a body and a reference body. Between
//! two consecutive samples where the radial velocity `d|r|/dt` changes sign, the squared
//! distance is interpolated by a cubic Hermite polynomial (its derivative `2·r·ṙ` is known
//! at both samples), and the extremum of that cubic gives the time of the apsis. The degrees
//! of freedom of the body at that time are interpolated the same way from its positions and
//! velocities.

use itertools::Itertools;

use crate::flow_errors::FlowError;
use crate::geometry::{DegreesOfFreedom, Frame, Position, Velocity};
use crate::numerics::Hermite3;
use crate::physics::continuous_trajectory::ContinuousTrajectory;
use crate::physics::discrete_trajectory::{DiscreteTrajectory, ForkId, TRUNK};
use crate::time::Instant;

struct Sample<F: Frame> {
    time: Instant,
    degrees_of_freedom: DegreesOfFreedom<F>,
    squared_distance: f64,
    /// `r·ṙ`, half the derivative of the squared distance.
    radial: f64,
}

/// Append to the trunks of `apoapsides` and `periapsides` the apsides, with respect to
/// `reference`, of the points of the path of `fork` in `[begin, end)`.
///
/// Fails with [`FlowError::OutOfRange`] if `reference` does not cover one of those points.
///
/// # Panics
/// If an apsis is not after the last point already in its output trajectory.
pub fn compute_apsides<F: Frame>(
    reference: &ContinuousTrajectory<F>,
    trajectory: &DiscreteTrajectory<F>,
    fork: ForkId,
    begin: Instant,
    end: Instant,
    apoapsides: &mut DiscreteTrajectory<F>,
    periapsides: &mut DiscreteTrajectory<F>,
) -> Result<(), FlowError> {
    let samples = trajectory
        .iter(fork)
        .skip_while(|(t, _)| *t < begin)
        .take_while(|(t, _)| *t < end)
        .map(|(time, degrees_of_freedom)| {
            let centre = reference.evaluate_degrees_of_freedom(time)?;
            let r = degrees_of_freedom.position - centre.position;
            let v = degrees_of_freedom.velocity - centre.velocity;
            Ok(Sample {
                time,
                degrees_of_freedom: *degrees_of_freedom,
                squared_distance: r.norm_squared(),
                radial: r.dot(&v),
            })
        })
        .collect::<Result<Vec<_>, FlowError>>()?;

    for (previous, sample) in samples.iter().tuple_windows() {
        let is_apoapsis = previous.radial > 0.0 && sample.radial <= 0.0;
        let is_periapsis = previous.radial < 0.0 && sample.radial >= 0.0;
        if is_apoapsis || is_periapsis {
            let (time, apsis) = interpolate_apsis(previous, sample);
            let output = if is_apoapsis {
                &mut *apoapsides
            } else {
                &mut *periapsides
            };
            output.append(TRUNK, time, apsis);
        }
    }
    Ok(())
}

fn interpolate_apsis<F: Frame>(
    before: &Sample<F>,
    after: &Sample<F>,
) -> (Instant, DegreesOfFreedom<F>) {
    let times = (before.time, after.time);
    let squared_distance = Hermite3::new(
        times,
        (before.squared_distance, after.squared_distance),
        (2.0 * before.radial, 2.0 * after.radial),
    );
    // The sign change guarantees an extremum of the cubic; rounding may still push it out of
    // the interval, in which case the sample closest to it is used.
    let time = squared_distance
        .find_extrema()
        .first()
        .copied()
        .unwrap_or(if before.radial.abs() < after.radial.abs() {
            before.time
        } else {
            after.time
        });

    let position = Hermite3::new(
        times,
        (
            *before.degrees_of_freedom.position.coordinates(),
            *after.degrees_of_freedom.position.coordinates(),
        ),
        (
            *before.degrees_of_freedom.velocity.coordinates(),
            *after.degrees_of_freedom.velocity.coordinates(),
        ),
    );
    (
        time,
        DegreesOfFreedom::new(
            Position::from_coordinates(position.evaluate(time)),
            Velocity::from_coordinates(position.evaluate_derivative(time)),
        ),
    )
}
