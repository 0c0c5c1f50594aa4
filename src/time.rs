//! # Instants on the TDB time line
//!
//! Every trajectory in this crate is keyed by an [`Instant`]: a totally ordered count of
//! TDB seconds elapsed since J2000.0 (2000-01-01 12:00:00 TDB). Differences of instants are
//! plain [`Time`] values in seconds.
//!
//! Conversions from and to calendar dates go through [`hifitime::Epoch`], so callers can
//! use any time scale `hifitime` understands when they build initial states.
//!
//! See also
//! -----------------
//! * [`crate::physics::discrete_trajectory::DiscreteTrajectory`] – timelines keyed by `Instant`.
//! * [`crate::physics::continuous_trajectory::ContinuousTrajectory`] – segment coverage in `Instant`.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use hifitime::{Duration, Epoch, TimeScale};

use crate::constants::Time;
use crate::flow_errors::FlowError;

/// A point on the TDB time line, in seconds since J2000.0.
///
/// `Instant` wraps an `f64` but implements [`Ord`] through [`f64::total_cmp`], so it can be
/// used as a `BTreeMap` key and in binary searches.
#[derive(Debug, Clone, Copy, Default)]
pub struct Instant(f64);

impl Instant {
    /// J2000.0 itself.
    pub const J2000: Instant = Instant(0.0);

    /// Lower bound of the coverage of an empty trajectory.
    pub const INFINITE_PAST: Instant = Instant(f64::NEG_INFINITY);

    /// Upper bound of the coverage of an empty trajectory.
    pub const INFINITE_FUTURE: Instant = Instant(f64::INFINITY);

    pub const fn from_seconds_since_j2000(seconds: f64) -> Self {
        Instant(seconds)
    }

    pub const fn seconds_since_j2000(&self) -> f64 {
        self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }

    /// Convert a `hifitime` epoch (any time scale) to an instant.
    pub fn from_epoch(epoch: Epoch) -> Self {
        let j2000 = Epoch::from_gregorian_hms(2000, 1, 1, 12, 0, 0, TimeScale::TDB);
        Instant((epoch.to_time_scale(TimeScale::TDB) - j2000).to_seconds())
    }

    /// Convert this instant to a `hifitime` epoch in the TDB time scale.
    pub fn to_epoch(&self) -> Epoch {
        let j2000 = Epoch::from_gregorian_hms(2000, 1, 1, 12, 0, 0, TimeScale::TDB);
        j2000 + Duration::from_seconds(self.0)
    }
}

impl PartialEq for Instant {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Instant {}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add<Time> for Instant {
    type Output = Instant;

    fn add(self, rhs: Time) -> Instant {
        Instant(self.0 + rhs)
    }
}

impl AddAssign<Time> for Instant {
    fn add_assign(&mut self, rhs: Time) {
        self.0 += rhs;
    }
}

impl Sub<Time> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Time) -> Instant {
        Instant(self.0 - rhs)
    }
}

impl Sub for Instant {
    type Output = Time;

    fn sub(self, rhs: Instant) -> Time {
        self.0 - rhs.0
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "J2000 + {} s", self.0)
    }
}

/// Parse a date string understood by `hifitime` (e.g. `"2000-01-01T12:00:00 TDB"`) into an
/// [`Instant`].
///
/// Arguments
/// -----------------
/// * `date`: an ISO 8601 date, optionally followed by a time scale name.
///
/// Return
/// ----------
/// * the corresponding instant, or [`FlowError::InvalidDate`] if `hifitime` rejects the string.
pub fn date_to_instant(date: &str) -> Result<Instant, FlowError> {
    Epoch::from_str(date)
        .map(Instant::from_epoch)
        .map_err(|e| FlowError::InvalidDate(format!("{date}: {e}")))
}

#[cfg(test)]
mod time_test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_j2000_round_trip() {
        let t = date_to_instant("2000-01-01T12:00:00 TDB").unwrap();
        assert_abs_diff_eq!(t.seconds_since_j2000(), 0.0, epsilon = 1e-6);

        let t = Instant::from_seconds_since_j2000(86_400.5);
        let back = Instant::from_epoch(t.to_epoch());
        assert_abs_diff_eq!(back.seconds_since_j2000(), 86_400.5, epsilon = 1e-6);
    }

    #[test]
    fn test_one_day_later() {
        let t = date_to_instant("2000-01-02T12:00:00 TDB").unwrap();
        assert_abs_diff_eq!(t.seconds_since_j2000(), 86_400.0, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_date() {
        assert!(matches!(
            date_to_instant("not a date"),
            Err(FlowError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_ordering() {
        let t0 = Instant::J2000;
        let t1 = t0 + 10.0;
        assert!(t0 < t1);
        assert_eq!(t1 - t0, 10.0);
        assert!(Instant::INFINITE_PAST < t0);
        assert!(Instant::INFINITE_FUTURE > t1);
        assert_eq!(t1 - 10.0, t0);
    }
}
