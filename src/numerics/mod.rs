//! # Polynomial approximation
//!
//! - [`chebyshev_series`] – evaluation of vector-valued Chebyshev series (Clenshaw recurrence)
//! - [`newhall`] – least-squares fit of a series to sampled positions and velocities
//! - [`hermite`] – cubic Hermite interpolation, used to locate extrema between samples

pub mod chebyshev_series;
pub mod hermite;
pub mod newhall;

pub use chebyshev_series::ChebyshevSeries;
pub use hermite::Hermite3;
pub use newhall::{newhall_approximation, NEWHALL_SAMPLES};
