//! # Physical constants and scalar aliases for `nbody_flow`
//!
//! This module centralizes the **physical constants**, **time conversion factors** and the
//! **scalar type aliases** used throughout the crate. All quantities are expressed in SI units
//! (metre, second, kilogram) unless stated otherwise.
//!
//! ## Overview
//!
//! - Gravitational constant and reference masses
//! - Length and time conversion factors (astronomical unit, day, Julian year)
//! - Scalar aliases that document the unit a plain `f64` carries
//! - Numerical limits shared by the integrators and the Chebyshev fitting

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for orbital periods and angle normalisation
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Newtonian constant of gravitation in m³·kg⁻¹·s⁻² (CODATA 2018)
pub const GRAVITATIONAL_CONSTANT: f64 = 6.674_30e-11;

/// Nominal solar mass parameter G·M☉ in m³·s⁻² (IAU 2015 B3)
pub const SOLAR_GRAVITATIONAL_PARAMETER: f64 = 1.327_124_4e20;

/// Astronomical Unit in metres (IAU 2012)
pub const ASTRONOMICAL_UNIT: f64 = 149_597_870_700.0;

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Number of seconds in a Julian year (365.25 days)
pub const JULIAN_YEAR: f64 = 365.25 * SECONDS_PER_DAY;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Duration in seconds
pub type Time = f64;
/// Length in metres
pub type Length = f64;
/// Speed in metres per second
pub type Speed = f64;
/// Mass in kilograms
pub type Mass = f64;
/// Gravitational parameter μ = G·M in m³·s⁻²
pub type GravitationalParameter = f64;

// -------------------------------------------------------------------------------------------------
// Numerical limits
// -------------------------------------------------------------------------------------------------

/// Lowest degree accepted by the Newhall approximation (four endpoint constraints)
pub const MIN_NEWHALL_DEGREE: usize = 3;

/// Highest degree accepted by the Newhall approximation
pub const MAX_NEWHALL_DEGREE: usize = 17;

/// Number of fixed steps between two attempts to fit a Chebyshev segment
pub const STEPS_PER_NEWHALL_FIT: usize = 8;

/// Longest span, in fixed steps, that a single Chebyshev segment may cover
pub const MAX_STEPS_PER_SEGMENT: usize = 128;
