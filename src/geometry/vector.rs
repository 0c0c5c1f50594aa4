//! Frame-tagged vectors and affine points.
//!
//! [`Vector<F>`] is an element of the vector space attached to frame `F` (displacements,
//! velocities, accelerations and forces all share it, the aliases only document the unit).
//! [`Position<F>`] is a point of the affine space of `F`: positions can be subtracted to give
//! a displacement and translated by a displacement, but not added together.
//!
//! Both wrap a `nalgebra::Vector3<f64>` in SI units.

use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use nalgebra::Vector3;

use super::frames::Frame;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector<F: Frame> {
    coordinates: Vector3<f64>,
    _frame: PhantomData<F>,
}

/// Displacement in metres.
pub type Displacement<F> = Vector<F>;
/// Velocity in m/s.
pub type Velocity<F> = Vector<F>;
/// Acceleration in m/s².
pub type Acceleration<F> = Vector<F>;
/// Force in newtons.
pub type Force<F> = Vector<F>;

impl<F: Frame> Vector<F> {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self::from_coordinates(Vector3::new(x, y, z))
    }

    pub fn zero() -> Self {
        Self::from_coordinates(Vector3::zeros())
    }

    pub fn from_coordinates(coordinates: Vector3<f64>) -> Self {
        Vector {
            coordinates,
            _frame: PhantomData,
        }
    }

    pub fn coordinates(&self) -> &Vector3<f64> {
        &self.coordinates
    }

    pub fn norm(&self) -> f64 {
        self.coordinates.norm()
    }

    pub fn norm_squared(&self) -> f64 {
        self.coordinates.norm_squared()
    }

    pub fn dot(&self, other: &Vector<F>) -> f64 {
        self.coordinates.dot(&other.coordinates)
    }

    pub fn cross(&self, other: &Vector<F>) -> Vector<F> {
        Self::from_coordinates(self.coordinates.cross(&other.coordinates))
    }
}

impl<F: Frame> Default for Vector<F> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<F: Frame> Add for Vector<F> {
    type Output = Vector<F>;

    fn add(self, rhs: Vector<F>) -> Vector<F> {
        Self::from_coordinates(self.coordinates + rhs.coordinates)
    }
}

impl<F: Frame> AddAssign for Vector<F> {
    fn add_assign(&mut self, rhs: Vector<F>) {
        self.coordinates += rhs.coordinates;
    }
}

impl<F: Frame> Sub for Vector<F> {
    type Output = Vector<F>;

    fn sub(self, rhs: Vector<F>) -> Vector<F> {
        Self::from_coordinates(self.coordinates - rhs.coordinates)
    }
}

impl<F: Frame> SubAssign for Vector<F> {
    fn sub_assign(&mut self, rhs: Vector<F>) {
        self.coordinates -= rhs.coordinates;
    }
}

impl<F: Frame> Neg for Vector<F> {
    type Output = Vector<F>;

    fn neg(self) -> Vector<F> {
        Self::from_coordinates(-self.coordinates)
    }
}

impl<F: Frame> Mul<f64> for Vector<F> {
    type Output = Vector<F>;

    fn mul(self, rhs: f64) -> Vector<F> {
        Self::from_coordinates(self.coordinates * rhs)
    }
}

impl<F: Frame> Mul<Vector<F>> for f64 {
    type Output = Vector<F>;

    fn mul(self, rhs: Vector<F>) -> Vector<F> {
        rhs * self
    }
}

impl<F: Frame> Div<f64> for Vector<F> {
    type Output = Vector<F>;

    fn div(self, rhs: f64) -> Vector<F> {
        Self::from_coordinates(self.coordinates / rhs)
    }
}

impl<F: Frame> std::iter::Sum for Vector<F> {
    fn sum<I: Iterator<Item = Vector<F>>>(iter: I) -> Self {
        iter.fold(Vector::zero(), |acc, v| acc + v)
    }
}

/// A point of the affine space of frame `F`, in metres from the frame origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position<F: Frame> {
    coordinates: Vector3<f64>,
    _frame: PhantomData<F>,
}

impl<F: Frame> Position<F> {
    pub fn origin() -> Self {
        Self::from_coordinates(Vector3::zeros())
    }

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self::from_coordinates(Vector3::new(x, y, z))
    }

    pub fn from_coordinates(coordinates: Vector3<f64>) -> Self {
        Position {
            coordinates,
            _frame: PhantomData,
        }
    }

    /// Coordinates relative to the origin of `F`.
    pub fn coordinates(&self) -> &Vector3<f64> {
        &self.coordinates
    }
}

impl<F: Frame> Default for Position<F> {
    fn default() -> Self {
        Self::origin()
    }
}

impl<F: Frame> Sub for Position<F> {
    type Output = Displacement<F>;

    fn sub(self, rhs: Position<F>) -> Displacement<F> {
        Vector::from_coordinates(self.coordinates - rhs.coordinates)
    }
}

impl<F: Frame> Add<Displacement<F>> for Position<F> {
    type Output = Position<F>;

    fn add(self, rhs: Displacement<F>) -> Position<F> {
        Position::from_coordinates(self.coordinates + rhs.coordinates)
    }
}

impl<F: Frame> Sub<Displacement<F>> for Position<F> {
    type Output = Position<F>;

    fn sub(self, rhs: Displacement<F>) -> Position<F> {
        Position::from_coordinates(self.coordinates - rhs.coordinates)
    }
}
