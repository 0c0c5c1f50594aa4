//! Reference frame tags.
//!
//! Frames are zero-sized marker types. They never hold data: they only parametrise
//! [`Vector`](super::vector::Vector) and [`Position`](super::vector::Position) so that a
//! displacement expressed in one frame cannot be added to a position expressed in another.
//!
//! Each frame carries a stable numeric tag that is written into serialised messages and
//! checked when reading them back.

use std::fmt::Debug;

use crate::flow_errors::FlowError;

pub trait Frame: Copy + Clone + Debug + Default + PartialEq + 'static {
    /// Tag written in messages.
    const TAG: i32;
    const NAME: &'static str;

    /// Check that a tag read from a message designates this frame.
    fn check_tag(tag: i32) -> Result<(), FlowError> {
        if tag == Self::TAG {
            Ok(())
        } else {
            Err(FlowError::InvalidMessage(format!(
                "frame tag {tag} does not designate {}",
                Self::NAME
            )))
        }
    }
}

/// Non-rotating inertial frame centred on the barycentre of the massive bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Barycentric;

/// Frame attached to a pile-up: non-rotating, with its origin at the barycentre of the
/// members at the time the offsets were last rebased.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RigidPileUp;

/// Frame of the external physics engine in which apparent part states are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApparentBubble;

impl Frame for Barycentric {
    const TAG: i32 = 1;
    const NAME: &'static str = "Barycentric";
}

impl Frame for RigidPileUp {
    const TAG: i32 = 2;
    const NAME: &'static str = "RigidPileUp";
}

impl Frame for ApparentBubble {
    const TAG: i32 = 3;
    const NAME: &'static str = "ApparentBubble";
}
