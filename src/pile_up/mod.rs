//! # Pile-ups: rigid clusters of parts
//!
//! A [`PileUp`] groups parts that are in contact and integrates them as a single point mass
//! located at their barycentre. The motion of that barycentre in [`Barycentric`] is the
//! *psychohistory* of the pile-up; each part keeps a fixed offset from the barycentre,
//! expressed in the [`RigidPileUp`] frame.
//!
//! ## Life cycle
//!
//! 1. **Construction** – the barycentre of the parts becomes the first point of the
//!    psychohistory, and the offsets of the parts from it are recorded.
//! 2. **Deformation** – an external physics engine may report the *apparent* degrees of
//!    freedom of the parts in the [`ApparentBubble`] frame
//!    ([`PileUp::set_part_apparent_degrees_of_freedom`]). Once all of them are known,
//!    [`PileUp::deform_pile_up_if_needed`] rebases the offsets on them.
//! 3. **Advance** – [`PileUp::advance_time`] integrates the barycentre with an
//!    [`EphemerisFlow`]. Without intrinsic force, the psychohistory is extended by fixed steps
//!    (authoritative) followed by one adaptive step to the requested instant (speculative);
//!    the next advance discards the speculative point and resumes from the last fixed step.
//!    With an intrinsic force, the fixed-step integration is abandoned and the barycentre is
//!    integrated adaptively with the acceleration `F/m`. The new points are then appended to
//!    the tails of the parts, with the same authoritative or speculative status.
//! 4. **Nudge** – [`PileUp::nudge_parts`] writes the degrees of freedom of the parts at the
//!    end of the psychohistory back onto them.
//!
//! Parts live in a [`Parts`] arena owned by the caller; the pile-up refers to them by
//! [`PartId`]. Using an id that is not in the arena, or that is not a member of the pile-up,
//! is a programming error and panics; the ids of a [`PileUpMessage`] are checked instead.

pub mod part;

use std::collections::BTreeMap;

use tracing::{debug, warn};

pub use part::{Part, PartId, Parts};

use crate::config::{AdaptiveStepParameters, FixedStepParameters};
use crate::constants::Mass;
use crate::flow_errors::FlowError;
use crate::geometry::{
    ApparentBubble, Barycentric, BarycentreCalculator, DegreesOfFreedom, Force, Frame,
    RigidMotion, RigidPileUp,
};
use crate::physics::discrete_trajectory::{DiscreteTrajectory, TRUNK};
use crate::physics::ephemeris::{
    no_intrinsic_acceleration, EphemerisFlow, FixedStepInstance, IntrinsicAcceleration,
    UNLIMITED_MAX_EPHEMERIS_STEPS,
};
use crate::serialization::{
    read_degrees_of_freedom, read_vector, required, write_degrees_of_freedom, write_vector,
    PartDegreesOfFreedomMessage, PileUpMessage,
};
use crate::time::Instant;

#[derive(Debug)]
pub struct PileUp {
    parts: Vec<PartId>,
    mass: Mass,
    intrinsic_force: Force<Barycentric>,
    psychohistory: DiscreteTrajectory<Barycentric>,
    actual_part_degrees_of_freedom: BTreeMap<PartId, DegreesOfFreedom<RigidPileUp>>,
    apparent_part_degrees_of_freedom: BTreeMap<PartId, DegreesOfFreedom<ApparentBubble>>,
    adaptive_step_parameters: AdaptiveStepParameters,
    fixed_step_parameters: FixedStepParameters,
    /// Fixed-step integration of the barycentre, absent while a force is applied.
    fixed_instance: Option<FixedStepInstance<Barycentric>>,
}

impl PileUp {
    /// A pile-up of `part_ids` at `t`.
    ///
    /// The intrinsic force of the pile-up is the sum of the intrinsic forces of its parts.
    ///
    /// # Panics
    /// If `part_ids` is empty or contains an id absent from `parts`.
    pub fn new(
        part_ids: Vec<PartId>,
        parts: &Parts,
        t: Instant,
        adaptive_step_parameters: AdaptiveStepParameters,
        fixed_step_parameters: FixedStepParameters,
    ) -> Self {
        assert!(!part_ids.is_empty(), "a pile-up needs at least one part");
        let mut calculator = BarycentreCalculator::<Barycentric>::new();
        let mut intrinsic_force = Force::zero();
        for id in &part_ids {
            let part = &parts[*id];
            calculator.add(part.degrees_of_freedom(), part.mass());
            intrinsic_force += part.intrinsic_force();
        }
        let barycentre = calculator.get();

        let mut psychohistory = DiscreteTrajectory::new();
        psychohistory.append(TRUNK, t, barycentre);

        let to_pile_up = RigidMotion::<Barycentric, RigidPileUp>::new(barycentre);
        let actual_part_degrees_of_freedom = part_ids
            .iter()
            .map(|id| (*id, to_pile_up.apply(parts[*id].degrees_of_freedom())))
            .collect();

        debug!(
            parts = part_ids.len(),
            mass = calculator.weight(),
            %t,
            "created pile-up"
        );
        PileUp {
            parts: part_ids,
            mass: calculator.weight(),
            intrinsic_force,
            psychohistory,
            actual_part_degrees_of_freedom,
            apparent_part_degrees_of_freedom: BTreeMap::new(),
            adaptive_step_parameters,
            fixed_step_parameters,
            fixed_instance: None,
        }
    }

    pub fn parts(&self) -> &[PartId] {
        &self.parts
    }

    pub fn mass(&self) -> Mass {
        self.mass
    }

    pub fn intrinsic_force(&self) -> Force<Barycentric> {
        self.intrinsic_force
    }

    pub fn set_intrinsic_force(&mut self, intrinsic_force: Force<Barycentric>) {
        self.intrinsic_force = intrinsic_force;
    }

    pub fn psychohistory(&self) -> &DiscreteTrajectory<Barycentric> {
        &self.psychohistory
    }

    pub fn actual_part_degrees_of_freedom(
        &self,
    ) -> &BTreeMap<PartId, DegreesOfFreedom<RigidPileUp>> {
        &self.actual_part_degrees_of_freedom
    }

    pub fn apparent_part_degrees_of_freedom(
        &self,
    ) -> &BTreeMap<PartId, DegreesOfFreedom<ApparentBubble>> {
        &self.apparent_part_degrees_of_freedom
    }

    /// Record the state of `part` as seen by the physics engine.
    ///
    /// # Panics
    /// If `part` is not a member of this pile-up.
    pub fn set_part_apparent_degrees_of_freedom(
        &mut self,
        part: PartId,
        degrees_of_freedom: DegreesOfFreedom<ApparentBubble>,
    ) {
        assert!(
            self.actual_part_degrees_of_freedom.contains_key(&part),
            "{part} is not a member of the pile-up"
        );
        self.apparent_part_degrees_of_freedom
            .insert(part, degrees_of_freedom);
    }

    /// Rebase the offsets of the parts on their apparent degrees of freedom, if any.
    ///
    /// # Panics
    /// If apparent degrees of freedom were recorded for some parts but not all.
    pub fn deform_pile_up_if_needed(&mut self, parts: &Parts) {
        if self.apparent_part_degrees_of_freedom.is_empty() {
            return;
        }
        assert_eq!(
            self.apparent_part_degrees_of_freedom.len(),
            self.parts.len(),
            "apparent degrees of freedom are missing for some parts of the pile-up"
        );

        let mut calculator = BarycentreCalculator::<ApparentBubble>::new();
        for (id, dof) in &self.apparent_part_degrees_of_freedom {
            calculator.add(dof, parts[*id].mass());
        }
        let to_pile_up = RigidMotion::<ApparentBubble, RigidPileUp>::new(calculator.get());
        self.actual_part_degrees_of_freedom = self
            .apparent_part_degrees_of_freedom
            .iter()
            .map(|(id, dof)| (*id, to_pile_up.apply(dof)))
            .collect();
        self.apparent_part_degrees_of_freedom.clear();
        debug!(parts = self.parts.len(), "deformed pile-up");
    }

    /// Integrate the barycentre up to `t` and extend the tails of the parts.
    ///
    /// Fails if the ephemeris cannot cover the integration; the tails of the parts are then
    /// left untouched.
    pub fn advance_time<E: EphemerisFlow<Barycentric>>(
        &mut self,
        ephemeris: &mut E,
        parts: &mut Parts,
        t: Instant,
    ) -> Result<(), FlowError> {
        if self.intrinsic_force == Force::zero() {
            self.advance_in_free_fall(ephemeris, t)?;
        } else {
            self.advance_under_force(ephemeris, t)?;
        }
        self.append_to_part_tails(parts);

        let Some((last_authoritative, _)) = self.psychohistory.last_authoritative(TRUNK) else {
            panic!("empty psychohistory");
        };
        self.psychohistory.forget_before(last_authoritative);
        debug!(
            %t,
            %last_authoritative,
            authoritative = self.psychohistory.is_authoritative(TRUNK),
            "advanced pile-up"
        );
        Ok(())
    }

    fn last_psychohistory_point(&self) -> (Instant, DegreesOfFreedom<Barycentric>) {
        match self.psychohistory.last(TRUNK) {
            Some(point) => point,
            None => panic!("empty psychohistory"),
        }
    }

    fn advance_in_free_fall<E: EphemerisFlow<Barycentric>>(
        &mut self,
        ephemeris: &mut E,
        t: Instant,
    ) -> Result<(), FlowError> {
        self.psychohistory.discard_speculative(TRUNK);

        let (t0, barycentre) = self.last_psychohistory_point();
        let fixed_step_parameters = self.fixed_step_parameters;
        let instance = self.fixed_instance.get_or_insert_with(|| {
            let free_fall: IntrinsicAcceleration<Barycentric> =
                Box::new(no_intrinsic_acceleration::<Barycentric>);
            ephemeris.new_instance(t0, &[barycentre], vec![free_fall], fixed_step_parameters)
        });
        ephemeris.flow_with_fixed_step(t, instance, &mut [self.psychohistory.trunk_mut()])?;

        let (last_fixed, _) = self.last_psychohistory_point();
        if last_fixed < t {
            let reached = ephemeris.flow_with_adaptive_step(
                self.psychohistory.trunk_mut(),
                &no_intrinsic_acceleration::<Barycentric>,
                t,
                &self.adaptive_step_parameters,
                UNLIMITED_MAX_EPHEMERIS_STEPS,
                true,
            )?;
            if !reached {
                warn!(%t, "pile-up prolongation stopped before the requested instant");
            }
            self.psychohistory.set_speculative_after(TRUNK, last_fixed);
        }
        Ok(())
    }

    fn advance_under_force<E: EphemerisFlow<Barycentric>>(
        &mut self,
        ephemeris: &mut E,
        t: Instant,
    ) -> Result<(), FlowError> {
        // The fixed-step integration is bound to free fall.
        self.fixed_instance = None;

        let acceleration = self.intrinsic_force / self.mass;
        let reached = ephemeris.flow_with_adaptive_step(
            self.psychohistory.trunk_mut(),
            &move |_: Instant| acceleration,
            t,
            &self.adaptive_step_parameters,
            UNLIMITED_MAX_EPHEMERIS_STEPS,
            true,
        )?;
        if !reached {
            warn!(%t, "pile-up integration under force stopped before the requested instant");
        }
        Ok(())
    }

    /// Append the psychohistory after its first point to the tail of every part.
    fn append_to_part_tails(&self, parts: &mut Parts) {
        let size = self.psychohistory.size(TRUNK);
        let first_speculative = size - self.psychohistory.speculative_count(TRUNK);
        for id in &self.parts {
            let offset = &self.actual_part_degrees_of_freedom[id];
            let tail = parts[*id].tail_mut();
            tail.discard_speculative(TRUNK);
            for (index, (time, barycentre)) in self.psychohistory.iter(TRUNK).enumerate().skip(1) {
                let dof = RigidMotion::<Barycentric, RigidPileUp>::new(*barycentre)
                    .inverse()
                    .apply(offset);
                if index >= first_speculative {
                    tail.append_speculative(TRUNK, time, dof);
                } else {
                    tail.append(TRUNK, time, dof);
                }
            }
        }
    }

    /// Set the degrees of freedom of every part from the end of the psychohistory.
    pub fn nudge_parts(&self, parts: &mut Parts) {
        let (_, barycentre) = self.last_psychohistory_point();
        let from_pile_up = RigidMotion::<Barycentric, RigidPileUp>::new(barycentre).inverse();
        for id in &self.parts {
            let offset = &self.actual_part_degrees_of_freedom[id];
            parts[*id].set_degrees_of_freedom(from_pile_up.apply(offset));
        }
    }

    pub fn write_to_message(&self) -> PileUpMessage {
        PileUpMessage {
            part_id: self.parts.iter().map(|id| id.raw()).collect(),
            psychohistory: Some(self.psychohistory.write_to_message()),
            actual_part_degrees_of_freedom: self
                .actual_part_degrees_of_freedom
                .iter()
                .map(|(id, dof)| PartDegreesOfFreedomMessage {
                    part_id: id.raw(),
                    degrees_of_freedom: Some(write_degrees_of_freedom(dof)),
                })
                .collect(),
            apparent_part_degrees_of_freedom: self
                .apparent_part_degrees_of_freedom
                .iter()
                .map(|(id, dof)| PartDegreesOfFreedomMessage {
                    part_id: id.raw(),
                    degrees_of_freedom: Some(write_degrees_of_freedom(dof)),
                })
                .collect(),
            intrinsic_force: Some(write_vector(&self.intrinsic_force)),
            adaptive_step_parameters: Some(self.adaptive_step_parameters.write_to_message()),
            fixed_step_parameters: Some(self.fixed_step_parameters.write_to_message()),
        }
    }

    /// Restore a pile-up whose parts are in `parts`.
    ///
    /// The fixed-step integration restarts from the last authoritative point at the next
    /// advance.
    pub fn read_from_message(message: &PileUpMessage, parts: &Parts) -> Result<Self, FlowError> {
        let part_ids: Vec<PartId> = message.part_id.iter().map(|id| PartId::new(*id)).collect();
        if part_ids.is_empty() {
            return Err(FlowError::InvalidMessage("pile-up without parts".into()));
        }
        let mass: Mass = part_ids
            .iter()
            .map(|id| {
                parts.get(*id).map(Part::mass).ok_or_else(|| {
                    FlowError::InvalidMessage(format!("pile-up refers to the unknown {id}"))
                })
            })
            .sum::<Result<Mass, FlowError>>()?;

        let psychohistory =
            DiscreteTrajectory::read_from_message(required(&message.psychohistory, "psychohistory")?)?;
        if psychohistory.is_empty(TRUNK) {
            return Err(FlowError::InvalidMessage("empty psychohistory".into()));
        }

        let actual_part_degrees_of_freedom = read_part_degrees_of_freedom::<RigidPileUp>(
            &message.actual_part_degrees_of_freedom,
        )?;
        let apparent_part_degrees_of_freedom = read_part_degrees_of_freedom::<ApparentBubble>(
            &message.apparent_part_degrees_of_freedom,
        )?;
        let members_match = actual_part_degrees_of_freedom.len() == part_ids.len()
            && part_ids
                .iter()
                .all(|id| actual_part_degrees_of_freedom.contains_key(id))
            && apparent_part_degrees_of_freedom
                .keys()
                .all(|id| actual_part_degrees_of_freedom.contains_key(id));
        if !members_match {
            return Err(FlowError::InvalidMessage(
                "pile-up degrees of freedom do not match its parts".into(),
            ));
        }

        Ok(PileUp {
            parts: part_ids,
            mass,
            intrinsic_force: read_vector(required(&message.intrinsic_force, "intrinsic_force")?)?,
            psychohistory,
            actual_part_degrees_of_freedom,
            apparent_part_degrees_of_freedom,
            adaptive_step_parameters: AdaptiveStepParameters::read_from_message(required(
                &message.adaptive_step_parameters,
                "adaptive_step_parameters",
            )?)?,
            fixed_step_parameters: FixedStepParameters::read_from_message(required(
                &message.fixed_step_parameters,
                "fixed_step_parameters",
            )?)?,
            fixed_instance: None,
        })
    }
}

fn read_part_degrees_of_freedom<F: Frame>(
    messages: &[PartDegreesOfFreedomMessage],
) -> Result<BTreeMap<PartId, DegreesOfFreedom<F>>, FlowError> {
    messages
        .iter()
        .map(|m| {
            let dof = read_degrees_of_freedom(required(&m.degrees_of_freedom, "degrees_of_freedom")?)?;
            Ok((PartId::new(m.part_id), dof))
        })
        .collect()
}
