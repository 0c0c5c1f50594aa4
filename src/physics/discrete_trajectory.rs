//! # Forkable sample histories of massless bodies
//!
//! A [`DiscreteTrajectory`] is a tree of timelines. The *trunk* ([`TRUNK`]) is the root; every
//! other fork is attached to a point of its parent and owns the points that follow it. Reading
//! a fork means walking its *path*: the parent's points up to the fork point, recursively,
//! followed by the fork's own points. Times strictly increase along every path.
//!
//! Forks are always attached to the fork that owns their fork point, so a fork point is
//! present in its parent's own timeline for as long as the child exists. Removing points from
//! a fork ([`DiscreteTrajectory::forget_after`], [`DiscreteTrajectory::discard_speculative`])
//! deletes the children attached to the removed points.
//!
//! ## Speculative points
//!
//! The last points of a fork may be *speculative*: they were produced by a prediction that
//! has not been confirmed yet (an adaptive step past the last fixed step of a pile-up, for
//! instance). [`DiscreteTrajectory::append`] commits the fork, while
//! [`DiscreteTrajectory::append_speculative`] extends the speculative tail.
//! [`DiscreteTrajectory::discard_speculative`] drops it.
//!
//! ## Invariant violations
//!
//! Appending a non-increasing time, forking at a time absent from the path, deleting the
//! trunk or using an unknown fork id are programming errors and panic.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Bound, RangeBounds};

use crate::arena::{Arena, IdLike};
use crate::flow_errors::FlowError;
use crate::geometry::{DegreesOfFreedom, Frame};
use crate::serialization::{
    read_timed_degrees_of_freedom, write_timed_degrees_of_freedom, DiscreteTrajectoryMessage,
    ForkMessage,
};
use crate::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForkId(u64);

impl IdLike for ForkId {
    fn from_raw(index: u64) -> Self {
        ForkId(index)
    }

    fn into_raw(self) -> u64 {
        self.0
    }
}

/// The root of every discrete trajectory.
pub const TRUNK: ForkId = ForkId(0);

#[derive(Debug, Clone, PartialEq)]
struct Fork<F: Frame> {
    /// Parent fork and fork time; `None` for the trunk.
    parent: Option<(ForkId, Instant)>,
    /// Own points, all after the fork time.
    timeline: BTreeMap<Instant, DegreesOfFreedom<F>>,
    children: BTreeSet<ForkId>,
    /// Number of trailing own points that are speculative.
    speculative: usize,
}

impl<F: Frame> Fork<F> {
    fn new(parent: Option<(ForkId, Instant)>) -> Self {
        Fork {
            parent,
            timeline: BTreeMap::new(),
            children: BTreeSet::new(),
            speculative: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteTrajectory<F: Frame> {
    forks: Arena<ForkId, Fork<F>>,
}

impl<F: Frame> Default for DiscreteTrajectory<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Frame> DiscreteTrajectory<F> {
    /// A trajectory made of an empty trunk.
    pub fn new() -> Self {
        let mut forks = Arena::new();
        let trunk = forks.push(Fork::new(None));
        debug_assert_eq!(trunk, TRUNK);
        DiscreteTrajectory { forks }
    }

    pub fn contains(&self, fork: ForkId) -> bool {
        self.forks.contains(fork)
    }

    /// Ids of all the live forks, trunk first.
    pub fn forks(&self) -> impl Iterator<Item = ForkId> + '_ {
        self.forks.ids()
    }

    /// Parent and fork time of `fork`; `None` for the trunk.
    pub fn parent(&self, fork: ForkId) -> Option<(ForkId, Instant)> {
        self.forks[fork].parent
    }

    pub fn fork_mut(&mut self, fork: ForkId) -> ForkMut<'_, F> {
        assert!(self.forks.contains(fork), "no fork {fork:?}");
        ForkMut {
            trajectory: self,
            fork,
        }
    }

    pub fn trunk_mut(&mut self) -> ForkMut<'_, F> {
        self.fork_mut(TRUNK)
    }

    /// Segments of the path of `fork`, root first, with the upper bound of each segment.
    fn path(&self, fork: ForkId) -> Vec<(ForkId, Bound<Instant>)> {
        let mut segments = vec![(fork, Bound::Unbounded)];
        let mut current = fork;
        while let Some((parent, fork_time)) = self.forks[current].parent {
            segments.push((parent, Bound::Included(fork_time)));
            current = parent;
        }
        segments.reverse();
        segments
    }

    /// Points of the path of `fork` in increasing time order.
    pub fn iter(&self, fork: ForkId) -> impl Iterator<Item = (Instant, &DegreesOfFreedom<F>)> + '_ {
        self.path(fork).into_iter().flat_map(move |(id, upper)| {
            self.forks[id]
                .timeline
                .range((Bound::Unbounded, upper))
                .map(|(t, dof)| (*t, dof))
        })
    }

    pub fn size(&self, fork: ForkId) -> usize {
        self.path(fork)
            .into_iter()
            .map(|(id, upper)| {
                self.forks[id]
                    .timeline
                    .range((Bound::Unbounded, upper))
                    .count()
            })
            .sum()
    }

    pub fn is_empty(&self, fork: ForkId) -> bool {
        self.last(fork).is_none()
    }

    /// First point of the path of `fork`.
    pub fn first(&self, fork: ForkId) -> Option<(Instant, DegreesOfFreedom<F>)> {
        self.iter(fork).next().map(|(t, dof)| (t, *dof))
    }

    /// Last point of the path of `fork`.
    pub fn last(&self, fork: ForkId) -> Option<(Instant, DegreesOfFreedom<F>)> {
        let own = &self.forks[fork];
        if let Some((t, dof)) = own.timeline.last_key_value() {
            return Some((*t, *dof));
        }
        let (parent, fork_time) = own.parent?;
        self.forks[parent]
            .timeline
            .get(&fork_time)
            .map(|dof| (fork_time, *dof))
    }

    /// Fork whose own timeline holds the point at `t` of the path of `fork`.
    fn owner(&self, fork: ForkId, t: Instant) -> Option<ForkId> {
        self.path(fork).into_iter().find_map(|(id, upper)| {
            let within = (Bound::Unbounded, upper).contains(&t);
            (within && self.forks[id].timeline.contains_key(&t)).then_some(id)
        })
    }

    pub fn find(&self, fork: ForkId, t: Instant) -> Option<DegreesOfFreedom<F>> {
        let owner = self.owner(fork, t)?;
        self.forks[owner].timeline.get(&t).copied()
    }

    fn check_next_time(&self, fork: ForkId, t: Instant) {
        if let Some((last, _)) = self.last(fork) {
            assert!(
                t > last,
                "appending at {t} to fork {fork:?} whose last point is at {last}"
            );
        }
    }

    /// Append an authoritative point; the whole fork becomes authoritative.
    ///
    /// # Panics
    /// If `t` is not after the last point of the path.
    pub fn append(&mut self, fork: ForkId, t: Instant, degrees_of_freedom: DegreesOfFreedom<F>) {
        self.check_next_time(fork, t);
        let own = &mut self.forks[fork];
        own.timeline.insert(t, degrees_of_freedom);
        own.speculative = 0;
    }

    /// Append a point at the end of the speculative tail of `fork`.
    ///
    /// # Panics
    /// If `t` is not after the last point of the path.
    pub fn append_speculative(
        &mut self,
        fork: ForkId,
        t: Instant,
        degrees_of_freedom: DegreesOfFreedom<F>,
    ) {
        self.check_next_time(fork, t);
        let own = &mut self.forks[fork];
        own.timeline.insert(t, degrees_of_freedom);
        own.speculative += 1;
    }

    /// Mark the own points of `fork` after `t` as speculative, and those before as
    /// authoritative.
    pub fn set_speculative_after(&mut self, fork: ForkId, t: Instant) {
        let own = &mut self.forks[fork];
        own.speculative = own
            .timeline
            .range((Bound::Excluded(t), Bound::Unbounded))
            .count();
    }

    /// Make every point of `fork` authoritative.
    pub fn commit(&mut self, fork: ForkId) {
        self.forks[fork].speculative = 0;
    }

    pub fn is_authoritative(&self, fork: ForkId) -> bool {
        self.forks[fork].speculative == 0
    }

    pub fn speculative_count(&self, fork: ForkId) -> usize {
        self.forks[fork].speculative
    }

    /// Last point of the path that is not speculative.
    pub fn last_authoritative(&self, fork: ForkId) -> Option<(Instant, DegreesOfFreedom<F>)> {
        let own = &self.forks[fork];
        if let Some((t, dof)) = own.timeline.iter().nth_back(own.speculative) {
            return Some((*t, *dof));
        }
        let (parent, fork_time) = own.parent?;
        self.forks[parent]
            .timeline
            .get(&fork_time)
            .map(|dof| (fork_time, *dof))
    }

    /// Drop the speculative tail of `fork`, with any fork attached to it.
    pub fn discard_speculative(&mut self, fork: ForkId) {
        let own = &self.forks[fork];
        if own.speculative == 0 {
            return;
        }
        let first_speculative = own
            .timeline
            .keys()
            .nth_back(own.speculative - 1)
            .copied();
        if let Some(t) = first_speculative {
            self.remove_own_points(fork, (Bound::Included(t), Bound::Unbounded));
        }
    }

    /// Remove the own points of `fork` in `range`, and the children attached to them.
    fn remove_own_points<R: RangeBounds<Instant>>(&mut self, fork: ForkId, range: R) {
        let doomed: Vec<ForkId> = self.forks[fork]
            .children
            .iter()
            .copied()
            .filter(|child| {
                self.forks[*child]
                    .parent
                    .is_some_and(|(_, fork_time)| range.contains(&fork_time))
            })
            .collect();
        for child in doomed {
            self.delete_fork(child);
        }

        let own = &mut self.forks[fork];
        let first_speculative = own
            .speculative
            .checked_sub(1)
            .and_then(|n| own.timeline.keys().nth_back(n).copied());
        own.timeline.retain(|t, _| !range.contains(t));
        // The speculative points are the survivors of the original tail.
        own.speculative =
            first_speculative.map_or(0, |first| own.timeline.range(first..).count());
    }

    /// Fork `fork` at `t` and copy the points of its path after `t` into the new fork.
    ///
    /// # Panics
    /// If the path of `fork` has no point at `t`.
    pub fn new_fork_with_copy(&mut self, fork: ForkId, t: Instant) -> ForkId {
        let copied: BTreeMap<Instant, DegreesOfFreedom<F>> = self
            .iter(fork)
            .filter(|(time, _)| *time > t)
            .map(|(time, dof)| (time, *dof))
            .collect();
        let speculative = self.forks[fork].speculative.min(copied.len());
        let child = self.new_fork_without_copy(fork, t);
        let new_fork = &mut self.forks[child];
        new_fork.timeline = copied;
        new_fork.speculative = speculative;
        child
    }

    /// Fork `fork` at `t`; the new fork's path ends at `t`.
    ///
    /// # Panics
    /// If the path of `fork` has no point at `t`.
    pub fn new_fork_without_copy(&mut self, fork: ForkId, t: Instant) -> ForkId {
        let Some(owner) = self.owner(fork, t) else {
            panic!("cannot fork {fork:?} at {t}: no such point on its path");
        };
        let child = self.forks.push(Fork::new(Some((owner, t))));
        self.forks[owner].children.insert(child);
        child
    }

    /// Fork `fork` at its last point.
    ///
    /// # Panics
    /// If the path of `fork` is empty.
    pub fn new_fork_at_last(&mut self, fork: ForkId) -> ForkId {
        let Some((t, _)) = self.last(fork) else {
            panic!("cannot fork the empty path of {fork:?}");
        };
        self.new_fork_without_copy(fork, t)
    }

    /// Delete `fork` and all the forks attached to it.
    ///
    /// # Panics
    /// If `fork` is the trunk or does not exist.
    pub fn delete_fork(&mut self, fork: ForkId) {
        assert!(fork != TRUNK, "the trunk cannot be deleted");
        let Some(deleted) = self.forks.remove(fork) else {
            panic!("no fork {fork:?}");
        };
        if let Some((parent, _)) = deleted.parent {
            self.forks[parent].children.remove(&fork);
        }
        let mut pending: Vec<ForkId> = deleted.children.into_iter().collect();
        while let Some(id) = pending.pop() {
            if let Some(descendant) = self.forks.remove(id) {
                pending.extend(descendant.children);
            }
        }
    }

    /// Remove the own points of `fork` after `t`.
    pub fn forget_after(&mut self, fork: ForkId, t: Instant) {
        self.remove_own_points(fork, (Bound::Excluded(t), Bound::Unbounded));
    }

    /// Remove the trunk points before `t`, with the forks attached to them.
    pub fn forget_before(&mut self, t: Instant) {
        self.remove_own_points(TRUNK, ..t);
    }

    pub fn write_to_message(&self) -> DiscreteTrajectoryMessage {
        DiscreteTrajectoryMessage {
            frame: F::TAG,
            next_fork_id: self.forks.next_id().into_raw(),
            forks: self
                .forks
                .iter()
                .map(|(id, fork)| ForkMessage {
                    id: id.into_raw(),
                    parent: fork.parent.map(|(parent, _)| parent.into_raw()),
                    fork_time: fork.parent.map(|(_, t)| t.seconds_since_j2000()),
                    timeline: fork
                        .timeline
                        .iter()
                        .map(|(t, dof)| write_timed_degrees_of_freedom(*t, dof))
                        .collect(),
                    speculative: fork.speculative as u64,
                })
                .collect(),
        }
    }

    pub fn read_from_message(message: &DiscreteTrajectoryMessage) -> Result<Self, FlowError> {
        F::check_tag(message.frame)?;
        let invalid = |what: String| Err(FlowError::InvalidMessage(what));

        let mut forks: Arena<ForkId, Fork<F>> = Arena::new();
        for fork_message in &message.forks {
            let id = ForkId(fork_message.id);
            if forks.contains(id) {
                return invalid(format!("duplicate fork {id:?}"));
            }
            let parent = match (fork_message.parent, fork_message.fork_time) {
                (Some(parent), Some(t)) => {
                    Some((ForkId(parent), Instant::from_seconds_since_j2000(t)))
                }
                (None, None) => None,
                _ => return invalid(format!("fork {id:?} has an incomplete parent")),
            };
            if (id == TRUNK) != parent.is_none() {
                return invalid(format!("fork {id:?} is inconsistent with the trunk"));
            }

            let mut fork = Fork::new(parent);
            let mut previous = parent.map_or(Instant::INFINITE_PAST, |(_, t)| t);
            for point in &fork_message.timeline {
                let (t, dof) = read_timed_degrees_of_freedom(point)?;
                if t <= previous {
                    return invalid(format!("times of fork {id:?} are not increasing"));
                }
                fork.timeline.insert(t, dof);
                previous = t;
            }
            fork.speculative = fork_message.speculative as usize;
            if fork.speculative > fork.timeline.len() {
                return invalid(format!("fork {id:?} has too many speculative points"));
            }

            if let Some((parent_id, fork_time)) = parent {
                match forks.get_mut(parent_id) {
                    Some(parent_fork) if parent_fork.timeline.contains_key(&fork_time) => {
                        parent_fork.children.insert(id);
                    }
                    _ => {
                        return invalid(format!(
                            "fork {id:?} is not attached to a point of {parent_id:?}"
                        ))
                    }
                }
            }
            forks.insert(id, fork);
        }
        if !forks.contains(TRUNK) {
            return invalid("missing trunk".into());
        }
        forks.skip_to(ForkId(message.next_fork_id));
        Ok(DiscreteTrajectory { forks })
    }
}

/// Exclusive access to one fork of a trajectory.
pub struct ForkMut<'a, F: Frame> {
    trajectory: &'a mut DiscreteTrajectory<F>,
    fork: ForkId,
}

impl<F: Frame> ForkMut<'_, F> {
    pub fn fork(&self) -> ForkId {
        self.fork
    }

    pub fn trajectory(&self) -> &DiscreteTrajectory<F> {
        &*self.trajectory
    }

    pub fn reborrow(&mut self) -> ForkMut<'_, F> {
        ForkMut {
            trajectory: &mut *self.trajectory,
            fork: self.fork,
        }
    }

    pub fn append(&mut self, t: Instant, degrees_of_freedom: DegreesOfFreedom<F>) {
        self.trajectory.append(self.fork, t, degrees_of_freedom);
    }

    pub fn append_speculative(&mut self, t: Instant, degrees_of_freedom: DegreesOfFreedom<F>) {
        self.trajectory
            .append_speculative(self.fork, t, degrees_of_freedom);
    }

    pub fn last(&self) -> Option<(Instant, DegreesOfFreedom<F>)> {
        self.trajectory.last(self.fork)
    }

    pub fn size(&self) -> usize {
        self.trajectory.size(self.fork)
    }
}
