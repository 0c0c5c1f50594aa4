//! Id-indexed storage.
//!
//! An [`Arena`] owns values of one kind and hands out stable integer ids for them. Relations
//! between objects (a pile-up and its parts, a fork and its parent) are expressed as ids into
//! an arena rather than references, which also gives serialisation a natural identity.
//!
//! Entries are kept ordered by id so that iteration, and therefore every message written
//! from an arena, is deterministic.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

pub trait IdLike: Copy + Ord {
    fn from_raw(index: u64) -> Self;
    fn into_raw(self) -> u64;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arena<Id: IdLike, T> {
    inner: BTreeMap<Id, T>,
    next_id: u64,
    _phantom: PhantomData<Id>,
}

impl<Id: IdLike, T> Arena<Id, T> {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
            next_id: 0,
            _phantom: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Store `x` under a fresh id.
    pub fn push(&mut self, x: T) -> Id {
        let id = Id::from_raw(self.next_id);
        self.next_id += 1;
        self.inner.insert(id, x);
        id
    }

    /// Store `x` under a caller-chosen id, e.g. one read back from a message.
    ///
    /// Later calls to [`Arena::push`] never reuse `id`.
    pub fn insert(&mut self, id: Id, x: T) -> Option<T> {
        self.next_id = self.next_id.max(id.into_raw() + 1);
        self.inner.insert(id, x)
    }

    pub fn remove(&mut self, id: Id) -> Option<T> {
        self.inner.remove(&id)
    }

    pub fn get(&self, id: Id) -> Option<&T> {
        self.inner.get(&id)
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut T> {
        self.inner.get_mut(&id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.inner.contains_key(&id)
    }

    /// Id that the next call to [`Arena::push`] will return.
    pub fn next_id(&self) -> Id {
        Id::from_raw(self.next_id)
    }

    /// Make sure ids below `next_id` are never handed out by [`Arena::push`].
    pub fn skip_to(&mut self, next_id: Id) {
        self.next_id = self.next_id.max(next_id.into_raw());
    }

    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.inner.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, &T)> {
        self.inner.iter().map(|(i, v)| (*i, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Id, &mut T)> {
        self.inner.iter_mut().map(|(i, v)| (*i, v))
    }
}

impl<Id: IdLike, T> Default for Arena<Id, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: IdLike + std::fmt::Debug, T> Index<Id> for Arena<Id, T> {
    type Output = T;

    fn index(&self, index: Id) -> &Self::Output {
        match self.inner.get(&index) {
            Some(x) => x,
            None => panic!("no entry for id {index:?}"),
        }
    }
}

impl<Id: IdLike + std::fmt::Debug, T> IndexMut<Id> for Arena<Id, T> {
    fn index_mut(&mut self, index: Id) -> &mut Self::Output {
        match self.inner.get_mut(&index) {
            Some(x) => x,
            None => panic!("no entry for id {index:?}"),
        }
    }
}
