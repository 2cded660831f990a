//! # Active State-Set
//!
//! The composite state of a running machine: exactly one active state per active
//! region. The main region is always present; sub-regions are present only while the
//! main region sits on a fork source.

use super::states::{Region, StateId};
use std::collections::BTreeMap;
use std::fmt;

static MAIN_REGION: Region = Region::Main;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStateSet {
    main: StateId,
    sub_regions: BTreeMap<Region, StateId>,
}

impl ActiveStateSet {
    /// Create a set with only the main region active
    pub fn new(main: StateId) -> Self {
        Self {
            main,
            sub_regions: BTreeMap::new(),
        }
    }

    pub fn main_state(&self) -> &StateId {
        &self.main
    }

    pub fn get(&self, region: &Region) -> Option<&StateId> {
        match region {
            Region::Main => Some(&self.main),
            sub => self.sub_regions.get(sub),
        }
    }

    /// Return a copy with `region` set to `state`
    pub fn with(&self, region: Region, state: StateId) -> Self {
        let mut next = self.clone();
        match region {
            Region::Main => next.main = state,
            sub => {
                next.sub_regions.insert(sub, state);
            }
        }
        next
    }

    /// Return a copy with every sub-region removed and the main region set to `state`
    pub fn without_sub_regions(&self, state: StateId) -> Self {
        Self::new(state)
    }

    pub fn is_forked(&self) -> bool {
        !self.sub_regions.is_empty()
    }

    pub fn contains(&self, state: &StateId) -> bool {
        self.main == *state || self.sub_regions.values().any(|active| active == state)
    }

    /// Number of active regions, main included
    pub fn len(&self) -> usize {
        1 + self.sub_regions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Region, &StateId)> {
        std::iter::once((&MAIN_REGION, &self.main)).chain(self.sub_regions.iter())
    }

    pub fn sub_regions(&self) -> impl Iterator<Item = (&Region, &StateId)> {
        self.sub_regions.iter()
    }
}

impl fmt::Display for ActiveStateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .iter()
            .map(|(region, state)| format!("{region}={state}"))
            .collect();
        write!(f, "{{{}}}", rendered.join(", "))
    }
}
