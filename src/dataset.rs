use std::ops::Index;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sample::Sample;

/// Identifier of a sample within a [`Dataset`].
pub type SampleId = usize;

/// An ordered collection of samples indexed by their id.
///
/// Iteration follows the insertion order, which is not necessarily the order of the ids.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    samples: IndexMap<SampleId, Sample>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dataset whose samples have ids `0..samples.len()`.
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self {
            samples: samples.into_iter().enumerate().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Ids of the samples, in iteration order.
    pub fn sample_ids(&self) -> Vec<SampleId> {
        self.samples.keys().copied().collect()
    }

    pub fn get(&self, id: SampleId) -> Option<&Sample> {
        self.samples.get(&id)
    }

    pub fn get_mut(&mut self, id: SampleId) -> Option<&mut Sample> {
        self.samples.get_mut(&id)
    }

    /// Adds a sample with the id following the largest one, and returns that id.
    pub fn add_sample(&mut self, sample: Sample) -> SampleId {
        let id = self.samples.keys().max().map_or(0, |max| max + 1);
        self.samples.insert(id, sample);
        id
    }

    /// Adds a sample under the given id.
    pub fn insert(&mut self, id: SampleId, sample: Sample) -> Result<()> {
        if self.samples.contains_key(&id) {
            return Err(Error::DuplicateSampleId(id));
        }
        self.samples.insert(id, sample);
        Ok(())
    }

    /// Adds several samples under the given ids.
    ///
    /// Nothing is added if the lengths differ or if an id is already used.
    pub fn add_samples(&mut self, samples: Vec<Sample>, ids: Vec<SampleId>) -> Result<()> {
        if samples.len() != ids.len() {
            return Err(Error::SampleCountMismatch {
                samples: samples.len(),
                ids: ids.len(),
            });
        }
        for (idx, id) in ids.iter().enumerate() {
            if self.samples.contains_key(id) || ids[..idx].contains(id) {
                return Err(Error::DuplicateSampleId(*id));
            }
        }
        self.samples.extend(ids.into_iter().zip(samples));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (SampleId, &Sample)> {
        self.samples.iter().map(|(&id, sample)| (id, sample))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SampleId, &mut Sample)> {
        self.samples.iter_mut().map(|(&id, sample)| (id, sample))
    }
}

impl Index<SampleId> for Dataset {
    type Output = Sample;

    fn index(&self, id: SampleId) -> &Self::Output {
        &self.samples[&id]
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = (&'a SampleId, &'a Sample);
    type IntoIter = indexmap::map::Iter<'a, SampleId, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
