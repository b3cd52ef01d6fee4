//! Resolution of parent keys to the donor that owns them.

use std::collections::HashMap;

use vouch_types::FileType;

use crate::interner::Component;
use crate::key::Key;

/// Which clinical entity a primary key identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Donor,
    Specimen,
    Sample,
}

impl Owner {
    /// Finds the component of a primary key that leads to a donor.
    ///
    /// Returns the owner kind and the component's position in the key.
    pub fn for_primary_key(names: &[String]) -> Option<(Owner, usize)> {
        [
            ("donor_id", Owner::Donor),
            ("specimen_id", Owner::Specimen),
            ("analyzed_sample_id", Owner::Sample),
        ]
        .into_iter()
        .find_map(|(field, owner)| {
            names
                .iter()
                .position(|name| name == field)
                .map(|index| (owner, index))
        })
    }
}

/// Specimen to donor and sample to specimen links seen in clinical files.
#[derive(Debug, Default)]
pub struct DonorLineage {
    specimen_donor: HashMap<Component, Component>,
    sample_specimen: HashMap<Component, Component>,
}

impl DonorLineage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the link a SPECIMEN or SAMPLE row establishes.
    pub fn record(&mut self, file_type: FileType, primary_key: &Key, foreign_key: &Key) {
        let links = match file_type {
            FileType::Specimen => &mut self.specimen_donor,
            FileType::Sample => &mut self.sample_specimen,
            _ => return,
        };
        if let (Some(child), Some(parent)) = (primary_key.component(0), foreign_key.component(0)) {
            links
                .entry(child.clone())
                .or_insert_with(|| parent.clone());
        }
    }

    /// The donor owning `key`, if it can be traced.
    pub fn donor_of<'a>(&'a self, key: &'a Key, owner: Owner, index: usize) -> Option<&'a [u8]> {
        let component = key.component(index)?;
        let donor = match owner {
            Owner::Donor => component,
            Owner::Specimen => self.specimen_donor.get(component)?,
            Owner::Sample => {
                let specimen = self.sample_specimen.get(component)?;
                self.specimen_donor.get(specimen)?
            }
        };
        Some(&**donor)
    }
}
