use std::collections::HashSet;

use super::{Counters, NormalizationStep, Observation};
use crate::error::NormalizationError;
use crate::reader::FIELD_SEPARATOR;

/// Drops exact duplicate observations.
///
/// Rows are remembered by a 32-byte BLAKE3 digest of their fields rather
/// than by content, which keeps memory flat for wide rows.
#[derive(Debug, Default)]
pub struct RedundantObservationRemoval {
    seen: HashSet<[u8; 32]>,
}

impl RedundantObservationRemoval {
    pub fn new() -> Self {
        Self::default()
    }

    fn digest(observation: &Observation) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        for (i, field) in observation.fields.iter().enumerate() {
            if i > 0 {
                hasher.update(&[FIELD_SEPARATOR]);
            }
            hasher.update(field);
        }
        *hasher.finalize().as_bytes()
    }
}

impl NormalizationStep for RedundantObservationRemoval {
    fn name(&self) -> &'static str {
        "remove_duplicates"
    }

    fn optional(&self) -> Option<&'static str> {
        Some("duplicates")
    }

    fn process(
        &mut self,
        observation: Observation,
        out: &mut Vec<Observation>,
        counters: &mut Counters,
    ) -> Result<(), NormalizationError> {
        if self.seen.insert(Self::digest(&observation)) {
            counters.unique_remaining += 1;
            out.push(observation);
        } else {
            tracing::debug!(line = observation.line, "dropping duplicate observation");
            counters.dropped += 1;
        }
        Ok(())
    }
}
