//! Orphan detection: every parent key must be used by some child row.

use serde_json::json;
use vouch_types::{ErrorType, FileType};

use super::encountered::EncounteredKeySet;
use super::lineage::{DonorLineage, Owner};
use super::primary_keys::PrimaryKeySet;
use crate::deletion::DeletionManifest;
use crate::error::ValidatorError;
use crate::report::{Reporter, ValidationError};

/// One parent/child relation whose surjectivity is checked.
pub struct Relation<'a> {
    pub parent: FileType,
    pub parent_key_names: &'a [String],
    pub child: FileType,
    pub child_key_names: &'a [String],
}

/// Reports a SURJECTION error for each parent key no child row referenced,
/// unless the key's donor is exempted for the child's data type.
///
/// Runs after the child's files are fully processed. Orphans are reported in
/// key order so the report does not depend on hashing.
pub fn check(
    relation: &Relation<'_>,
    parent_keys: &PrimaryKeySet,
    encountered: &EncounteredKeySet,
    lineage: &DonorLineage,
    deletions: &DeletionManifest,
    reporter: &mut Reporter,
) -> Result<u64, ValidatorError> {
    let owner = Owner::for_primary_key(relation.parent_key_names);
    let data_type = relation.child.data_type();

    let mut orphans: Vec<_> = parent_keys
        .iter()
        .filter(|(key, _)| !encountered.contains(key))
        .filter(|(key, _)| {
            let donor = owner.and_then(|(owner, index)| lineage.donor_of(key, owner, index));
            !donor.is_some_and(|donor| deletions.is_exempt(donor, data_type))
        })
        .collect();
    orphans.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let params = json!([relation.child, relation.child_key_names]);
    for (key, file_name) in &orphans {
        reporter.report(
            ValidationError::new(ErrorType::Surjection, Some(relation.parent), file_name)
                .with_fields(relation.parent_key_names)
                .with_value(key.to_strings())
                .with_params(params.clone()),
        )?;
    }

    let count = orphans.len() as u64;
    if count > 0 {
        tracing::info!(
            parent = %relation.parent,
            child = %relation.child,
            orphans = count,
            "surjectivity violations"
        );
    }
    Ok(count)
}
