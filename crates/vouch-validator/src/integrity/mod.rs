//! Referential-integrity engine.
//!
//! File types are processed in the fixed order of [`FileType::ALL`], parents
//! first, so a parent's [`PrimaryKeySet`] is complete before any child row
//! consults it. Each row is checked for uniqueness of its primary key, for
//! existence of its foreign key (and optional secondary foreign key) among the
//! parent's keys, and its foreign key is recorded for the parent's
//! surjectivity pass, which runs once the child's files are exhausted.
//!
//! Accumulators are owned by one run and never shared between submissions.
//! Clinical key sets live for the whole run; a feature's sets are dropped as
//! soon as the engine moves to the next feature.

mod encountered;
mod lineage;
mod primary_keys;
mod processor;
mod surjectivity;

use std::collections::HashMap;
use std::path::Path;

use vouch_config::ValidatorConfig;
use vouch_types::{DataType, FileType};

pub use encountered::EncounteredKeySet;
pub use lineage::{DonorLineage, Owner};
pub use primary_keys::PrimaryKeySet;
pub use processor::{Accumulators, FileProcessor, RowLayout};
pub use surjectivity::Relation;

use crate::cancel::CancellationToken;
use crate::deletion::DeletionManifest;
use crate::dictionary::Dictionary;
use crate::error::ValidatorError;
use crate::interner::Interner;
use crate::report::Reporter;
use crate::source;
use crate::submission::{SubmissionFiles, file_name};

/// Counts gathered while checking one submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrityStats {
    pub files: u64,
    pub rows: u64,
    pub orphans: u64,
}

pub struct IntegrityEngine<'a> {
    dictionary: &'a Dictionary,
    interner: &'a Interner,
    config: &'a ValidatorConfig,
    deletions: &'a DeletionManifest,
}

impl<'a> IntegrityEngine<'a> {
    pub fn new(
        dictionary: &'a Dictionary,
        interner: &'a Interner,
        config: &'a ValidatorConfig,
        deletions: &'a DeletionManifest,
    ) -> Self {
        Self {
            dictionary,
            interner,
            config,
            deletions,
        }
    }

    pub fn run(
        &self,
        files: &SubmissionFiles,
        reporter: &mut Reporter,
        token: &CancellationToken,
    ) -> Result<IntegrityStats, ValidatorError> {
        let mut stats = IntegrityStats::default();
        let mut key_sets: HashMap<FileType, PrimaryKeySet> = HashMap::new();
        let mut lineage = DonorLineage::new();
        let empty = PrimaryKeySet::new();

        for file_type in FileType::ALL {
            let paths = files.paths(file_type);
            if paths.is_empty() {
                continue;
            }
            let data_type = file_type.data_type();
            key_sets.retain(|kept, _| {
                let kept = kept.data_type();
                kept == DataType::Clinical || kept == data_type
            });

            let layout = RowLayout::new(file_type, self.dictionary)?;
            let processor = FileProcessor::new(
                &layout,
                self.interner,
                &self.config.missing_codes,
                self.config.cancel_check_interval,
                self.config.progress_log_interval,
            );

            let mut own = layout.policy.checks_uniqueness().then(PrimaryKeySet::new);
            let mut encountered = layout.policy.records_encountered.then(EncounteredKeySet::new);
            let referenced_type = file_type.referenced_type();
            let referenced = referenced_type.map(|parent| key_sets.get(&parent).unwrap_or(&empty));

            tracing::info!(%file_type, files = paths.len(), "checking referential integrity");
            for path in paths {
                stats.rows += self.process_path(
                    &processor,
                    path,
                    &mut Accumulators {
                        primary_keys: own.as_mut(),
                        referenced,
                        encountered: encountered.as_mut(),
                        lineage: &mut lineage,
                    },
                    reporter,
                    token,
                )?;
                stats.files += 1;
            }

            if let (Some(parent), Some(encountered)) = (referenced_type, &encountered) {
                let parent_schema = self.dictionary.schema(parent)?;
                stats.orphans += surjectivity::check(
                    &Relation {
                        parent,
                        parent_key_names: &parent_schema.primary_key,
                        child: file_type,
                        child_key_names: layout.foreign_key_names(),
                    },
                    referenced.unwrap_or(&empty),
                    encountered,
                    &lineage,
                    self.deletions,
                    reporter,
                )?;
            }

            if let Some(own) = own {
                key_sets.insert(file_type, own);
            }
        }

        tracing::info!(
            files = stats.files,
            rows = stats.rows,
            orphans = stats.orphans,
            "referential integrity checked"
        );
        Ok(stats)
    }

    fn process_path(
        &self,
        processor: &FileProcessor<'_>,
        path: &Path,
        accumulators: &mut Accumulators<'_>,
        reporter: &mut Reporter,
        token: &CancellationToken,
    ) -> Result<u64, ValidatorError> {
        let name = file_name(path);
        let input = source::open(path)?;
        processor.process(&name, input, accumulators, reporter, token)
    }
}
