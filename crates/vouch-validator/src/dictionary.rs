//! Read-only schema collaborator.
//!
//! A [`Dictionary`] lists, per file type, the canonical field names and the
//! names of the primary, foreign and secondary foreign key fields. Which
//! checks run on a row is decided by [`FileType::policy`]; the dictionary
//! only says where the key values live.

use std::io::Read;

use serde::{Deserialize, Serialize};
use vouch_types::FileType;

use crate::error::ValidatorError;

/// Schema of one file type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSchema {
    pub file_type: FileType,
    pub field_names: Vec<String>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub foreign_key: Vec<String>,
    #[serde(default)]
    pub secondary_foreign_key: Vec<String>,
}

impl FileSchema {
    pub fn column_count(&self) -> usize {
        self.field_names.len()
    }

    /// Column index of every named field, in the order given.
    pub fn indices(&self, names: &[String]) -> Result<Vec<usize>, ValidatorError> {
        names.iter().map(|name| self.index_of(name)).collect()
    }

    pub fn index_of(&self, name: &str) -> Result<usize, ValidatorError> {
        self.field_names
            .iter()
            .position(|field| field == name)
            .ok_or_else(|| ValidatorError::UnknownField {
                file_type: self.file_type,
                field: name.to_string(),
            })
    }
}

/// The set of file schemas a submission is validated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dictionary {
    pub version: String,
    pub files: Vec<FileSchema>,
}

impl Dictionary {
    pub fn from_json(reader: impl Read) -> Result<Self, ValidatorError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn schema(&self, file_type: FileType) -> Result<&FileSchema, ValidatorError> {
        self.files
            .iter()
            .find(|schema| schema.file_type == file_type)
            .ok_or(ValidatorError::MissingSchema(file_type))
    }

    /// The default ICGC-style schema.
    pub fn builtin() -> Self {
        let files = FileType::ALL
            .into_iter()
            .map(builtin_schema)
            .collect();
        Self {
            version: "0.1".to_string(),
            files,
        }
    }
}

const ANALYSIS: [&str; 2] = ["analysis_id", "analyzed_sample_id"];

fn schema(
    file_type: FileType,
    fields: &[&str],
    primary_key: &[&str],
    foreign_key: &[&str],
    secondary_foreign_key: &[&str],
) -> FileSchema {
    let owned = |names: &[&str]| -> Vec<String> { names.iter().map(ToString::to_string).collect() };
    FileSchema {
        file_type,
        field_names: owned(fields),
        primary_key: owned(primary_key),
        foreign_key: owned(foreign_key),
        secondary_foreign_key: owned(secondary_foreign_key),
    }
}

fn meta_schema(file_type: FileType, matched: bool) -> FileSchema {
    let mut fields = vec!["analysis_id", "analyzed_sample_id"];
    if matched {
        fields.push("matched_sample_id");
    }
    fields.extend(["assembly_version", "platform"]);
    let secondary: &[&str] = if matched { &["matched_sample_id"] } else { &[] };
    schema(file_type, &fields, &ANALYSIS, &["analyzed_sample_id"], secondary)
}

fn builtin_schema(file_type: FileType) -> FileSchema {
    match file_type {
        FileType::Donor => schema(
            file_type,
            &[
                "donor_id",
                "donor_sex",
                "donor_vital_status",
                "disease_status_last_followup",
                "donor_age_at_diagnosis",
            ],
            &["donor_id"],
            &[],
            &[],
        ),
        FileType::Specimen => schema(
            file_type,
            &[
                "donor_id",
                "specimen_id",
                "specimen_type",
                "tumour_histological_type",
            ],
            &["specimen_id"],
            &["donor_id"],
            &[],
        ),
        FileType::Sample => schema(
            file_type,
            &["analyzed_sample_id", "specimen_id", "analyzed_sample_interval"],
            &["analyzed_sample_id"],
            &["specimen_id"],
            &[],
        ),

        FileType::SsmM | FileType::CnsmM | FileType::StsmM | FileType::MethM => {
            meta_schema(file_type, true)
        }
        FileType::SgvM | FileType::MirnaM | FileType::ExpM | FileType::PexpM | FileType::JcnM => {
            meta_schema(file_type, false)
        }

        FileType::SsmP => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "mutation_type",
                "chromosome",
                "chromosome_start",
                "chromosome_end",
                "reference_genome_allele",
                "control_genotype",
                "tumour_genotype",
                "mutated_from_allele",
                "mutated_to_allele",
            ],
            &[],
            &ANALYSIS,
            &[],
        ),
        FileType::CnsmP => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "mutation_id",
                "mutation_type",
                "chromosome",
                "chromosome_start",
                "chromosome_end",
                "copy_number",
            ],
            &["analysis_id", "analyzed_sample_id", "mutation_id"],
            &ANALYSIS,
            &[],
        ),
        FileType::CnsmS => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "mutation_id",
                "gene_affected",
            ],
            &[],
            &["analysis_id", "analyzed_sample_id", "mutation_id"],
            &[],
        ),
        FileType::StsmP => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "sv_id",
                "placement",
                "variant_type",
                "chr_from",
                "chr_to",
            ],
            &["analysis_id", "analyzed_sample_id", "sv_id", "placement"],
            &ANALYSIS,
            &[],
        ),
        FileType::StsmS => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "sv_id",
                "placement",
                "gene_affected_by_bkpt_from",
            ],
            &[],
            &["analysis_id", "analyzed_sample_id", "sv_id", "placement"],
            &[],
        ),
        FileType::SgvP => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "chromosome",
                "chromosome_start",
                "reference_genome_allele",
                "genotype",
                "variant_allele",
            ],
            &[],
            &ANALYSIS,
            &[],
        ),
        FileType::MirnaP => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "mirna_db",
                "mirna_id",
                "normalized_read_count",
            ],
            &[],
            &ANALYSIS,
            &[],
        ),
        FileType::MirnaS => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "mirna_db",
                "mirna_id",
                "mirna_seq",
            ],
            &["analysis_id", "analyzed_sample_id", "mirna_db", "mirna_id"],
            &ANALYSIS,
            &[],
        ),
        FileType::MethP => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "methylated_fragment_id",
                "chromosome",
                "chromosome_start",
                "beta_value",
            ],
            &["analysis_id", "analyzed_sample_id", "methylated_fragment_id"],
            &ANALYSIS,
            &[],
        ),
        FileType::MethS => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "methylated_fragment_id",
                "gene_affected",
            ],
            &[],
            &["analysis_id", "analyzed_sample_id", "methylated_fragment_id"],
            &[],
        ),
        FileType::ExpG => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "gene_stable_id",
                "normalized_expression_level",
            ],
            &[],
            &ANALYSIS,
            &[],
        ),
        FileType::PexpP => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "antibody_id",
                "gene_name",
                "normalized_expression_level",
            ],
            &[],
            &ANALYSIS,
            &[],
        ),
        FileType::JcnP => schema(
            file_type,
            &[
                "analysis_id",
                "analyzed_sample_id",
                "junction_id",
                "gene_stable_id",
                "junction_read_count",
            ],
            &[],
            &ANALYSIS,
            &[],
        ),
    }
}

#[cfg(test)]
mod tests {
    use vouch_types::PrimaryKeyPolicy;

    use super::*;

    #[test]
    fn builtin_covers_every_file_type() {
        let dictionary = Dictionary::builtin();
        for file_type in FileType::ALL {
            assert!(dictionary.schema(file_type).is_ok(), "{file_type} missing");
        }
    }

    #[test]
    fn builtin_key_fields_exist_and_match_policy() {
        let dictionary = Dictionary::builtin();
        for file_type in FileType::ALL {
            let schema = dictionary.schema(file_type).expect("schema");
            let policy = file_type.policy();

            assert!(schema.indices(&schema.primary_key).is_ok());
            assert!(schema.indices(&schema.foreign_key).is_ok());
            assert!(schema.indices(&schema.secondary_foreign_key).is_ok());

            assert_eq!(
                schema.primary_key.is_empty(),
                policy.primary_key == PrimaryKeyPolicy::Absent,
                "{file_type} primary key"
            );
            assert_eq!(schema.foreign_key.is_empty(), !policy.foreign_key);
            if !policy.secondary_foreign_key {
                assert!(schema.secondary_foreign_key.is_empty());
            }
        }
    }

    #[test]
    fn foreign_keys_match_referenced_primary_key_arity() {
        let dictionary = Dictionary::builtin();
        for file_type in FileType::ALL {
            if let Some(parent) = file_type.referenced_type() {
                let child = dictionary.schema(file_type).expect("child");
                let parent_schema = dictionary.schema(parent).expect("parent");
                assert_eq!(
                    child.foreign_key.len(),
                    parent_schema.primary_key.len(),
                    "{file_type} -> {parent}"
                );
            }
        }
    }

    #[test]
    fn json_round_trip_uses_camel_case() {
        let dictionary = Dictionary::builtin();
        let json = serde_json::to_string(&dictionary).expect("serialize");
        assert!(json.contains("\"fieldNames\""));
        assert!(json.contains("\"SSM_P\""));

        let parsed = Dictionary::from_json(json.as_bytes()).expect("parse");
        assert_eq!(parsed, dictionary);
    }

    #[test]
    fn unknown_field_is_reported() {
        let dictionary = Dictionary::builtin();
        let donor = dictionary.schema(FileType::Donor).expect("donor");
        assert!(matches!(
            donor.index_of("nope"),
            Err(ValidatorError::UnknownField { file_type: FileType::Donor, .. })
        ));
    }

    #[test]
    fn missing_schema_is_an_error() {
        let dictionary = Dictionary {
            version: "empty".to_string(),
            files: Vec::new(),
        };
        assert!(matches!(
            dictionary.schema(FileType::Donor),
            Err(ValidatorError::MissingSchema(FileType::Donor))
        ));
    }
}
