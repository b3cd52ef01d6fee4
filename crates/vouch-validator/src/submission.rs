//! Discovery of the files that make up a submission.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use vouch_types::{DataType, FileType};

use crate::error::ValidatorError;

/// Stem of the deletion manifest (`deletion.txt`, `deletion.tsv.gz`, ...).
pub const DELETION_MANIFEST: &str = "deletion";

/// The files of one submission directory, grouped by file type.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFiles {
    files: BTreeMap<FileType, Vec<PathBuf>>,
    deletion: Option<PathBuf>,
}

impl SubmissionFiles {
    /// Lists `dir`, keeping only files of the requested data types.
    ///
    /// Files whose names match no file type are skipped with a warning.
    /// Several files of one type (split uploads) are processed in name order.
    pub fn scan(dir: &Path, data_types: &BTreeSet<DataType>) -> Result<Self, ValidatorError> {
        let entries = std::fs::read_dir(dir).map_err(|e| ValidatorError::io(dir, e))?;

        let mut submission = Self::default();
        for entry in entries {
            let entry = entry.map_err(|e| ValidatorError::io(dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = file_name(&path);
            if name.starts_with('.') {
                continue;
            }

            if stem(&name).eq_ignore_ascii_case(DELETION_MANIFEST) {
                submission.deletion = Some(path);
                continue;
            }

            match FileType::from_file_name(&name) {
                Some(file_type) if data_types.contains(&file_type.data_type()) => {
                    submission.files.entry(file_type).or_default().push(path);
                }
                Some(file_type) => {
                    tracing::debug!(file = %name, %file_type, "file type not requested, skipping");
                }
                None => {
                    tracing::warn!(file = %name, "unrecognized file name, ignoring");
                }
            }
        }

        for paths in submission.files.values_mut() {
            paths.sort();
        }
        Ok(submission)
    }

    /// Paths of one file type, empty if the submission has none.
    pub fn paths(&self, file_type: FileType) -> &[PathBuf] {
        self.files.get(&file_type).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, file_type: FileType) -> bool {
        !self.paths(file_type).is_empty()
    }

    /// Present file types in processing order.
    pub fn file_types(&self) -> impl Iterator<Item = FileType> + '_ {
        self.files.keys().copied()
    }

    /// Every present file with its type, in processing order.
    pub fn iter(&self) -> impl Iterator<Item = (FileType, &Path)> {
        self.files
            .iter()
            .flat_map(|(file_type, paths)| paths.iter().map(|path| (*file_type, path.as_path())))
    }

    pub fn deletion_manifest(&self) -> Option<&Path> {
        self.deletion.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Final component of `path`, lossily decoded.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn stem(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"header\n").unwrap();
    }

    fn all_types() -> BTreeSet<DataType> {
        DataType::ALL.into_iter().collect()
    }

    #[test]
    fn groups_files_by_type_in_processing_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ssm_p.txt");
        touch(dir.path(), "donor.txt");
        touch(dir.path(), "ssm_m.txt.gz");
        touch(dir.path(), "specimen.tsv");

        let files = SubmissionFiles::scan(dir.path(), &all_types()).unwrap();
        let types: Vec<_> = files.file_types().collect();
        assert_eq!(
            types,
            vec![FileType::Donor, FileType::Specimen, FileType::SsmM, FileType::SsmP]
        );
    }

    #[test]
    fn split_uploads_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "ssm_p.part2.txt");
        touch(dir.path(), "ssm_p.part1.txt");

        let files = SubmissionFiles::scan(dir.path(), &all_types()).unwrap();
        let names: Vec<_> = files.paths(FileType::SsmP).iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["ssm_p.part1.txt", "ssm_p.part2.txt"]);
    }

    #[test]
    fn deletion_manifest_and_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "donor.txt");
        touch(dir.path(), "deletion.txt");
        touch(dir.path(), "notes.md");
        touch(dir.path(), ".hidden");

        let files = SubmissionFiles::scan(dir.path(), &all_types()).unwrap();
        assert_eq!(files.file_types().count(), 1);
        assert_eq!(
            files.deletion_manifest().map(file_name).as_deref(),
            Some("deletion.txt")
        );
    }

    #[test]
    fn unrequested_data_types_are_left_out() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "donor.txt");
        touch(dir.path(), "cnsm_m.txt");

        let files = SubmissionFiles::scan(dir.path(), &BTreeSet::from([DataType::Clinical])).unwrap();
        assert!(files.contains(FileType::Donor));
        assert!(!files.contains(FileType::CnsmM));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let result = SubmissionFiles::scan(Path::new("/nonexistent/submission"), &all_types());
        assert!(matches!(result, Err(ValidatorError::Io { .. })));
    }
}
