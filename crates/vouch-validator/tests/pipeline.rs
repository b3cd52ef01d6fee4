//! End-to-end runs of the validation pipeline over submission directories.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use vouch_config::{NormalizerConfig, ValidatorConfig};
use vouch_types::{DataType, DataTypeState, ErrorType, ValidationOutcome};
use vouch_validator::{
    CancellationToken, Dictionary, Interner, Pipeline, PipelineResult, Reporter, ValidationError,
    ValidationRequest,
};

const DONOR: &str =
    "donor_id\tdonor_sex\tdonor_vital_status\tdisease_status_last_followup\tdonor_age_at_diagnosis";
const SPECIMEN: &str = "donor_id\tspecimen_id\tspecimen_type\ttumour_histological_type";
const SAMPLE: &str = "analyzed_sample_id\tspecimen_id\tanalyzed_sample_interval";
const SSM_M: &str = "analysis_id\tanalyzed_sample_id\tmatched_sample_id\tassembly_version\tplatform";
const SSM_P: &str = "analysis_id\tanalyzed_sample_id\tmutation_type\tchromosome\tchromosome_start\tchromosome_end\treference_genome_allele\tcontrol_genotype\ttumour_genotype\tmutated_from_allele\tmutated_to_allele";

fn write(dir: &Path, name: &str, header: &str, rows: &[&str]) {
    let mut content = format!("{header}\n");
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(dir.join(name), content).unwrap();
}

fn pipeline(validator: ValidatorConfig) -> Pipeline {
    Pipeline::new(
        Arc::new(Dictionary::builtin()),
        validator,
        NormalizerConfig::default(),
        Arc::new(Interner::new()),
    )
}

fn validate(request: &ValidationRequest) -> (PipelineResult, Vec<ValidationError>) {
    validate_with(pipeline(ValidatorConfig::default()), request, &CancellationToken::new())
}

fn validate_with(
    pipeline: Pipeline,
    request: &ValidationRequest,
    token: &CancellationToken,
) -> (PipelineResult, Vec<ValidationError>) {
    let mut reporter = Reporter::in_memory();
    let result = pipeline.run(request, &mut reporter, token).unwrap();
    (result, reporter.errors().to_vec())
}

fn counts(errors: &[ValidationError]) -> BTreeMap<(String, ErrorType), usize> {
    let mut counts = BTreeMap::new();
    for error in errors {
        *counts
            .entry((error.file_name.clone(), error.error_type))
            .or_default() += 1;
    }
    counts
}

fn donor_specimen(dir: &Path) {
    write(dir, "donor.txt", DONOR, &["D1\tmale\talive\tremission\t40", "D2\tfemale\talive\tremission\t51"]);
    write(
        dir,
        "specimen.txt",
        SPECIMEN,
        &["D1\tSP1\tprimary\tx", "D1\tSP2\tprimary\tx", "D3\tSP3\tprimary\tx"],
    );
}

fn clean_ssm(dir: &Path, rows: &[&str]) {
    write(dir, "donor.txt", DONOR, &["D1\tmale\talive\tremission\t40"]);
    write(dir, "specimen.txt", SPECIMEN, &["D1\tSP1\tprimary\tx"]);
    write(dir, "sample.txt", SAMPLE, &["SA1\tSP1\t1", "SA2\tSP1\t1"]);
    write(dir, "ssm_m.txt", SSM_M, &["AN1\tSA1\tSA2\tGRCh37\tillumina"]);
    write(dir, "ssm_p.txt", SSM_P, rows);
}

#[test]
fn donor_specimen_scenario() {
    let dir = tempfile::tempdir().unwrap();
    donor_specimen(dir.path());

    let (result, errors) = validate(&ValidationRequest::new(dir.path(), [DataType::Clinical]));

    assert_eq!(result.outcome, ValidationOutcome::Invalid);
    assert_eq!(
        counts(&errors),
        BTreeMap::from([
            (("donor.txt".to_string(), ErrorType::Surjection), 1),
            (("specimen.txt".to_string(), ErrorType::PrimaryRelation), 1),
        ])
    );

    let relation = errors
        .iter()
        .find(|e| e.error_type == ErrorType::PrimaryRelation)
        .unwrap();
    assert_eq!(relation.line_number, 4);
    assert_eq!(relation.value, vec!["D3".to_string()]);

    let orphan = errors.iter().find(|e| e.error_type == ErrorType::Surjection).unwrap();
    assert_eq!(orphan.value, vec!["D2".to_string()]);
    assert_eq!(orphan.line_number, -1);

    let clinical = &result.report.data_types[&DataType::Clinical];
    assert_eq!(clinical.state, DataTypeState::Invalid);
    assert_eq!(clinical.error_count(), 2);
}

#[test]
fn all_marker_exempts_withdrawn_donor() {
    let dir = tempfile::tempdir().unwrap();
    donor_specimen(dir.path());
    write(dir.path(), "deletion.txt", "donor_id\tdata_types", &["D2\tALL"]);

    let (_, errors) = validate(&ValidationRequest::new(dir.path(), [DataType::Clinical]));
    let types: Vec<_> = errors.iter().map(|e| e.error_type).collect();
    assert_eq!(types, vec![ErrorType::PrimaryRelation]);
}

#[test]
fn structural_errors_stop_before_integrity() {
    let dir = tempfile::tempdir().unwrap();
    donor_specimen(dir.path());
    write(dir.path(), "sample.txt", "wrong\theader", &["SA1\tSP9\t1"]);

    let (result, errors) = validate(&ValidationRequest::new(dir.path(), [DataType::Clinical]));

    assert_eq!(result.outcome, ValidationOutcome::Invalid);
    assert!(result.integrity.is_none());
    assert!(errors.iter().all(|e| e.error_type == ErrorType::FileHeader), "{errors:?}");
}

#[test]
fn missing_terminator_does_not_stop_integrity() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("donor.txt"),
        format!("{DONOR}\nD1\tmale\talive\tremission\t40"),
    )
    .unwrap();

    let (result, errors) = validate(&ValidationRequest::new(dir.path(), [DataType::Clinical]));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::LineTerminatorMissing);
    assert!(result.integrity.is_some());
}

#[test]
fn fail_fast_still_checks_files_after_missing_terminator() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("donor.txt"),
        format!("{DONOR}\nD1\tmale\talive\tremission\t40"),
    )
    .unwrap();
    write(dir.path(), "specimen.txt", SPECIMEN, &["D1"]);

    let fail_fast = pipeline(ValidatorConfig {
        fail_fast: true,
        ..ValidatorConfig::default()
    });
    let (result, errors) = validate_with(
        fail_fast,
        &ValidationRequest::new(dir.path(), [DataType::Clinical]),
        &CancellationToken::new(),
    );

    assert_eq!(result.outcome, ValidationOutcome::Invalid);
    assert!(result.integrity.is_none());
    let types: Vec<ErrorType> = errors.iter().map(|e| e.error_type).collect();
    assert_eq!(types, vec![ErrorType::LineTerminatorMissing, ErrorType::ColumnCount]);
}

#[test]
fn clean_submission_is_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let rows = ["AN1\tSA1\tsnv\t1\t100\t100\tA\tA/A\tA/T\tA\tT"; 12];
    let mut distinct: Vec<String> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        distinct.push(row.replace("\t100\t100\t", &format!("\t{i}\t{i}\t")));
    }
    distinct.push("AN1\tSA1\tsnv\t1\t500\t500\tA\tG/G\tG/T\tG\tT".to_string());
    let refs: Vec<&str> = distinct.iter().map(String::as_str).collect();
    clean_ssm(dir.path(), &refs);

    let run_dir = tempfile::tempdir().unwrap();
    let request = ValidationRequest::new(dir.path(), [DataType::Ssm]).with_run_dir(run_dir.path());
    let (result, errors) = validate(&request);

    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(result.outcome, ValidationOutcome::Valid);
    assert_eq!(result.report.data_types[&DataType::Ssm].state, DataTypeState::Valid);

    let summary = result.normalization.unwrap();
    assert_eq!(summary.counters.total_start, 13);
    assert_eq!(summary.counters.marked_as_controlled, 1);
    assert_eq!(summary.counters.masked, 1);
    assert!(!summary.threshold_exceeded);

    let normalized = fs::read_to_string(run_dir.path().join("ssm_p.normalized.txt")).unwrap();
    let lines: Vec<&str> = normalized.lines().collect();
    assert_eq!(lines.len(), 15);
    assert!(lines[0].ends_with("\tmarking"));
    assert_eq!(lines[14], "AN1\tSA1\tsnv\t1\t500\t500\tA\t\t\tA\tT\tMASKED");
}

#[test]
fn too_many_controlled_observations_fail_the_submission() {
    let dir = tempfile::tempdir().unwrap();
    clean_ssm(
        dir.path(),
        &[
            "AN1\tSA1\tsnv\t1\t100\t100\tA\tA/A\tA/T\tA\tT",
            "AN1\tSA1\tsnv\t1\t200\t200\tA\tG/G\tG/T\tG\tT",
        ],
    );

    let (result, errors) = validate(&ValidationRequest::new(dir.path(), [DataType::Ssm]));
    assert_eq!(result.outcome, ValidationOutcome::Invalid);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::ThresholdExceeded);
    assert_eq!(result.report.data_types[&DataType::Ssm].state, DataTypeState::Invalid);
    assert_eq!(result.report.data_types[&DataType::Clinical].state, DataTypeState::Valid);
}

#[test]
fn compressed_files_are_read_transparently() {
    let dir = tempfile::tempdir().unwrap();
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    writeln!(encoder, "{DONOR}").unwrap();
    writeln!(encoder, "D1\tmale\talive\tremission\t40").unwrap();
    writeln!(encoder, "D1\tmale\talive\tremission\t40").unwrap();
    fs::write(dir.path().join("donor.txt.gz"), encoder.finish().unwrap()).unwrap();

    let (_, errors) = validate(&ValidationRequest::new(dir.path(), [DataType::Clinical]));
    let types: Vec<_> = errors.iter().map(|e| (e.error_type, e.line_number)).collect();
    assert_eq!(types, vec![(ErrorType::Uniqueness, 3)]);
}

#[test]
fn cancelled_run_has_no_verdict() {
    let dir = tempfile::tempdir().unwrap();
    donor_specimen(dir.path());

    let token = CancellationToken::new();
    token.cancel();
    let config = ValidatorConfig {
        cancel_check_interval: 1,
        ..ValidatorConfig::default()
    };

    let (result, _) = validate_with(pipeline(config), &ValidationRequest::new(dir.path(), [DataType::Clinical]), &token);
    assert_eq!(result.outcome, ValidationOutcome::Cancelled);
    assert!(result.report.is_empty());
}

#[test]
fn unrequested_feature_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "donor.txt", DONOR, &["D1\tmale\talive\tremission\t40"]);
    write(dir.path(), "cnsm_m.txt", "garbage", &["x"]);

    let (result, errors) = validate(&ValidationRequest::new(dir.path(), [DataType::Clinical]));
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(result.outcome, ValidationOutcome::Valid);
}
