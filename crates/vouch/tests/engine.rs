//! The engine driving real validation runs over files on disk.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use vouch::{
    DataType, Engine, ERRORS_FILE, PipelineRunner, RunContext, SUMMARY_FILE, SubmissionRunner,
    SubmissionState, ValidationOutcome,
};
use vouch_config::VouchConfig;
use vouch_types::{ErrorType, SubmissionReport};
use vouch_validator::{CancellationToken, ValidationError};

const RELEASE: &str = "release1";
const PROJECT: &str = "PACA-CA";
const TIMEOUT: Duration = Duration::from_secs(30);

const DONOR: &str =
    "donor_id\tdonor_sex\tdonor_vital_status\tdisease_status_last_followup\tdonor_age_at_diagnosis";
const SPECIMEN: &str = "donor_id\tspecimen_id\tspecimen_type\ttumour_histological_type";

struct Fixture {
    _root: tempfile::TempDir,
    config: VouchConfig,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = VouchConfig::default();
        config.engine.fs_root = root.path().join("submissions");
        config.engine.report_dir = root.path().join("reports");
        fs::create_dir_all(config.engine.fs_root.join(RELEASE).join(PROJECT)).unwrap();
        Self { _root: root, config }
    }

    fn write(&self, name: &str, content: &str) {
        let dir = self.config.engine.fs_root.join(RELEASE).join(PROJECT);
        fs::write(dir.join(name), content).unwrap();
    }

    fn engine(&self) -> Engine {
        let engine = Engine::start(&self.config.engine, PipelineRunner::from_config(&self.config)).unwrap();
        engine.open_release(RELEASE).unwrap();
        engine.add_submission(RELEASE, PROJECT).unwrap();
        engine
    }
}

fn validate(engine: &Engine) -> SubmissionReport {
    engine.queue(RELEASE, [PROJECT], [DataType::Clinical]).unwrap();
    assert!(engine.wait_idle(TIMEOUT).unwrap());
    engine.submission(RELEASE, PROJECT).unwrap().unwrap().report
}

fn read_errors(path: &Path) -> Vec<ValidationError> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn clean_submission_becomes_valid_and_can_be_signed_off() {
    let fixture = Fixture::new();
    fixture.write("donor.txt", &format!("{DONOR}\nD1\tmale\talive\tremission\t40\n"));
    fixture.write("specimen.txt", &format!("{SPECIMEN}\nD1\tSP1\tprimary\tx\n"));

    let engine = fixture.engine();
    let report = validate(&engine);

    assert_eq!(engine.get_state(RELEASE, PROJECT).unwrap(), Some(SubmissionState::Valid));
    let run = report.last_run.expect("run summary");
    assert_eq!(run.error_count, 0);

    let errors_path = Path::new(run.errors_path.as_deref().unwrap());
    assert!(read_errors(errors_path).is_empty());
    assert!(errors_path.with_file_name(SUMMARY_FILE).exists());

    engine.sign_off(RELEASE, [PROJECT]).unwrap();
    assert_eq!(engine.get_state(RELEASE, PROJECT).unwrap(), Some(SubmissionState::SignedOff));
}

#[test]
fn integrity_errors_are_written_per_run() {
    let fixture = Fixture::new();
    fixture.write(
        "donor.txt",
        &format!("{DONOR}\nD1\tmale\talive\tremission\t40\nD2\tfemale\talive\tremission\t51\n"),
    );
    fixture.write(
        "specimen.txt",
        &format!("{SPECIMEN}\nD1\tSP1\tprimary\tx\nD1\tSP2\tprimary\tx\nD3\tSP3\tprimary\tx\n"),
    );

    let engine = fixture.engine();
    let report = validate(&engine);
    assert_eq!(engine.get_state(RELEASE, PROJECT).unwrap(), Some(SubmissionState::Invalid));
    assert_eq!(report.error_count(), 2);

    let run = report.last_run.unwrap();
    let errors_path = Path::new(run.errors_path.as_deref().unwrap());
    assert_eq!(errors_path.file_name().unwrap(), ERRORS_FILE);
    assert!(errors_path.starts_with(&fixture.config.engine.report_dir));
    assert!(errors_path.to_string_lossy().contains(&run.run_id));

    let mut types: Vec<_> = read_errors(errors_path).iter().map(|e| e.error_type).collect();
    types.sort();
    assert_eq!(types, vec![ErrorType::PrimaryRelation, ErrorType::Surjection]);

    // INVALID is read-only until the submitter asks for a new run.
    assert!(engine.files_changed(RELEASE, PROJECT, [DataType::Clinical]).is_err());
    engine.reset(RELEASE, PROJECT).unwrap();
    assert_eq!(engine.get_state(RELEASE, PROJECT).unwrap(), Some(SubmissionState::NotValidated));
}

#[test]
fn missing_submission_directory_is_an_engine_error() {
    let fixture = Fixture::new();
    fs::remove_dir_all(fixture.config.engine.fs_root.join(RELEASE).join(PROJECT)).unwrap();

    let engine = fixture.engine();
    let report = validate(&engine);

    assert_eq!(engine.get_state(RELEASE, PROJECT).unwrap(), Some(SubmissionState::Error));
    assert!(report.last_run.is_none());
}

#[test]
fn cancelled_run_leaves_no_report_on_disk() {
    let mut fixture = Fixture::new();
    fixture.config.validator.cancel_check_interval = 1;
    fixture.write("donor.txt", &format!("{DONOR}\nD1\tmale\talive\tremission\t40\n"));

    let runner = PipelineRunner::from_config(&fixture.config);
    let context = RunContext {
        release: RELEASE.into(),
        project: PROJECT.into(),
        data_types: BTreeSet::from([DataType::Clinical]),
        run_id: "run-cancelled".to_string(),
    };
    let token = CancellationToken::new();
    token.cancel();

    let output = runner.run(&context, &token).unwrap();

    assert_eq!(output.outcome, ValidationOutcome::Cancelled);
    assert!(output.report.last_run.is_none());
    assert!(!runner.run_dir(&context).exists());
}
