//! Normalization of simple somatic mutation observations.
//!
//! Accepted SSM_P rows are pushed one at a time through an ordered chain of
//! [`NormalizationStep`]s. A step may drop an observation, pass it on, or emit
//! extra observations (a masked copy). What leaves the chain is written out
//! with its [`Marking`] appended as a last column.
//!
//! Once the input is exhausted the share of observations marked CONTROLLED is
//! compared to the configured threshold. Exceeding it fails the submission
//! with a single `THRESHOLD_EXCEEDED` error.

mod counting;
mod dedup;
mod masking;

use std::fmt;
use std::io::{BufRead, Write};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use vouch_config::{NormalizerConfig, ValidatorConfig};
use vouch_types::{ErrorType, FileType};

pub use counting::{CountingStep, Position};
pub use dedup::RedundantObservationRemoval;
pub use masking::{AlleleMasking, MaskingColumns};

use crate::cancel::{CancellationToken, Checkpoint};
use crate::dictionary::FileSchema;
use crate::error::{NormalizationError, ValidatorError};
use crate::reader::{FIELD_SEPARATOR, LineReader};
use crate::report::{Reporter, ValidationError};

/// File name of the normalized output inside a run directory.
pub const NORMALIZED_FILE: &str = "ssm_p.normalized.txt";

/// Privacy classification of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Marking {
    Open,
    Controlled,
    Masked,
}

impl Marking {
    pub fn as_str(self) -> &'static str {
        match self {
            Marking::Open => "OPEN",
            Marking::Controlled => "CONTROLLED",
            Marking::Masked => "MASKED",
        }
    }
}

impl fmt::Display for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row travelling through the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub line: u64,
    pub fields: Vec<Bytes>,
    pub marking: Marking,
}

impl Observation {
    pub fn new(line: u64, fields: Vec<Bytes>) -> Self {
        Self {
            line,
            fields,
            marking: Marking::Open,
        }
    }

    pub fn field(&self, index: usize) -> &[u8] {
        self.fields.get(index).map_or(&[][..], |field| &field[..])
    }
}

/// Running totals kept by the steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub total_start: u64,
    pub dropped: u64,
    pub unique_remaining: u64,
    pub marked_as_controlled: u64,
    pub masked: u64,
    pub total_end: u64,
}

impl Counters {
    /// Share of incoming observations marked CONTROLLED; 0 when empty.
    pub fn controlled_ratio(&self) -> f64 {
        if self.total_start == 0 {
            return 0.0;
        }
        self.marked_as_controlled as f64 / self.total_start as f64
    }
}

pub trait NormalizationStep: Send {
    fn name(&self) -> &'static str;

    /// Configuration switch of a step that can be turned off, `None` for
    /// steps that always run.
    fn optional(&self) -> Option<&'static str> {
        None
    }

    /// Consumes one observation, pushing whatever continues down the chain.
    fn process(
        &mut self,
        observation: Observation,
        out: &mut Vec<Observation>,
        counters: &mut Counters,
    ) -> Result<(), NormalizationError>;
}

/// Outcome of a normalization run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationSummary {
    pub counters: Counters,
    pub ratio: f64,
    pub threshold: f64,
    pub threshold_exceeded: bool,
}

pub struct Normalizer {
    steps: Vec<Box<dyn NormalizationStep>>,
    threshold: f64,
    cancel_interval: u64,
    log_interval: u64,
}

impl Normalizer {
    /// Builds the default chain for the SSM_P schema, leaving out optional
    /// steps the configuration disables.
    pub fn new(
        schema: &FileSchema,
        config: &NormalizerConfig,
        validator: &ValidatorConfig,
    ) -> Result<Self, ValidatorError> {
        let candidates: Vec<Box<dyn NormalizationStep>> = vec![
            Box::new(CountingStep::new(Position::Start)),
            Box::new(RedundantObservationRemoval::new()),
            Box::new(AlleleMasking::new(
                MaskingColumns::from_schema(schema)?,
                config.marking_only,
            )),
            Box::new(CountingStep::new(Position::End)),
        ];

        let steps = candidates
            .into_iter()
            .filter(|step| match step.optional() {
                Some("duplicates") => config.steps.duplicates,
                Some("masking") => config.steps.masking,
                _ => true,
            })
            .collect();

        Ok(Self::with_steps(steps, config.error_threshold)
            .with_intervals(validator.cancel_check_interval, validator.progress_log_interval))
    }

    pub fn with_steps(steps: Vec<Box<dyn NormalizationStep>>, threshold: f64) -> Self {
        Self {
            steps,
            threshold,
            cancel_interval: u64::MAX,
            log_interval: u64::MAX,
        }
    }

    pub fn with_intervals(mut self, cancel_interval: u64, log_interval: u64) -> Self {
        self.cancel_interval = cancel_interval;
        self.log_interval = log_interval;
        self
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Normalizes one SSM_P file, writing the result to `output`.
    ///
    /// `write_header` is set for the first of several split files.
    pub fn normalize_file(
        &mut self,
        file_name: &str,
        input: impl BufRead,
        output: &mut dyn Write,
        write_header: bool,
        counters: &mut Counters,
        token: &CancellationToken,
    ) -> Result<(), ValidatorError> {
        let mut lines = LineReader::new(input);
        let mut checkpoint = Checkpoint::new(token, self.cancel_interval, self.log_interval, file_name);
        let mut batch = Vec::new();
        let mut next = Vec::new();

        while let Some(line) = lines.next_line().map_err(|e| ValidatorError::io(file_name, e))? {
            if line.number == 1 {
                if write_header {
                    output.write_all(line.content).map_err(NormalizationError::from)?;
                    output.write_all(b"\tmarking\n").map_err(NormalizationError::from)?;
                }
                continue;
            }
            if line.is_blank() {
                continue;
            }
            checkpoint.tick()?;

            let fields = line.fields().map(Bytes::copy_from_slice).collect();
            batch.push(Observation::new(line.number, fields));
            for step in &mut self.steps {
                for observation in batch.drain(..) {
                    step.process(observation, &mut next, counters)?;
                }
                std::mem::swap(&mut batch, &mut next);
            }
            for observation in batch.drain(..) {
                write_observation(output, &observation)?;
            }
        }
        Ok(())
    }

    /// Applies the threshold gate, reporting a submission-level error when
    /// too many observations are controlled.
    pub fn finish(
        &self,
        counters: Counters,
        file_name: &str,
        reporter: &mut Reporter,
    ) -> Result<NormalizationSummary, ValidatorError> {
        let ratio = counters.controlled_ratio();
        let threshold_exceeded = ratio > self.threshold;
        if threshold_exceeded {
            reporter.report(
                ValidationError::new(ErrorType::ThresholdExceeded, Some(FileType::SsmP), file_name)
                    .with_value(vec![ratio.to_string()])
                    .with_params(serde_json::json!([self.threshold])),
            )?;
        }

        tracing::info!(
            total_start = counters.total_start,
            dropped = counters.dropped,
            unique_remaining = counters.unique_remaining,
            marked_as_controlled = counters.marked_as_controlled,
            masked = counters.masked,
            total_end = counters.total_end,
            ratio,
            "normalization finished"
        );

        Ok(NormalizationSummary {
            counters,
            ratio,
            threshold: self.threshold,
            threshold_exceeded,
        })
    }
}

fn write_observation(output: &mut dyn Write, observation: &Observation) -> Result<(), NormalizationError> {
    for (i, field) in observation.fields.iter().enumerate() {
        if i > 0 {
            output.write_all(&[FIELD_SEPARATOR])?;
        }
        output.write_all(field)?;
    }
    output.write_all(&[FIELD_SEPARATOR])?;
    output.write_all(observation.marking.as_str().as_bytes())?;
    output.write_all(b"\n")?;
    Ok(())
}
