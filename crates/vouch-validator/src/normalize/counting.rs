use super::{Counters, NormalizationStep, Observation};
use crate::error::NormalizationError;

/// Where in the chain a counting step sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Start,
    End,
}

/// Tags the running total at the start or the end of the chain.
#[derive(Debug)]
pub struct CountingStep {
    position: Position,
}

impl CountingStep {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

impl NormalizationStep for CountingStep {
    fn name(&self) -> &'static str {
        match self.position {
            Position::Start => "count_start",
            Position::End => "count_end",
        }
    }

    fn process(
        &mut self,
        observation: Observation,
        out: &mut Vec<Observation>,
        counters: &mut Counters,
    ) -> Result<(), NormalizationError> {
        match self.position {
            Position::Start => counters.total_start += 1,
            Position::End => counters.total_end += 1,
        }
        out.push(observation);
        Ok(())
    }
}
