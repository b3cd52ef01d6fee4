//! Cooperative cancellation and progress reporting for row loops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ValidatorError;

/// Shared interrupt flag for one validation run.
///
/// Cancellation is advisory: row loops poll the flag every
/// `cancel_check_interval` rows and unwind with
/// [`ValidatorError::Cancelled`] at the next poll.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Fails with [`ValidatorError::Cancelled`] if the flag is set.
    pub fn check(&self) -> Result<(), ValidatorError> {
        if self.is_cancelled() {
            return Err(ValidatorError::Cancelled);
        }
        Ok(())
    }
}

/// Per-file row counter that polls for cancellation and logs progress.
#[derive(Debug)]
pub struct Checkpoint<'a> {
    token: &'a CancellationToken,
    cancel_interval: u64,
    log_interval: u64,
    file_name: &'a str,
    rows: u64,
}

impl<'a> Checkpoint<'a> {
    pub fn new(
        token: &'a CancellationToken,
        cancel_interval: u64,
        log_interval: u64,
        file_name: &'a str,
    ) -> Self {
        Self {
            token,
            cancel_interval: cancel_interval.max(1),
            log_interval: log_interval.max(1),
            file_name,
            rows: 0,
        }
    }

    /// Counts one row.
    pub fn tick(&mut self) -> Result<(), ValidatorError> {
        self.rows += 1;
        if self.rows % self.cancel_interval == 0 {
            self.token.check()?;
        }
        if self.rows % self.log_interval == 0 {
            tracing::info!(file = self.file_name, rows = self.rows, "processing");
        }
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
        assert!(clone.check().is_err());
    }

    #[test]
    fn checkpoint_polls_only_on_interval() {
        let token = CancellationToken::new();
        token.cancel();
        let mut checkpoint = Checkpoint::new(&token, 3, 1_000, "donor.txt");

        assert!(checkpoint.tick().is_ok());
        assert!(checkpoint.tick().is_ok());
        assert!(matches!(checkpoint.tick(), Err(ValidatorError::Cancelled)));
        assert_eq!(checkpoint.rows(), 3);
    }

    #[test]
    fn uncancelled_checkpoint_runs_through() {
        let token = CancellationToken::new();
        let mut checkpoint = Checkpoint::new(&token, 1, 2, "donor.txt");
        for _ in 0..10 {
            checkpoint.tick().expect("not cancelled");
        }
        assert_eq!(checkpoint.rows(), 10);
    }
}
