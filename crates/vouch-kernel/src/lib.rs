//! # vouch-kernel: Functional core of `Vouch`
//!
//! The kernel owns the submission and release lifecycle. It receives
//! commands and produces state changes plus effects to execute.
//!
//! ## Key Principles
//!
//! - **No IO**: The kernel never reads submission files or writes reports
//! - **No clocks**: Run ids and timestamps are produced by the engine
//! - **Pure functions**: `apply_committed(state, command) -> (state, effects)`
//! - **Guarded transitions**: every command checks its preconditions first
//!   and leaves the state untouched when one fails
//!
//! ## Architecture
//!
//! - [`command`]: Commands that can be submitted (`Queue`, `SignOff`, ...)
//! - [`effects`]: Effects for the engine to execute (`ValidationQueued`, `CancelValidation`)
//! - [`state`]: Releases, their FIFO validation queues and submissions
//! - [`kernel`]: The `apply_committed` function that ties it all together
//!
//! ## Example
//!
//! ```
//! use vouch_kernel::{Command, State, apply_committed};
//!
//! let state = State::new();
//! let (state, _) = apply_committed(state, Command::open_release("release1")).unwrap();
//! let (state, _) = apply_committed(state, Command::add_submission("release1", "PACA-CA")).unwrap();
//! assert_eq!(state.submission_count(), 1);
//! ```

pub mod command;
pub mod effects;
pub mod kernel;
pub mod state;


pub use command::Command;
pub use effects::Effect;
pub use kernel::{KernelError, apply_committed};
pub use state::{QueuedValidation, Release, State, Submission};
