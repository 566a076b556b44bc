//! Parsers for the three output artifacts of a run.
//!
//! The console-log, trajectory and final-variables parsers share no state
//! and can be applied independently. The log parser is deliberately
//! lenient: console output is free-form engine chatter and only the fixed
//! markers it scans for carry meaning. The trajectory parser is strict:
//! the dump format is machine-written, and a malformed step is a hard
//! structural error, never skipped.

pub mod finals;
pub mod log;
pub mod trajectory;

pub use finals::{FinalsError, parse_final_variables};
pub use log::{MinimizationStats, ParsedRun, TimeTable, parse_log};
pub use trajectory::{StepIter, TrajectoryError, TrajectoryStep, parse_trajectory};
