//! Run orchestration: classification, restart policy and the retry loop.

pub mod recovery;
pub mod run;

pub use recovery::{
    PreviousRunOutcome, RecoveryError, RestartDecision, RunClassification, TrajectorySnapshot,
    classify_run, decide, minimization_converged, newest_restart,
};
pub use run::{EngineError, EngineOutputs, LammpsEngine, RunReport, WorkflowError, run_with_recovery};
