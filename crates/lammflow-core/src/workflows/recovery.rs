//! Classification of a finished run and the restart decision policy.
//!
//! Everything here is pure: the classifier looks only at the exit code and
//! the parsed log, and the decision function looks only at an explicit
//! [`PreviousRunOutcome`] snapshot built after each attempt. The retry loop
//! around them lives in [`super::run`].

use crate::core::models::parameters::{MinimizeParameters, ParameterSet};
use crate::parse::log::{MinimizationStats, ParsedRun};
use thiserror::Error;
use tracing::info;

/// Exit code the engine wrapper reports when the scheduler killed the run.
pub const EXIT_OUT_OF_WALLTIME: i32 = 400;
/// Minimization stopped without meeting the energy tolerance.
pub const EXIT_ENERGY_NOT_CONVERGED: i32 = 401;
/// Minimization stopped without meeting the force tolerance.
pub const EXIT_FORCE_NOT_CONVERGED: i32 = 402;

/// Terminal state of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunClassification {
    Completed,
    OutOfWalltime,
    NotConverged,
    /// Hard failure with the stable symbolic reason reported to the user.
    Failed { reason: String },
}

/// Whether the parsed minimization stats satisfy the requested tolerances.
///
/// The engine stops as soon as any of its criteria fires, so a run that
/// hit its iteration cap reports a final state meeting neither tolerance.
/// Both figures are checked against the request: an energy change or a
/// final force two-norm above its tolerance means the run stopped short.
pub fn minimization_converged(stats: &MinimizationStats, minimize: &MinimizeParameters) -> bool {
    if stats.energy_relative_change.abs() > minimize.energy_tolerance() {
        return false;
    }
    if let Some(force) = stats.force_two_norm_final
        && force > minimize.force_tolerance()
    {
        return false;
    }
    true
}

/// Classifies a terminated run from its exit code, parsed log and the
/// minimization request, if the run was one.
///
/// `ERROR` lines in the log dominate everything else, including a zero
/// exit code. A clean exit with a log that never reached its wall-time
/// footer is treated as an interrupted run. A clean, complete minimization
/// whose reported stats miss the requested tolerances is reclassified as
/// not converged; the engine itself exits zero in that case.
pub fn classify_run(
    exit_code: i32,
    parsed: &ParsedRun,
    minimize: Option<&MinimizeParameters>,
) -> RunClassification {
    if parsed.has_errors() {
        return RunClassification::Failed {
            reason: parsed.errors[0].clone(),
        };
    }
    match exit_code {
        EXIT_OUT_OF_WALLTIME => RunClassification::OutOfWalltime,
        EXIT_ENERGY_NOT_CONVERGED | EXIT_FORCE_NOT_CONVERGED => RunClassification::NotConverged,
        0 if parsed.is_complete() => {
            if let (Some(minimize), Some(stats)) = (minimize, &parsed.minimization)
                && !minimization_converged(stats, minimize)
            {
                return RunClassification::NotConverged;
            }
            RunClassification::Completed
        }
        0 => RunClassification::OutOfWalltime,
        code => RunClassification::Failed {
            reason: format!("engine exited with code {code}"),
        },
    }
}

/// Position of the last usable trajectory snapshot of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrajectorySnapshot {
    pub step_index: usize,
    pub timestep: i64,
}

/// Everything the decision policy may draw on after one attempt, built
/// explicitly instead of probing the attempt's outputs ad hoc.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousRunOutcome {
    pub classification: RunClassification,
    /// Restart artifact persisted from the attempt, by storage handle.
    pub restart_file: Option<String>,
    /// Restart artifact still present in the attempt's remote working
    /// directory, by locator.
    pub remote_restart: Option<String>,
    pub trajectory: Option<TrajectorySnapshot>,
}

/// How the next attempt resumes.
#[derive(Debug, Clone, PartialEq)]
pub enum RestartDecision {
    FromRestartFile { handle: String, timestep: i64 },
    FromRemoteArtifact { locator: String, timestep: i64 },
    FromTrajectoryStructure { step_index: usize, timestep: i64 },
    FromScratch { walltime_multiplier: f64 },
}

#[derive(Debug, Error, PartialEq)]
pub enum RecoveryError {
    #[error("unrecoverable failure: {0}")]
    Unrecoverable(String),
    #[error("run did not converge and no restart source is available")]
    NoRestartSource,
}

/// Extracts the step number encoded in a restart artifact's filename by
/// keeping only its digits: `lammps.restart.3000` → 3000. Files without
/// digits count as step 0.
pub fn extract_step_number(name: &str) -> i64 {
    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Picks the candidate restart artifact with the highest encoded step
/// number. An interrupted run leaves several intermediate files; only the
/// most recent one is worth resuming from.
pub fn newest_restart(candidates: &[String]) -> Option<&String> {
    candidates
        .iter()
        .max_by_key(|name| extract_step_number(name))
}

/// Picks the restart strategy for a terminated attempt.
///
/// Returns `Ok(None)` when the attempt completed. Restart sources are
/// tried in fixed preference order: persisted restart file, remote restart
/// artifact, trajectory snapshot, and (wall-time only) from scratch with a
/// 1.5x wall-time budget. Non-convergence never restarts from scratch:
/// a finished minimization always leaves a trajectory, so an outcome with
/// no source at all means the outputs are unusable.
pub fn decide(outcome: &PreviousRunOutcome) -> Result<Option<RestartDecision>, RecoveryError> {
    match &outcome.classification {
        RunClassification::Completed => return Ok(None),
        RunClassification::Failed { reason } => {
            return Err(RecoveryError::Unrecoverable(reason.clone()));
        }
        RunClassification::OutOfWalltime | RunClassification::NotConverged => {}
    }

    if let Some(handle) = &outcome.restart_file {
        let decision = RestartDecision::FromRestartFile {
            handle: handle.clone(),
            timestep: extract_step_number(handle),
        };
        info!(handle = %handle, "resuming from persisted restart file");
        return Ok(Some(decision));
    }
    if let Some(locator) = &outcome.remote_restart {
        let decision = RestartDecision::FromRemoteArtifact {
            locator: locator.clone(),
            timestep: extract_step_number(locator),
        };
        info!(locator = %locator, "resuming from remote restart artifact");
        return Ok(Some(decision));
    }
    if let Some(snapshot) = outcome.trajectory {
        info!(
            step = snapshot.step_index,
            timestep = snapshot.timestep,
            "resuming from trajectory snapshot"
        );
        return Ok(Some(RestartDecision::FromTrajectoryStructure {
            step_index: snapshot.step_index,
            timestep: snapshot.timestep,
        }));
    }
    if outcome.classification == RunClassification::OutOfWalltime {
        info!("no restart source, rerunning from scratch with extended walltime");
        return Ok(Some(RestartDecision::FromScratch {
            walltime_multiplier: 1.5,
        }));
    }
    Err(RecoveryError::NoRestartSource)
}

/// Produces the parameter set for the next attempt. The original is never
/// mutated.
///
/// Resuming mid-run strips every initial-velocity directive (the restart
/// state already carries the correct kinetic state) and restarts the
/// timestep counter at the last completed step. A from-scratch rerun keeps
/// the original parameters untouched.
pub fn apply(params: &ParameterSet, decision: &RestartDecision) -> ParameterSet {
    let mut next = params.clone();
    let timestep = match decision {
        RestartDecision::FromRestartFile { timestep, .. }
        | RestartDecision::FromRemoteArtifact { timestep, .. }
        | RestartDecision::FromTrajectoryStructure { timestep, .. } => *timestep,
        RestartDecision::FromScratch { .. } => return next,
    };
    next.velocity.clear();
    if let Some(md) = &mut next.md {
        md.reset_timestep = Some(timestep);
    }
    next
}
