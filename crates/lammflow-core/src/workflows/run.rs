//! Bounded compile/run/parse/recover loop around an external engine.
//!
//! The engine itself is opaque behind [`LammpsEngine`]: one blocking call
//! per attempt, no streaming. Everything around that call is the pure
//! machinery from the other modules, so the loop body is a straight
//! compile → execute → parse → classify → decide sequence.

use super::recovery::{
    self, PreviousRunOutcome, RecoveryError, RestartDecision, RunClassification,
    TrajectorySnapshot,
};
use crate::core::models::parameters::ParameterSet;
use crate::core::models::potential::Potential;
use crate::core::models::structure::Structure;
use crate::parse::finals::{FinalsError, parse_final_variables};
use crate::parse::log::{ParsedRun, parse_log};
use crate::script::{CompileError, CompiledScript, ScriptFilenames, compile};
use crate::store::{StoreError, TrajectoryStore};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
#[error("engine invocation failed: {0}")]
pub struct EngineError(pub String);

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// An expected output artifact was not retrieved. Infrastructure
    /// failure, never retried.
    #[error("engine produced no {artifact} output")]
    MissingOutput { artifact: &'static str },
    #[error(transparent)]
    Finals(#[from] FinalsError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    #[error("run did not complete within {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },
}

/// Raw artifacts one engine invocation came back with. Optional fields are
/// simply absent when the engine did not produce (or the transport did not
/// retrieve) the artifact.
#[derive(Debug, Clone, Default)]
pub struct EngineOutputs {
    pub exit_code: i32,
    pub log: Option<String>,
    pub trajectory: Option<String>,
    pub final_variables: Option<String>,
    /// Handles of persisted restart artifacts; the driver resumes from the
    /// one with the highest step number in its filename.
    pub restart_files: Vec<String>,
    /// Locators of restart artifacts left in the remote working directory.
    pub remote_restarts: Vec<String>,
}

/// The one boundary crossing: a blocking call that runs the script and
/// hands back whatever came out. Cancellation and scheduling are the
/// implementor's concern.
pub trait LammpsEngine {
    fn execute(
        &mut self,
        script: &CompiledScript,
        walltime_multiplier: f64,
    ) -> Result<EngineOutputs, EngineError>;
}

/// Outputs of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub parsed: ParsedRun,
    pub final_variables: BTreeMap<String, f64>,
    pub trajectory: TrajectoryStore,
    /// Number of attempts it took, including the successful one.
    pub attempts: u32,
}

/// Runs a job to completion, recovering from interrupted or unconverged
/// attempts per the restart policy, up to `max_attempts` invocations.
pub fn run_with_recovery<E: LammpsEngine>(
    engine: &mut E,
    params: &ParameterSet,
    potential: &Potential,
    structure: &Structure,
    filenames: &ScriptFilenames,
    max_attempts: u32,
) -> Result<RunReport, WorkflowError> {
    let mut params = params.clone();
    let mut structure = structure.clone();
    let mut restart_source: Option<String> = None;
    let mut walltime_multiplier = 1.0;

    for attempt in 1..=max_attempts {
        let script = compile(
            &params,
            potential,
            &structure,
            filenames,
            restart_source.as_deref(),
        )?;
        info!(attempt, restart = restart_source.is_some(), "invoking engine");
        let outputs = engine.execute(&script, walltime_multiplier)?;

        let log = outputs
            .log
            .as_deref()
            .ok_or(WorkflowError::MissingOutput { artifact: "log" })?;
        let parsed = parse_log(log);
        let classification =
            recovery::classify_run(outputs.exit_code, &parsed, params.minimize.as_ref());

        if classification == RunClassification::Completed {
            let dump = outputs
                .trajectory
                .as_deref()
                .ok_or(WorkflowError::MissingOutput { artifact: "trajectory" })?;
            let trajectory = TrajectoryStore::from_dump_text(dump)?;
            let finals_text = outputs
                .final_variables
                .as_deref()
                .ok_or(WorkflowError::MissingOutput { artifact: "final variables" })?;
            let final_variables = parse_final_variables(finals_text)?;
            info!(attempt, "run completed");
            return Ok(RunReport {
                parsed,
                final_variables,
                trajectory,
                attempts: attempt,
            });
        }

        warn!(attempt, ?classification, "attempt did not complete");

        // the interrupted attempt's trajectory, if readable, is the lowest
        // priority restart source
        let trajectory = outputs
            .trajectory
            .as_deref()
            .and_then(|dump| TrajectoryStore::from_dump_text(dump).ok())
            .filter(|store| !store.is_empty());
        let snapshot = trajectory.as_ref().map(|store| TrajectorySnapshot {
            step_index: store.len() - 1,
            timestep: store.timesteps()[store.len() - 1],
        });

        let outcome = PreviousRunOutcome {
            classification,
            restart_file: recovery::newest_restart(&outputs.restart_files).cloned(),
            remote_restart: recovery::newest_restart(&outputs.remote_restarts).cloned(),
            trajectory: snapshot,
        };
        let Some(decision) = recovery::decide(&outcome)? else {
            continue;
        };

        params = recovery::apply(&params, &decision);
        restart_source = None;
        match &decision {
            RestartDecision::FromRestartFile { handle, .. } => {
                restart_source = Some(handle.clone());
            }
            RestartDecision::FromRemoteArtifact { locator, .. } => {
                restart_source = Some(locator.clone());
            }
            RestartDecision::FromTrajectoryStructure { step_index, .. } => {
                // trajectory presence is implied by the decision
                if let Some(store) = &trajectory {
                    structure = store.structure(*step_index, Some(&structure))?;
                }
            }
            RestartDecision::FromScratch {
                walltime_multiplier: multiplier,
            } => {
                walltime_multiplier *= multiplier;
            }
        }
    }

    Err(WorkflowError::AttemptsExhausted {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::potential::{CoefficientData, PairStyle};
    use crate::core::models::structure::fixtures::binary_cell;

    const COMPLETE_LOG: &str = "\
Unit style    : metal
   Step          Temp         TotEng
         0   300.0         -8.7953247
       100   298.2         -8.7985427
Total wall time: 0:00:05
";

    const DUMP: &str = "\
ITEM: TIMESTEP
100
ITEM: NUMBER OF ATOMS
3
ITEM: BOX BOUNDS pp pp pp
0.0 2.8
0.0 2.8
0.0 2.8
ITEM: ATOMS id type element x y z
1 1 Fe 0.1 0.0 0.0
2 1 Fe 1.5 1.4 0.0
3 2 C 1.5 0.0 1.4
";

    const FINALS: &str = "#Final results\nfinal_step: 100\nfinal_etotal: -8.7985427\n";

    fn success_outputs() -> EngineOutputs {
        EngineOutputs {
            exit_code: 0,
            log: Some(COMPLETE_LOG.to_string()),
            trajectory: Some(DUMP.to_string()),
            final_variables: Some(FINALS.to_string()),
            ..EngineOutputs::default()
        }
    }

    /// Engine double replaying a fixed sequence of outcomes and recording
    /// the scripts it was handed.
    struct ScriptedEngine {
        outcomes: Vec<EngineOutputs>,
        scripts: Vec<String>,
        multipliers: Vec<f64>,
    }

    impl ScriptedEngine {
        fn new(outcomes: Vec<EngineOutputs>) -> Self {
            Self {
                outcomes,
                scripts: Vec::new(),
                multipliers: Vec::new(),
            }
        }
    }

    impl LammpsEngine for ScriptedEngine {
        fn execute(
            &mut self,
            script: &CompiledScript,
            walltime_multiplier: f64,
        ) -> Result<EngineOutputs, EngineError> {
            self.scripts.push(script.text.clone());
            self.multipliers.push(walltime_multiplier);
            if self.outcomes.is_empty() {
                return Err(EngineError("no scripted outcome left".to_string()));
            }
            Ok(self.outcomes.remove(0))
        }
    }

    fn md_job() -> (ParameterSet, Potential, Structure) {
        let params = ParameterSet::from_toml_str(
            r#"
            [md]
            max_number_steps = 100

            [[fix]]
            style = "nvt"
            args = ["temp", 300.0, 300.0, 0.1]

            [[velocity]]
            create = { temp = 300.0 }
            "#,
        )
        .unwrap();
        let potential = Potential::new(
            PairStyle::EamAlloy,
            None,
            None,
            CoefficientData::Stored {
                handle: "FeC.eam.alloy".into(),
            },
        )
        .unwrap();
        (params, potential, binary_cell())
    }

    #[test]
    fn first_attempt_success_returns_the_report() {
        let (params, potential, structure) = md_job();
        let mut engine = ScriptedEngine::new(vec![success_outputs()]);
        let report = run_with_recovery(
            &mut engine,
            &params,
            &potential,
            &structure,
            &ScriptFilenames::default(),
            3,
        )
        .unwrap();
        assert_eq!(report.attempts, 1);
        assert_eq!(report.final_variables["final_step"], 100.0);
        assert_eq!(report.trajectory.len(), 1);
        assert!(report.parsed.is_complete());
        assert!(engine.scripts[0].contains("velocity all create 300"));
    }

    #[test]
    fn walltime_interruption_resumes_from_the_restart_file() {
        let (params, potential, structure) = md_job();
        let interrupted = EngineOutputs {
            exit_code: 400,
            log: Some("Step Temp TotEng\n0 300.0 -8.79\n".to_string()),
            restart_files: vec![
                "lammps.restart.20".to_string(),
                "lammps.restart.60".to_string(),
                "lammps.restart.40".to_string(),
            ],
            ..EngineOutputs::default()
        };
        let mut engine = ScriptedEngine::new(vec![interrupted, success_outputs()]);
        let report = run_with_recovery(
            &mut engine,
            &params,
            &potential,
            &structure,
            &ScriptFilenames::default(),
            3,
        )
        .unwrap();
        assert_eq!(report.attempts, 2);
        let resumed = &engine.scripts[1];
        // the newest of the three intermediate artifacts wins
        assert!(resumed.contains("read_restart lammps.restart.60"));
        assert!(!resumed.contains("read_data"));
        assert!(resumed.contains("reset_timestep 60"));
        // velocities come from the restart state, not a fresh create
        assert!(!resumed.contains("velocity all create"));
    }

    #[test]
    fn walltime_without_sources_reruns_with_more_walltime() {
        let (params, potential, structure) = md_job();
        let interrupted = EngineOutputs {
            exit_code: 400,
            log: Some("Step Temp TotEng\n".to_string()),
            ..EngineOutputs::default()
        };
        let mut engine = ScriptedEngine::new(vec![interrupted, success_outputs()]);
        let report = run_with_recovery(
            &mut engine,
            &params,
            &potential,
            &structure,
            &ScriptFilenames::default(),
            3,
        )
        .unwrap();
        assert_eq!(report.attempts, 2);
        assert_eq!(engine.multipliers, vec![1.0, 1.5]);
        // a scratch rerun compiles the same script again
        assert_eq!(engine.scripts[0], engine.scripts[1]);
    }

    #[test]
    fn interrupted_md_falls_back_to_the_trajectory_snapshot() {
        let (params, potential, structure) = md_job();
        let interrupted = EngineOutputs {
            exit_code: 400,
            log: Some("Step Temp TotEng\n".to_string()),
            trajectory: Some(DUMP.to_string()),
            ..EngineOutputs::default()
        };
        let mut engine = ScriptedEngine::new(vec![interrupted, success_outputs()]);
        let report = run_with_recovery(
            &mut engine,
            &params,
            &potential,
            &structure,
            &ScriptFilenames::default(),
            3,
        )
        .unwrap();
        assert_eq!(report.attempts, 2);
        let resumed = &engine.scripts[1];
        // structure snapshot restart recompiles a full structure block
        assert!(resumed.contains("read_data"));
        assert!(resumed.contains("reset_timestep 100"));
    }

    #[test]
    fn unconverged_minimization_retries_from_the_last_snapshot() {
        let params = ParameterSet::from_toml_str(
            r#"
            [minimize]
            energy_tolerance = 1e-10
            "#,
        )
        .unwrap();
        let (_, potential, structure) = md_job();

        let unconverged_log = "\
Unit style    : metal
Minimization stats:
  Stopping criterion = max iterations
  Energy initial, next-to-last, final =
     -10.0     -9.0     -5.0
  Force two-norm initial, final = 1.4302 0.52
  Iterations, force evaluations = 1000 2000

Total wall time: 0:00:09
";
        let stalled = EngineOutputs {
            exit_code: 0,
            log: Some(unconverged_log.to_string()),
            trajectory: Some(DUMP.to_string()),
            ..EngineOutputs::default()
        };
        let mut engine = ScriptedEngine::new(vec![stalled, success_outputs()]);
        let report = run_with_recovery(
            &mut engine,
            &params,
            &potential,
            &structure,
            &ScriptFilenames::default(),
            3,
        )
        .unwrap();
        assert_eq!(report.attempts, 2);
        // the retry minimizes again from the snapshot geometry
        let resumed = &engine.scripts[1];
        assert!(resumed.contains("read_data"));
        assert!(resumed.contains("min_style cg"));
    }

    #[test]
    fn engine_errors_abort_the_workflow() {
        let (params, potential, structure) = md_job();
        let failed = EngineOutputs {
            exit_code: 1,
            log: Some("ERROR: bad input\n".to_string()),
            restart_files: vec!["lammps.restart.60".to_string()],
            ..EngineOutputs::default()
        };
        let mut engine = ScriptedEngine::new(vec![failed, success_outputs()]);
        let err = run_with_recovery(
            &mut engine,
            &params,
            &potential,
            &structure,
            &ScriptFilenames::default(),
            3,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Recovery(RecoveryError::Unrecoverable(_))
        ));
        assert_eq!(engine.scripts.len(), 1);
    }

    #[test]
    fn missing_log_is_an_infrastructure_error() {
        let (params, potential, structure) = md_job();
        let mut engine = ScriptedEngine::new(vec![EngineOutputs::default()]);
        let err = run_with_recovery(
            &mut engine,
            &params,
            &potential,
            &structure,
            &ScriptFilenames::default(),
            3,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::MissingOutput { artifact: "log" }
        ));
    }

    #[test]
    fn file_backed_engine_round_trips_artifacts_through_disk() {
        use std::fs;

        struct FileEngine {
            dir: tempfile::TempDir,
        }

        impl LammpsEngine for FileEngine {
            fn execute(
                &mut self,
                script: &CompiledScript,
                _walltime_multiplier: f64,
            ) -> Result<EngineOutputs, EngineError> {
                let io = |err: std::io::Error| EngineError(err.to_string());
                let root = self.dir.path();
                fs::write(root.join("input.lammps"), &script.text).map_err(io)?;
                fs::write(root.join("log.lammps"), COMPLETE_LOG).map_err(io)?;
                fs::write(root.join("lammflow.trajectory.dump"), DUMP).map_err(io)?;
                fs::write(root.join("lammflow.variables.dat"), FINALS).map_err(io)?;
                Ok(EngineOutputs {
                    exit_code: 0,
                    log: fs::read_to_string(root.join("log.lammps")).ok(),
                    trajectory: fs::read_to_string(root.join("lammflow.trajectory.dump")).ok(),
                    final_variables: fs::read_to_string(root.join("lammflow.variables.dat")).ok(),
                    ..EngineOutputs::default()
                })
            }
        }

        let (params, potential, structure) = md_job();
        let mut engine = FileEngine {
            dir: tempfile::tempdir().unwrap(),
        };
        let report = run_with_recovery(
            &mut engine,
            &params,
            &potential,
            &structure,
            &ScriptFilenames::default(),
            1,
        )
        .unwrap();
        assert_eq!(report.attempts, 1);
        assert_eq!(report.final_variables["final_etotal"], -8.7985427);
        assert!(engine.dir.path().join("input.lammps").exists());
    }

    #[test]
    fn attempts_bound_is_enforced() {
        let (params, potential, structure) = md_job();
        let interrupted = || EngineOutputs {
            exit_code: 400,
            log: Some("Step Temp TotEng\n".to_string()),
            ..EngineOutputs::default()
        };
        let mut engine = ScriptedEngine::new(vec![interrupted(), interrupted()]);
        let err = run_with_recovery(
            &mut engine,
            &params,
            &potential,
            &structure,
            &ScriptFilenames::default(),
            2,
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::AttemptsExhausted { attempts: 2 }));
    }
}
