//! Single-pass parser for the engine's console log.
//!
//! The log is scanned line by line with no backtracking. Fixed markers
//! (`ERROR`, `WARNING`, `Performance:`, `Unit style`, `Minimization
//! stats:`, `Total wall time:`, a `Step …` header) are recognized anywhere
//! in the stream; everything else is engine chatter and ignored. Once a
//! `Step` header is seen, every following line whose first token is numeric
//! becomes one row of the time-dependent table; the first non-numeric line
//! ends capture, so timing footers cannot corrupt the table.

use std::collections::BTreeMap;

/// Minimization diagnostics reported after a `minimize` run.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizationStats {
    /// Literal stopping criterion, e.g. `energy tolerance`.
    pub stop_criterion: String,
    /// The three energies on the line after `Energy initial, next-to-last,
    /// final =`.
    pub energy_initial: f64,
    pub energy_next_to_last: f64,
    pub energy_final: f64,
    /// `(E_prev - E_final) / E_final`, matching the engine's own stopping
    /// test. Stored signed; callers compare magnitudes.
    pub energy_relative_change: f64,
    /// The two values on the `Force two-norm initial, final =` line.
    pub force_two_norm_initial: Option<f64>,
    pub force_two_norm_final: Option<f64>,
    pub iterations: Option<u64>,
    pub force_evaluations: Option<u64>,
}

/// The per-step thermo table, column-major.
///
/// Columns are unioned across multiple `Step` headers (one run can emit
/// several tables); rows missing a column are padded with NaN so every
/// column always has one entry per captured row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeTable {
    columns: Vec<String>,
    values: BTreeMap<String, Vec<f64>>,
    rows: usize,
}

impl TimeTable {
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column names in first-appearance order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.values.get(name).map(Vec::as_slice)
    }

    fn push_row(&mut self, header: &[String], row: &[f64]) {
        for name in header {
            if !self.values.contains_key(name) {
                self.columns.push(name.clone());
                self.values.insert(name.clone(), vec![f64::NAN; self.rows]);
            }
        }
        for (name, &value) in header.iter().zip(row) {
            if let Some(column) = self.values.get_mut(name) {
                column.push(value);
            }
        }
        for (name, column) in &mut self.values {
            if !header.contains(name) {
                column.push(f64::NAN);
            }
        }
        self.rows += 1;
    }
}

/// Everything extracted from one console log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRun {
    /// Literal `ERROR…` lines. Non-empty means the run failed, independent
    /// of the exit code.
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// `Performance:` figures keyed by their unit, e.g. `ns/day`.
    pub performance: BTreeMap<String, f64>,
    /// Unit system the engine reported via `Unit style`.
    pub units: Option<String>,
    /// Trailing `Total wall time:` value. Its presence marks a log that ran
    /// to completion; an interrupted run never prints it.
    pub total_wall_time: Option<String>,
    pub minimization: Option<MinimizationStats>,
    pub time_table: TimeTable,
}

impl ParsedRun {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether the log reached its normal end-of-run footer.
    pub fn is_complete(&self) -> bool {
        self.total_wall_time.is_some()
    }

    /// Physical-quantity unit names for the reported unit system, when the
    /// log named one the registry knows.
    pub fn unit_names(&self) -> Option<&'static phf::Map<&'static str, &'static str>> {
        self.units
            .as_deref()
            .and_then(crate::core::tables::unit_names)
    }
}

fn first_token_is_numeric(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|token| token.parse::<f64>().is_ok())
}

fn parse_floats(line: &str) -> Vec<f64> {
    line.split_whitespace()
        .filter_map(|token| token.parse().ok())
        .collect()
}

/// Parses a console log. Never fails: an empty or truncated log simply
/// yields an empty [`ParsedRun`], which the classifier treats as an
/// incomplete run.
pub fn parse_log(text: &str) -> ParsedRun {
    let mut run = ParsedRun::default();
    let mut header: Option<Vec<String>> = None;

    let mut lines = text.lines();
    while let Some(raw) = lines.next() {
        let line = raw.trim();

        if let Some(active) = &header {
            if first_token_is_numeric(line) {
                let row = parse_floats(line);
                if row.len() == active.len() {
                    let active = active.clone();
                    run.time_table.push_row(&active, &row);
                }
                continue;
            }
            header = None;
        }

        if line.starts_with("ERROR") {
            run.errors.push(line.to_string());
        } else if line.starts_with("WARNING") {
            run.warnings.push(line.to_string());
        } else if let Some(rest) = line.strip_prefix("Performance:") {
            for figure in rest.split(',') {
                let mut parts = figure.split_whitespace();
                if let (Some(value), Some(unit)) = (parts.next(), parts.next())
                    && let Ok(value) = value.parse()
                {
                    run.performance.insert(unit.to_string(), value);
                }
            }
        } else if line.starts_with("Unit style") {
            run.units = line
                .rsplit_once(':')
                .map(|(_, units)| units.trim().to_string())
                .filter(|units| !units.is_empty());
        } else if let Some(rest) = line.strip_prefix("Total wall time:") {
            run.total_wall_time = Some(rest.trim().to_string());
        } else if line == "Minimization stats:" {
            parse_minimization_stats(&mut lines, &mut run);
        } else if line.starts_with("Step ") || line == "Step" {
            let columns: Vec<String> = line.split_whitespace().map(String::from).collect();
            header = Some(columns);
        }
    }

    run
}

/// Consumes the minimization-stats block. The energies live on the line
/// after the `Energy initial, next-to-last, final =` label; the relative
/// change uses the next-to-last energy, matching the engine's own report.
/// A malformed block leaves `minimization` unset rather than failing the
/// whole log.
fn parse_minimization_stats<'a>(
    lines: &mut impl Iterator<Item = &'a str>,
    run: &mut ParsedRun,
) {
    let mut stop_criterion = None;
    let mut energies = None;
    let mut force_two_norms = None;
    let mut iterations = None;
    let mut force_evaluations = None;

    while let Some(raw) = lines.next() {
        let line = raw.trim();
        if line.is_empty() {
            break;
        }
        if let Some(rest) = line.strip_prefix("Stopping criterion") {
            stop_criterion = rest.rsplit_once('=').map(|(_, c)| c.trim().to_string()).or_else(
                || Some(rest.trim_start_matches(['=', ' ']).trim().to_string()),
            );
        } else if line.starts_with("Energy initial, next-to-last, final") {
            // values are on the following line
            if let Some(values) = lines.next() {
                let parsed = parse_floats(values);
                if parsed.len() == 3 {
                    energies = Some((parsed[0], parsed[1], parsed[2]));
                }
            }
        } else if line.starts_with("Force two-norm initial, final") {
            let values = parse_floats(line.split('=').nth(1).unwrap_or(""));
            if values.len() == 2 {
                force_two_norms = Some((values[0], values[1]));
            }
        } else if line.starts_with("Iterations, force evaluations") {
            let counts: Vec<u64> = line
                .split('=')
                .nth(1)
                .unwrap_or("")
                .split_whitespace()
                .filter_map(|token| token.parse().ok())
                .collect();
            iterations = counts.first().copied();
            force_evaluations = counts.get(1).copied();
            break;
        }
    }

    if let (Some(stop_criterion), Some((initial, next_to_last, r#final))) =
        (stop_criterion, energies)
    {
        let energy_relative_change = if r#final != 0.0 {
            (next_to_last - r#final) / r#final
        } else {
            f64::NAN
        };
        run.minimization = Some(MinimizationStats {
            stop_criterion,
            energy_initial: initial,
            energy_next_to_last: next_to_last,
            energy_final: r#final,
            energy_relative_change,
            force_two_norm_initial: force_two_norms.map(|(initial, _)| initial),
            force_two_norm_final: force_two_norms.map(|(_, r#final)| r#final),
            iterations,
            force_evaluations,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMIZE_LOG: &str = "\
LAMMPS (2 Aug 2023)
Unit style    : metal
Setting up cg style minimization ...
Per MPI rank memory allocation (min/avg/max) = 4.405 | 4.405 | 4.405 Mbytes
   Step          Temp          E_pair         E_mol          TotEng         Press
         0   0             -8.7953247      0             -8.7953247      1431.2
        25   0             -8.7985427      0             -8.7985427     -0.25864
Loop time of 0.00319 on 1 procs for 25 steps with 2 atoms

Minimization stats:
  Stopping criterion = energy tolerance
  Energy initial, next-to-last, final =
     -8.79532470951     -8.79854266002     -8.79854266011
  Force two-norm initial, final = 1.4302 4.2703e-06
  Iterations, force evaluations = 25 46

Performance: 5.436 ns/day, 4.415 hours/ns
Total wall time: 0:00:01
";

    #[test]
    fn captures_the_thermo_table_under_the_step_header() {
        let run = parse_log(MINIMIZE_LOG);
        assert_eq!(run.time_table.rows(), 2);
        assert_eq!(run.time_table.column("Step"), Some(&[0.0, 25.0][..]));
        let press = run.time_table.column("Press").unwrap();
        assert!((press[0] - 1431.2).abs() < 1e-9);
        // the Loop/Performance footer did not leak into the table
        assert!(run.time_table.column("Loop").is_none());
    }

    #[test]
    fn extracts_the_global_markers() {
        let run = parse_log(MINIMIZE_LOG);
        assert_eq!(run.units.as_deref(), Some("metal"));
        assert_eq!(run.unit_names().unwrap()["energy"], "eV");
        assert_eq!(run.total_wall_time.as_deref(), Some("0:00:01"));
        assert!(run.is_complete());
        assert_eq!(run.performance["ns/day"], 5.436);
        assert_eq!(run.performance["hours/ns"], 4.415);
        assert!(run.errors.is_empty());
    }

    #[test]
    fn minimization_stats_use_the_next_to_last_energy() {
        let run = parse_log(MINIMIZE_LOG);
        let stats = run.minimization.unwrap();
        assert_eq!(stats.stop_criterion, "energy tolerance");
        assert_eq!(stats.iterations, Some(25));
        assert_eq!(stats.force_evaluations, Some(46));
        assert_eq!(stats.force_two_norm_initial, Some(1.4302));
        assert_eq!(stats.force_two_norm_final, Some(4.2703e-06));
        let expected =
            (-8.79854266002f64 - -8.79854266011) / -8.79854266011;
        assert!((stats.energy_relative_change - expected).abs() < 1e-18);
    }

    #[test]
    fn an_error_anywhere_marks_the_run_failed_even_with_a_clean_table() {
        let text = format!("ERROR: bad input (src/input.cpp)\n{MINIMIZE_LOG}");
        let run = parse_log(&text);
        assert!(run.has_errors());
        assert_eq!(run.errors, vec!["ERROR: bad input (src/input.cpp)"]);
        // the table after the error is still captured
        assert_eq!(run.time_table.rows(), 2);
    }

    #[test]
    fn warnings_are_collected_separately() {
        let run = parse_log("WARNING: Proc sub-domain size < neighbor skin\n");
        assert!(!run.has_errors());
        assert_eq!(run.warnings.len(), 1);
    }

    #[test]
    fn truncated_log_yields_an_incomplete_run() {
        let truncated: String = MINIMIZE_LOG
            .lines()
            .take(7)
            .map(|line| format!("{line}\n"))
            .collect();
        let run = parse_log(&truncated);
        assert!(!run.is_complete());
        assert_eq!(run.time_table.rows(), 2);
        assert!(run.minimization.is_none());
    }

    #[test]
    fn columns_from_successive_tables_are_unioned_with_nan_padding() {
        let text = "\
Step Temp
0 300.0
Step PotEng
10 -8.5
";
        let run = parse_log(text);
        assert_eq!(run.time_table.rows(), 2);
        let temp = run.time_table.column("Temp").unwrap();
        assert_eq!(temp[0], 300.0);
        assert!(temp[1].is_nan());
        let poteng = run.time_table.column("PotEng").unwrap();
        assert!(poteng[0].is_nan());
        assert_eq!(poteng[1], -8.5);
        assert_eq!(run.time_table.column("Step"), Some(&[0.0, 10.0][..]));
    }
}
