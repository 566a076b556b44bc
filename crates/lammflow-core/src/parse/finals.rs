//! Parser for the final-variables side file.
//!
//! One `key: value` line per declared thermo column, written by the
//! final-variables script block. Reading final scalars from this file
//! instead of the last thermo row keeps them immune to table truncation.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FinalsError {
    #[error("line {line} has no 'key: value' separator: {text}")]
    MissingSeparator { line: usize, text: String },
    #[error("line {line}: value of '{key}' is not a number: {text}")]
    InvalidValue {
        line: usize,
        key: String,
        text: String,
    },
}

/// Parses the side file into a name → value map. Comment lines (`#`) and
/// blank lines are skipped; ordering carries no meaning.
pub fn parse_final_variables(text: &str) -> Result<BTreeMap<String, f64>, FinalsError> {
    let mut variables = BTreeMap::new();
    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once(':').ok_or_else(|| FinalsError::MissingSeparator {
            line: number + 1,
            text: line.to_string(),
        })?;
        let key = key.trim().to_string();
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| FinalsError::InvalidValue {
                line: number + 1,
                key: key.clone(),
                text: value.trim().to_string(),
            })?;
        variables.insert(key, value);
    }
    Ok(variables)
}
