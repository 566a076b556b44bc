use serde::{Deserialize, Serialize};
use std::fmt;

/// A single argument of a LAMMPS command.
///
/// Job descriptions carry fix/compute/group arguments as heterogeneous lists
/// (keywords, counts, tolerances). Keeping them typed instead of
/// pre-concatenated strings lets generators inspect them (e.g. the `type`
/// selector validation in the structure block) before rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Arg {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Arg::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Int(value) => write!(f, "{}", value),
            Arg::Float(value) => write!(f, "{}", value),
            Arg::Text(value) => write!(f, "{}", value),
        }
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Int(value)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::Float(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_string())
    }
}

/// Renders a list of arguments as one space-separated LAMMPS token string.
pub fn join_args(args: &[Arg]) -> String {
    args.iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_args_renders_mixed_argument_lists() {
        let args = vec![Arg::from("iso"), Arg::from(0.0), Arg::from(1000.0)];
        assert_eq!(join_args(&args), "iso 0 1000");
    }

    #[test]
    fn join_args_keeps_fractional_values() {
        let args = vec![Arg::from("temp"), Arg::from(300.5)];
        assert_eq!(join_args(&args), "temp 300.5");
    }

    #[test]
    fn arg_accessors_discriminate_variants() {
        assert_eq!(Arg::from(3).as_int(), Some(3));
        assert_eq!(Arg::from(3.5).as_int(), None);
        assert_eq!(Arg::from("type").as_text(), Some("type"));
    }
}
