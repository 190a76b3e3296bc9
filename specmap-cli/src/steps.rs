//! Preprocessing steps given on the command line.
//!
//! Each step is a name optionally followed by `:`-separated parameters,
//! e.g. `median:5`, `sg:1:2:7`, `crop:0:10:0:5`.

use std::path::PathBuf;
use std::str::FromStr;

/// One transform applied by `specmap preprocess`.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    MinMax,
    UnitArea,
    ZScore,
    Background(PathBuf),
    Baseline { method: String, window: usize },
    Median(usize),
    MovingAverage(usize),
    Svd(usize),
    SavitzkyGolay {
        derivative: usize,
        polynomial: usize,
        window: usize,
    },
    Crop {
        x_min: f64,
        x_max: f64,
        y_min: f64,
        y_max: f64,
    },
    Undo,
}

fn param<T: FromStr>(parts: &[&str], index: usize, step: &str) -> Result<T, String> {
    let raw = parts
        .get(index)
        .ok_or_else(|| format!("step '{step}' is missing parameter {index}"))?;
    raw.parse()
        .map_err(|_| format!("step '{step}': cannot parse parameter '{raw}'"))
}

fn arity(parts: &[&str], expected: usize, step: &str) -> Result<(), String> {
    if parts.len() == expected + 1 {
        Ok(())
    } else {
        Err(format!(
            "step '{step}' takes {expected} parameter(s), got {}",
            parts.len() - 1
        ))
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let name = parts[0].trim().to_ascii_lowercase();
        let step = match name.as_str() {
            "minmax" => {
                arity(&parts, 0, s)?;
                Self::MinMax
            }
            "unit-area" => {
                arity(&parts, 0, s)?;
                Self::UnitArea
            }
            "zscore" => {
                arity(&parts, 0, s)?;
                Self::ZScore
            }
            "undo" => {
                arity(&parts, 0, s)?;
                Self::Undo
            }
            // Paths may contain ':' themselves.
            "background" => {
                let path = s
                    .split_once(':')
                    .map(|(_, path)| path)
                    .filter(|path| !path.is_empty())
                    .ok_or_else(|| format!("step '{s}' needs a spectrum file"))?;
                Self::Background(PathBuf::from(path))
            }
            "baseline" => {
                arity(&parts, 2, s)?;
                Self::Baseline {
                    method: parts[1].to_string(),
                    window: param(&parts, 2, s)?,
                }
            }
            "median" => {
                arity(&parts, 1, s)?;
                Self::Median(param(&parts, 1, s)?)
            }
            "moving-average" => {
                arity(&parts, 1, s)?;
                Self::MovingAverage(param(&parts, 1, s)?)
            }
            "svd" => {
                arity(&parts, 1, s)?;
                Self::Svd(param(&parts, 1, s)?)
            }
            "sg" => {
                arity(&parts, 3, s)?;
                Self::SavitzkyGolay {
                    derivative: param(&parts, 1, s)?,
                    polynomial: param(&parts, 2, s)?,
                    window: param(&parts, 3, s)?,
                }
            }
            "crop" => {
                arity(&parts, 4, s)?;
                Self::Crop {
                    x_min: param(&parts, 1, s)?,
                    x_max: param(&parts, 2, s)?,
                    y_min: param(&parts, 3, s)?,
                    y_max: param(&parts, 4, s)?,
                }
            }
            _ => return Err(format!("unknown step '{s}'")),
        };
        Ok(step)
    }
}
