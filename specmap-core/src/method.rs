//! Method selectors for peak quantification and baseline estimation.

use crate::Error;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a scalar is derived from a spectral region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValueMethod {
    /// Maximum value in the region.
    Intensity,
    /// Baseline-corrected integral of the region.
    Area,
    /// Full width at half maximum of the region's peak.
    Bandwidth,
    /// Second-derivative edge finding. Declared only; has no implementation.
    Derivative,
}

impl ValueMethod {
    /// Label used in map type strings and logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Intensity => "Intensity",
            Self::Area => "Area",
            Self::Bandwidth => "Bandwidth",
            Self::Derivative => "Derivative",
        }
    }
}

impl fmt::Display for ValueMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ValueMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intensity" => Ok(Self::Intensity),
            "area" => Ok(Self::Area),
            "bandwidth" | "fwhm" => Ok(Self::Bandwidth),
            "derivative" => Ok(Self::Derivative),
            _ => Err(Error::UnknownMethod(s.to_string())),
        }
    }
}

/// Numerical integration rule for [`ValueMethod::Area`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IntegrationMethod {
    /// Sum of baseline-corrected channel values.
    #[default]
    RiemannSum,
}

impl IntegrationMethod {
    /// Label used in map type strings and logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::RiemannSum => "Riemann Sum",
        }
    }
}

impl fmt::Display for IntegrationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IntegrationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "riemann sum" | "riemann" => Ok(Self::RiemannSum),
            _ => Err(Error::UnknownMethod(s.to_string())),
        }
    }
}

/// Baseline estimator for the baseline-correction transform.
///
/// Parsing never fails: names without an estimator map to
/// [`BaselineMethod::Unknown`], which the transform treats as a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BaselineMethod {
    /// Windowed median of the spectrum.
    MedianFilter,
    /// Any other name.
    Unknown(String),
}

impl BaselineMethod {
    /// Label used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::MedianFilter => "Median Filter",
            Self::Unknown(name) => name,
        }
    }
}

impl fmt::Display for BaselineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<&str> for BaselineMethod {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "median filter" | "median" => Self::MedianFilter,
            _ => Self::Unknown(s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_method_parsing() {
        assert_eq!("Intensity".parse::<ValueMethod>(), Ok(ValueMethod::Intensity));
        assert_eq!("area".parse::<ValueMethod>(), Ok(ValueMethod::Area));
        assert_eq!("FWHM".parse::<ValueMethod>(), Ok(ValueMethod::Bandwidth));
        assert!("height".parse::<ValueMethod>().is_err());
    }

    #[test]
    fn test_integration_method_parsing() {
        assert_eq!(
            "Riemann Sum".parse::<IntegrationMethod>(),
            Ok(IntegrationMethod::RiemannSum)
        );
        assert_eq!(
            "riemann_sum".parse::<IntegrationMethod>(),
            Ok(IntegrationMethod::RiemannSum)
        );
    }

    #[test]
    fn test_unknown_baseline_is_preserved() {
        assert_eq!(BaselineMethod::from("Median Filter"), BaselineMethod::MedianFilter);
        let other = BaselineMethod::from("Rolling Ball");
        assert_eq!(other.label(), "Rolling Ball");
    }
}
