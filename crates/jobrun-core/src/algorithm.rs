//! Training algorithms accepted by the remote service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Algorithm family a training request may enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "DRF")]
    Drf,
    #[serde(rename = "GLM")]
    Glm,
    #[serde(rename = "GBM")]
    Gbm,
    DeepLearning,
    StackedEnsemble,
    XGBoost,
}

impl Algorithm {
    /// Wire name of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drf => "DRF",
            Self::Glm => "GLM",
            Self::Gbm => "GBM",
            Self::DeepLearning => "DeepLearning",
            Self::StackedEnsemble => "StackedEnsemble",
            Self::XGBoost => "XGBoost",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drf" => Ok(Self::Drf),
            "glm" => Ok(Self::Glm),
            "gbm" => Ok(Self::Gbm),
            "deeplearning" | "deep_learning" => Ok(Self::DeepLearning),
            "stackedensemble" | "stacked_ensemble" => Ok(Self::StackedEnsemble),
            "xgboost" => Ok(Self::XGBoost),
            _ => Err(CoreError::UnknownAlgorithm(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("xgboost".parse::<Algorithm>().unwrap(), Algorithm::XGBoost);
        assert_eq!("GBM".parse::<Algorithm>().unwrap(), Algorithm::Gbm);
        assert!("random_forest".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_serializes_wire_name() {
        let json = serde_json::to_string(&vec![Algorithm::Drf, Algorithm::DeepLearning]).unwrap();
        assert_eq!(json, "[\"DRF\",\"DeepLearning\"]");
    }
}
