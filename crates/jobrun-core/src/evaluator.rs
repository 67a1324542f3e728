//! Evaluation metrics used to rank trained models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Metric supported by the remote service for scoring models.
///
/// - Regression: `auto` (deviance), deviance, mse, rmse, mae, rmsle, r2
/// - Binary classification: `auto` (logloss), logloss, lift_top_group, auc,
///   misclassification
/// - Multinomial classification: `auto` (logloss), logloss,
///   misclassification, mean_per_class_error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluator {
    #[default]
    Auto,
    Mse,
    Rmse,
    Mae,
    Rmsle,
    Auc,
    Logloss,
    Deviance,
    R2,
    LiftTopGroup,
    Misclassification,
    MeanPerClassError,
}

impl Evaluator {
    /// Wire name of the metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Mse => "mse",
            Self::Rmse => "rmse",
            Self::Mae => "mae",
            Self::Rmsle => "rmsle",
            Self::Auc => "auc",
            Self::Logloss => "logloss",
            Self::Deviance => "deviance",
            Self::R2 => "r2",
            Self::LiftTopGroup => "lift_top_group",
            Self::Misclassification => "misclassification",
            Self::MeanPerClassError => "mean_per_class_error",
        }
    }

    /// Returns true if a lower score is better.
    pub fn is_minimized(&self) -> bool {
        matches!(
            self,
            Self::Mse
                | Self::Mae
                | Self::MeanPerClassError
                | Self::Deviance
                | Self::Logloss
                | Self::Rmse
                | Self::Rmsle
                | Self::Misclassification
        )
    }

    /// Resolve `Auto` against the experiment's model type.
    ///
    /// Regression resolves to deviance and classification to logloss. Concrete
    /// evaluators, and `Auto` with an unknown model type, are returned as is.
    pub fn resolve(self, model_type: Option<&str>) -> Evaluator {
        match (self, model_type) {
            (Self::Auto, Some(kind)) if kind.eq_ignore_ascii_case("regression") => Self::Deviance,
            (Self::Auto, Some(kind))
                if kind.eq_ignore_ascii_case("classification")
                    || kind.eq_ignore_ascii_case("binomial")
                    || kind.eq_ignore_ascii_case("multinomial") =>
            {
                Self::Logloss
            }
            (other, _) => other,
        }
    }
}

/// Returns true if a lower value of the named metric is better.
///
/// Unknown metric names are treated as maximized.
pub fn is_minimized_metric(metric: &str) -> bool {
    metric
        .parse::<Evaluator>()
        .map(|e| e.is_minimized())
        .unwrap_or(false)
}

impl fmt::Display for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Evaluator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let evaluator = match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Self::Auto,
            "mse" => Self::Mse,
            "rmse" => Self::Rmse,
            "mae" => Self::Mae,
            "rmsle" => Self::Rmsle,
            "auc" => Self::Auc,
            "logloss" => Self::Logloss,
            "deviance" => Self::Deviance,
            "r2" => Self::R2,
            "lift_top_group" => Self::LiftTopGroup,
            "misclassification" => Self::Misclassification,
            "mean_per_class_error" => Self::MeanPerClassError,
            _ => return Err(CoreError::UnknownEvaluator(s.to_string())),
        };
        Ok(evaluator)
    }
}
