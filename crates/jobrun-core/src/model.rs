//! Best-model selection over an experiment's per-model scores.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::evaluator::is_minimized_metric;

/// The model picked as best by a metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestModel {
    pub model_id: String,
    pub metric: String,
    pub score: f64,
}

/// Why no best model could be chosen.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SelectionError {
    #[error("no models in experiment result")]
    NoModels,

    #[error("no model reports metric '{0}'")]
    MetricMissing(String),
}

/// Pick the model with the extremal value of `metric`.
///
/// `models` maps model id to either `{"cv_averages": {metric: score}, "model_id": ..}`
/// or directly to `{metric: score}`. Error-like metrics are minimized, all
/// others maximized. Candidates without a numeric score are skipped; on equal
/// scores the first candidate in mapping order wins.
pub fn select_best_model(
    models: Option<&Value>,
    metric: &str,
) -> Result<BestModel, SelectionError> {
    let candidates = models
        .and_then(Value::as_object)
        .filter(|m| !m.is_empty())
        .ok_or(SelectionError::NoModels)?;

    let minimize = is_minimized_metric(metric);
    let mut best: Option<BestModel> = None;

    for (key, entry) in candidates {
        let scores = entry.get("cv_averages").unwrap_or(entry);
        let Some(score) = scores.get(metric).and_then(Value::as_f64) else {
            continue;
        };
        if score.is_nan() {
            continue;
        }

        let better = match &best {
            None => true,
            Some(current) if minimize => score < current.score,
            Some(current) => score > current.score,
        };
        if better {
            let model_id = entry
                .get("model_id")
                .and_then(Value::as_str)
                .unwrap_or(key.as_str())
                .to_string();
            best = Some(BestModel {
                model_id,
                metric: metric.to_string(),
                score,
            });
        }
    }

    best.ok_or_else(|| SelectionError::MetricMissing(metric.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimizes_error_metrics() {
        let models = json!({"m1": {"mse": 0.5}, "m2": {"mse": 0.3}});
        let best = select_best_model(Some(&models), "mse").unwrap();
        assert_eq!(best.model_id, "m2");
        assert_eq!(best.score, 0.3);
    }

    #[test]
    fn test_maximizes_other_metrics() {
        let models = json!({
            "m1": {"cv_averages": {"auc": 0.91}, "model_id": "model-1"},
            "m2": {"cv_averages": {"auc": 0.87}, "model_id": "model-2"}
        });
        let best = select_best_model(Some(&models), "auc").unwrap();
        assert_eq!(best.model_id, "model-1");
    }

    #[test]
    fn test_unknown_metric_leaves_selection_unset() {
        let models = json!({"m1": {"mse": 0.5}, "m2": {"mse": 0.3}});
        assert_eq!(
            select_best_model(Some(&models), "unknown_metric"),
            Err(SelectionError::MetricMissing("unknown_metric".to_string()))
        );
    }

    #[test]
    fn test_candidate_without_metric_is_skipped() {
        let models = json!({"m1": {"r2": 0.9}, "m2": {"mse": 0.7}, "m3": {"mse": 0.8}});
        let best = select_best_model(Some(&models), "mse").unwrap();
        assert_eq!(best.model_id, "m2");
    }

    #[test]
    fn test_missing_or_empty_models() {
        assert_eq!(select_best_model(None, "mse"), Err(SelectionError::NoModels));
        assert_eq!(
            select_best_model(Some(&json!({})), "mse"),
            Err(SelectionError::NoModels)
        );
    }

    #[test]
    fn test_ties_keep_first_in_mapping_order() {
        let models = json!({"b": {"mae": 0.2}, "a": {"mae": 0.2}});
        let best = select_best_model(Some(&models), "mae").unwrap();
        assert_eq!(best.model_id, "b");
    }
}
