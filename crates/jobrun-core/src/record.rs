//! Typed schema for the attributes a job copies out of its task result.

use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::{CoreError, RemoteId};

/// Attributes populated from a task's result payload.
///
/// Every field is optional: keys absent from the payload leave the field
/// untouched, and keys that are present but of the wrong shape are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobRecord {
    /// Identifier of the produced object (`_id`).
    pub id: Option<RemoteId>,
    /// Accessor for the stored files.
    pub accessor: Option<Value>,
    /// Data schema after setup.
    pub schema: Option<Value>,
    /// Data schema as uploaded (`originSchema`).
    pub origin_schema: Option<Value>,
    /// Extra column information (`annotationsMeta`).
    pub annotations_meta: Option<Value>,
    /// Extra information for data or experiment.
    pub options: Option<Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub completed_at: Option<String>,

    // Experiment results
    pub features: Option<Value>,
    pub train_data_id: Option<String>,
    pub target: Option<String>,
    pub test_base_id: Option<String>,
    pub models: Option<Value>,
    pub hyperparameters: Option<Value>,
    /// Per-model scores, keyed by model id.
    pub attributes: Option<Value>,
    /// Recommended model per evaluator.
    pub recommendations: Option<Value>,
}

impl JobRecord {
    /// Copy every recognised key out of `result`.
    ///
    /// Returns false (and changes nothing) if `result` is not a JSON object.
    pub fn absorb(&mut self, result: &Value) -> bool {
        let Some(map) = result.as_object() else {
            return false;
        };

        let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
        let value = |key: &str| map.get(key).filter(|v| !v.is_null()).cloned();

        if let Some(id) = text("_id") {
            self.id = Some(RemoteId::new(id));
        }
        replace(&mut self.accessor, value("accessor"));
        replace(&mut self.schema, value("schema"));
        replace(&mut self.origin_schema, value("originSchema"));
        replace(&mut self.annotations_meta, value("annotationsMeta"));
        replace(&mut self.options, value("options"));
        replace(&mut self.created_at, text("created_at"));
        replace(&mut self.updated_at, text("updated_at"));
        replace(&mut self.completed_at, text("completed_at"));
        replace(&mut self.features, value("features"));
        replace(&mut self.train_data_id, text("train_data_id"));
        replace(&mut self.target, text("target"));
        replace(&mut self.test_base_id, text("test_base_id"));
        replace(&mut self.models, value("models"));
        replace(&mut self.hyperparameters, value("hyperparameters"));
        replace(&mut self.attributes, value("attributes"));
        replace(&mut self.recommendations, value("recommendations"));
        true
    }

    /// Current value of a record attribute, if known.
    pub fn get(&self, attr: JobAttr) -> Option<Value> {
        let text = |v: &Option<String>| v.as_ref().map(|s| Value::String(s.clone()));
        match attr {
            JobAttr::Id => self.id.as_ref().map(|id| Value::String(id.to_string())),
            JobAttr::Accessor => self.accessor.clone(),
            JobAttr::Schema => self.schema.clone(),
            JobAttr::OriginSchema => self.origin_schema.clone(),
            JobAttr::AnnotationsMeta => self.annotations_meta.clone(),
            JobAttr::Options => self.options.clone(),
            JobAttr::CreatedAt => text(&self.created_at),
            JobAttr::UpdatedAt => text(&self.updated_at),
            JobAttr::CompletedAt => text(&self.completed_at),
            JobAttr::Features => self.features.clone(),
            JobAttr::TrainDataId => text(&self.train_data_id),
            JobAttr::Target => text(&self.target),
            JobAttr::TestBaseId => text(&self.test_base_id),
            JobAttr::Models => self.models.clone(),
            JobAttr::Hyperparameters => self.hyperparameters.clone(),
            JobAttr::Attributes => self.attributes.clone(),
            JobAttr::Recommendations => self.recommendations.clone(),
        }
    }

    /// `hyperparameters.model_type`, used to resolve the `auto` evaluator.
    pub fn model_type(&self) -> Option<&str> {
        self.hyperparameters
            .as_ref()
            .and_then(|h| h.get("model_type"))
            .and_then(Value::as_str)
    }
}

fn replace<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Returns true if a result payload carries anything.
///
/// `null`, empty objects, empty arrays and empty strings count as absent.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Named attribute of a [`JobRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobAttr {
    Id,
    Accessor,
    Schema,
    OriginSchema,
    AnnotationsMeta,
    Options,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
    Features,
    TrainDataId,
    Target,
    TestBaseId,
    Models,
    Hyperparameters,
    Attributes,
    Recommendations,
}

impl FromStr for JobAttr {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let attr = match s {
            "id" | "_id" => Self::Id,
            "accessor" => Self::Accessor,
            "schema" => Self::Schema,
            "origin_schema" | "originSchema" => Self::OriginSchema,
            "annotations_meta" | "annotationsMeta" => Self::AnnotationsMeta,
            "options" => Self::Options,
            "created_at" => Self::CreatedAt,
            "updated_at" => Self::UpdatedAt,
            "completed_at" => Self::CompletedAt,
            "features" => Self::Features,
            "train_data_id" => Self::TrainDataId,
            "target" => Self::Target,
            "test_base_id" => Self::TestBaseId,
            "models" => Self::Models,
            "hyperparameters" => Self::Hyperparameters,
            "attributes" => Self::Attributes,
            "recommendations" => Self::Recommendations,
            _ => return Err(CoreError::UnknownAttribute(s.to_string())),
        };
        Ok(attr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absorb_copies_known_keys() {
        let mut record = JobRecord::default();
        let absorbed = record.absorb(&json!({
            "_id": "d1",
            "originSchema": {"a": "numerical"},
            "created_at": "2020-01-01",
            "target": "price",
            "unrelated": 42
        }));

        assert!(absorbed);
        assert_eq!(record.id, Some(RemoteId::new("d1")));
        assert_eq!(record.origin_schema, Some(json!({"a": "numerical"})));
        assert_eq!(record.target.as_deref(), Some("price"));
        assert!(record.schema.is_none());
    }

    #[test]
    fn test_absent_keys_leave_previous_values() {
        let mut record = JobRecord::default();
        record.absorb(&json!({"_id": "e1", "target": "y"}));
        record.absorb(&json!({"updated_at": "later"}));

        assert_eq!(record.id, Some(RemoteId::new("e1")));
        assert_eq!(record.target.as_deref(), Some("y"));
        assert_eq!(record.updated_at.as_deref(), Some("later"));
    }

    #[test]
    fn test_non_object_result_is_rejected() {
        let mut record = JobRecord::default();
        assert!(!record.absorb(&json!(["not", "a", "map"])));
        assert_eq!(record, JobRecord::default());
    }

    #[test]
    fn test_get_by_attribute_name() {
        let mut record = JobRecord::default();
        record.absorb(&json!({"_id": "d1", "hyperparameters": {"model_type": "regression"}}));

        let id: JobAttr = "_id".parse().unwrap();
        assert_eq!(record.get(id), Some(json!("d1")));
        assert_eq!(record.get(JobAttr::Schema), None);
        assert_eq!(record.model_type(), Some("regression"));
        assert!("colour".parse::<JobAttr>().is_err());
    }

    #[test]
    fn test_is_present() {
        assert!(!is_present(&Value::Null));
        assert!(!is_present(&json!({})));
        assert!(!is_present(&json!("")));
        assert!(is_present(&json!({"_id": "x"})));
        assert!(is_present(&json!(0)));
    }
}
