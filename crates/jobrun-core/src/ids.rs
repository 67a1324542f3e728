//! Identifier newtype and display-name generation.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier assigned by the remote service (task, data, experiment, model).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteId(String);

impl RemoteId {
    /// Create a new RemoteId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RemoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Display name for a job or task.
///
/// Returns `name` when given, otherwise `<prefix>_<8 random hex digits>`.
pub fn generate_name(prefix: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => name.to_string(),
        None => {
            let id = Uuid::new_v4().simple().to_string();
            format!("{}_{}", prefix, &id[..8])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_name() {
        assert_eq!(generate_name("DataUpload", Some("train")), "train");

        let generated = generate_name("DataUpload", None);
        assert!(generated.starts_with("DataUpload_"));
        assert_eq!(generated.len(), "DataUpload_".len() + 8);
        assert_ne!(generated, generate_name("DataUpload", None));
    }

    #[test]
    fn test_id_display() {
        let id = RemoteId::new("5e1f00aa");
        assert_eq!(format!("{}", id), "5e1f00aa");
        assert_eq!(RemoteId::from("5e1f00aa"), id);
    }
}
