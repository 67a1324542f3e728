//! Status shared by remote tasks and jobs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Status of a remote task or of the job wrapping it.
///
/// The remote service reports these as lowercase strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created but not yet submitted (or waiting on prerequisites).
    #[default]
    Pending,
    /// Submitted and executing remotely.
    Running,
    /// Finished. Only a success if a result payload came with it.
    Done,
    /// Failed, stopped, or blocked by a failed prerequisite.
    Fail,
    /// Rejected by the remote service as invalid.
    Invalid,
}

impl Status {
    /// Every status, in the order the remote service documents them.
    pub const ALL: [Status; 5] = [
        Status::Pending,
        Status::Running,
        Status::Done,
        Status::Invalid,
        Status::Fail,
    ];

    /// Returns true for `Done`, `Fail` and `Invalid`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Fail | Self::Invalid)
    }

    /// Returns true for `Fail` and `Invalid`.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Fail | Self::Invalid)
    }

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Fail => "fail",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            "fail" | "failed" => Ok(Self::Fail),
            "invalid" => Ok(Self::Invalid),
            _ => Err(CoreError::UnknownStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_and_failed_sets() {
        let terminal: Vec<_> = Status::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal.len(), 3);
        assert!(!Status::Pending.is_terminal());
        assert!(!Status::Running.is_terminal());

        assert!(Status::Fail.is_failed());
        assert!(Status::Invalid.is_failed());
        assert!(!Status::Done.is_failed());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!("done".parse::<Status>().unwrap(), Status::Done);
        assert_eq!("RUNNING".parse::<Status>().unwrap(), Status::Running);
        assert!(matches!(
            "exploded".parse::<Status>(),
            Err(CoreError::UnknownStatus(_))
        ));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Status::Invalid).unwrap();
        assert_eq!(json, "\"invalid\"");
        let status: Status = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, Status::Pending);
    }
}
