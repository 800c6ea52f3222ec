//! Error types for the crate

use std::time::Duration;

/// Crate result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers outside the detection core.
///
/// Detectors and resolvers never return these; they fold every external
/// failure into a negative result. This type covers configuration loading
/// and the binary's own I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}

/// Failure of a single external command invocation.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("{program} is not installed")]
    NotFound { program: String },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with status {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a probe did not yield a match.
///
/// Expected absence, not a bug: every variant is a normal outcome of probing
/// a machine that may lack the tool, the credentials, or the cluster.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotDetected {
    #[error("{0} is not installed")]
    ToolMissing(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("unparsable output: {0}")]
    Unparsable(String),

    #[error("no clusters reported")]
    Empty,

    #[error("precondition not met: {0}")]
    Precondition(String),
}

/// Outcome of one probe.
pub type ProbeOutcome<T> = std::result::Result<T, NotDetected>;

impl From<ExecError> for NotDetected {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::NotFound { program } => NotDetected::ToolMissing(program),
            ExecError::Timeout { program, .. } => NotDetected::Timeout(program),
            other => NotDetected::CommandFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for NotDetected {
    fn from(err: serde_json::Error) -> Self {
        NotDetected::Unparsable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_errors_map_to_not_detected() {
        let missing = NotDetected::from(ExecError::NotFound {
            program: "kind".into(),
        });
        assert_eq!(missing, NotDetected::ToolMissing("kind".into()));

        let slow = NotDetected::from(ExecError::Timeout {
            program: "aws".into(),
            timeout: Duration::from_secs(15),
        });
        assert_eq!(slow, NotDetected::Timeout("aws".into()));

        let failed = NotDetected::from(ExecError::Failed {
            program: "gcloud".into(),
            code: Some(1),
            stdout: String::new(),
            stderr: "not logged in".into(),
        });
        assert!(matches!(failed, NotDetected::CommandFailed(msg) if msg.contains("not logged in")));
    }

    #[test]
    fn config_error_message() {
        let err = Error::config("timeouts must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration: timeouts must be positive"
        );
    }
}
