use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Toolkit command unavailable: {tool} ({reason})")]
    ToolUnavailable { tool: String, reason: String },

    #[error("Failed to process {}: {reason}", path.display())]
    ItemProcessing { path: PathBuf, reason: String },

    #[error("Geometry init failed for {}: {reason}", path.display())]
    RetryableInit { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn item(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ItemProcessing {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Fatal errors abort the whole run; the rest are absorbed per item.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::ToolUnavailable { .. } | Self::Io { .. } => true,
            Self::ItemProcessing { .. } | Self::RetryableInit { .. } => false,
        }
    }

    /// Process exit status for an error that ended the run
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::ToolUnavailable { .. } => 3,
            _ => 1,
        }
    }

    /// Short machine-readable code used in the run summary
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIG_ERROR",
            Self::ToolUnavailable { .. } => "TOOL_UNAVAILABLE",
            Self::ItemProcessing { .. } => "ITEM_FAILED",
            Self::RetryableInit { .. } => "INIT_RETRYABLE",
            Self::Io { .. } => "IO_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(PipelineError::Configuration("x".into()).is_fatal());
        assert!(PipelineError::ToolUnavailable {
            tool: "marcical".into(),
            reason: "not found".into()
        }
        .is_fatal());
        assert!(!PipelineError::item("a.cub", "exit 1").is_fatal());
        assert!(!PipelineError::RetryableInit {
            path: "a.cub".into(),
            reason: "exit 1".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(PipelineError::Configuration("x".into()).exit_code(), 2);
        let unavailable = PipelineError::ToolUnavailable {
            tool: "cam2map".into(),
            reason: "not found".into(),
        };
        assert_eq!(unavailable.exit_code(), 3);
        assert_eq!(unavailable.code(), "TOOL_UNAVAILABLE");
    }

    #[test]
    fn test_item_message_names_file() {
        let err = PipelineError::item("/data/A.cub", "exit status 1");
        assert_eq!(err.to_string(), "Failed to process /data/A.cub: exit status 1");
    }
}
