//! Error types for sciplan
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - A split between programmer errors, bad configuration and transient faults
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for sciplan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Transport errors (3xx)
    ConnectionFailed = 300,
    HttpStatus = 301,

    // Protocol errors (4xx)
    ProtocolMalformed = 400,
    JsonError = 401,

    // Execution errors (5xx)
    SubmissionFailed = 500,
    RemoteExecution = 501,
    AgentUnavailable = 502,
    AgentTimeout = 503,

    // Workflow errors (6xx)
    Precondition = 600,
    Aborted = 601,
    PlanNotFound = 602,

    // Internal errors (9xx)
    InternalError = 900,
    NotSupported = 902,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            500..=599 => 50,
            600..=699 => 60,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────

    /// Request could not be delivered
    #[error("Request to {url} failed: {message}")]
    ConnectionFailed { url: String, message: String },

    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}: {body}")]
    Http { status: u16, url: String, body: String },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Response could not be interpreted
    #[error("Malformed response: {message}")]
    ProtocolMalformed { message: String },

    // ─────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────

    /// Backend rejected or could not build the submission
    #[error("Submission of task '{task}' failed: {message}")]
    Submission { task: String, message: String },

    /// The agent reported an error for a request
    #[error("Remote execution failed: {message}")]
    RemoteExecution { message: String },

    /// Operation needs a live agent and none is reachable
    #[error("Agent {agent_ref} is not reachable for {operation}")]
    AgentUnavailable { agent_ref: String, operation: String },

    /// Agent result did not become available in time
    #[error("Execution {execution_id} produced no result after {timeout_secs}s")]
    AgentTimeout { execution_id: String, timeout_secs: u64 },

    // ─────────────────────────────────────────────────────────────
    // Workflow Errors
    // ─────────────────────────────────────────────────────────────

    /// Operation invoked in a state that does not allow it
    #[error("Task '{task}' cannot {operation}: {reason}")]
    Precondition {
        task: String,
        operation: &'static str,
        reason: &'static str,
    },

    /// User declined an interactive confirmation
    #[error("Aborted: {0}")]
    Aborted(String),

    /// Plan id unknown to the store
    #[error("Plan not found: {id}")]
    PlanNotFound { id: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Feature not supported
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let url = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        if e.is_decode() {
            Error::ProtocolMalformed {
                message: format!("{}: {}", url, e),
            }
        } else {
            Error::ConnectionFailed {
                url,
                message: e.to_string(),
            }
        }
    }
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::Json(_) => ErrorCode::JsonError,

            Error::ConnectionFailed { .. } => ErrorCode::ConnectionFailed,
            Error::Http { .. } => ErrorCode::HttpStatus,

            Error::ProtocolMalformed { .. } => ErrorCode::ProtocolMalformed,

            Error::Submission { .. } => ErrorCode::SubmissionFailed,
            Error::RemoteExecution { .. } => ErrorCode::RemoteExecution,
            Error::AgentUnavailable { .. } => ErrorCode::AgentUnavailable,
            Error::AgentTimeout { .. } => ErrorCode::AgentTimeout,

            Error::Precondition { .. } => ErrorCode::Precondition,
            Error::Aborted(_) => ErrorCode::Aborted,
            Error::PlanNotFound { .. } => ErrorCode::PlanNotFound,

            Error::NotSupported(_) => ErrorCode::NotSupported,
            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ConnectionFailed { .. }
            | Error::AgentUnavailable { .. }
            | Error::AgentTimeout { .. }
            | Error::Io(_)
            | Error::IoRead { .. }
            | Error::IoWrite { .. } => true,
            Error::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if the error is fatal (retrying cannot help)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::Config(_)
                | Error::Submission { .. }
                | Error::RemoteExecution { .. }
                | Error::Precondition { .. }
                | Error::Internal(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'sciplan config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'sciplan config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values."
            ),
            Error::ConnectionFailed { .. } => Some(
                "Check your network connection and verify the gateway and agent URLs."
            ),
            Error::Http { status: 401, .. } | Error::Http { status: 403, .. } => Some(
                "The access token was rejected. Set SCIPLAN_ACCESS_TOKEN to a fresh token."
            ),
            Error::Submission { .. } => Some(
                "Verify the project, application, cluster and storage names in the plan and config."
            ),
            Error::AgentUnavailable { .. } => Some(
                "The task's agent is not running yet. Wait until the task is EXECUTING and retry."
            ),
            Error::AgentTimeout { .. } => Some(
                "Increase 'agent.poll_timeout_secs' or set it to 0 to wait indefinitely."
            ),
            Error::Precondition { .. } => Some(
                "Launch the task first with 'sciplan launch'."
            ),
            Error::PlanNotFound { .. } => Some(
                "Run 'sciplan plans' to list stored plan ids."
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            code.as_str(),
            self
        );

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    /// Create a config parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a submission error
    pub fn submission(task: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Submission {
            task: task.into(),
            message: message.into(),
        }
    }

    /// Create a remote execution error
    pub fn remote_execution(message: impl Into<String>) -> Self {
        Error::RemoteExecution {
            message: message.into(),
        }
    }

    /// Task has not been launched yet
    pub fn not_launched(task: impl Into<String>, operation: &'static str) -> Self {
        Error::Precondition {
            task: task.into(),
            operation,
            reason: "task has not been launched",
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
