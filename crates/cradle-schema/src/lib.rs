use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event published on the shell bus for the UI layer to display.
/// Nothing here ever escalates to a process crash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShellEvent {
    /// A single HTTP exchange inside the content server failed (file read
    /// error). The request was still answered with a 500.
    ServerError { message: String, at: DateTime<Utc> },
    /// The entry-point probe hit a genuine script error in the loaded page.
    ContentError { message: String, at: DateTime<Utc> },
}

impl ShellEvent {
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::ServerError {
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn content_error(message: impl Into<String>) -> Self {
        Self::ContentError {
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::ServerError { message, .. } | Self::ContentError { message, .. } => message,
        }
    }
}

/// One navigation-finished notification from the render host. The host's
/// stream fires for every navigation, including sub-frames; subscribers
/// filter on `is_main_frame`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NavigationEvent {
    pub is_main_frame: bool,
}

/// Result of evaluating script in the loaded page. The render host adapter
/// is responsible for mapping its engine's "symbol is not defined" failure
/// onto `NotDefined`, so callers never string-match engine error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    Value(String),
    NotDefined,
    Error(String),
}

/// What the entry-point probe found in the loaded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The page defines the entry point; it manages its own presentation.
    EntryPointFound { title: String },
    /// Plain content with no custom behavior. Not an error.
    EntryPointMissing,
    /// The entry point exists but raised a runtime error.
    ScriptError(String),
}

/// Presentation outcome handed to the window presenter once a navigation
/// completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDecision {
    pub title: String,
    pub resizable: bool,
}
