//! Error reporting at the command boundary
//!
//! Library code returns [`AppError`](crate::AppError). Whatever reaches the
//! binary is handed to [`handle_error`] with its category, and the category
//! decides how it is shown and whether the program keeps going:
//! - Recoverable: the request was rejected; the user can fix it and run again
//! - Fatal: the environment needs attention (missing tool, failed download)
//! - Optional: a side step failed (e.g. removing a downloaded archive)
//!
//! stderr gets the human-readable report. The tracing record stays at `info`
//! so it lands in the log file without repeating itself on the console.

use std::error::Error;
use std::fmt;
use std::panic;

/// Exit code for a command that ended with a reported error.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Recoverable,
    Fatal,
    Optional,
}

impl ErrorCategory {
    fn marker(self) -> &'static str {
        match self {
            ErrorCategory::Recoverable => "⚠️",
            ErrorCategory::Fatal => "❌",
            ErrorCategory::Optional => "ℹ️",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Recoverable => write!(f, "recoverable"),
            ErrorCategory::Fatal => write!(f, "fatal"),
            ErrorCategory::Optional => write!(f, "optional"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    Continue,
    /// Stop with this process exit code.
    Exit(i32),
}

/// Print `error` for the user and decide what happens next.
///
/// Fatal errors also list their source chain.
pub fn handle_error<E: Error + ?Sized>(
    category: ErrorCategory,
    context: &str,
    error: &E,
    suggestion: Option<&str>,
) -> ErrorAction {
    tracing::info!(category = %category, context, error = %error, "Error reported");

    eprintln!("{} {}: {}", category.marker(), context, error);
    if category == ErrorCategory::Fatal {
        print_sources(error);
    }
    if let Some(hint) = suggestion {
        eprintln!("   💡 {}", hint);
    }

    match category {
        ErrorCategory::Optional => ErrorAction::Continue,
        ErrorCategory::Recoverable | ErrorCategory::Fatal => ErrorAction::Exit(EXIT_FAILURE),
    }
}

/// Print an uncategorized error and its source chain.
pub fn report_error<E: Error + ?Sized>(error: &E) {
    tracing::info!(error = %error, "Unexpected error reported");
    eprintln!("🔥 ERROR: {}", error);
    print_sources(error);
}

fn print_sources<E: Error + ?Sized>(error: &E) {
    let mut source = error.source();
    let mut depth = 1;
    while let Some(err) = source {
        eprintln!("   {}. Caused by: {}", depth, err);
        tracing::info!(depth, cause = %err, "Error source");
        source = err.source();
        depth += 1;
    }
}

pub fn install_panic_handler() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic payload".to_string()
        };

        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "Unknown location".to_string());

        eprintln!("💥 PANIC occurred!");
        eprintln!("   Message: {}", message);
        eprintln!("   Location: {}", location);

        tracing::error!("PANIC: {} at {}", message, location);

        default_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture::capture_logs;
    use std::io;
    use tracing::Level;

    #[test]
    fn test_category_decides_action() {
        let error = io::Error::other("test error");
        assert_eq!(
            handle_error(ErrorCategory::Recoverable, "run", &error, None),
            ErrorAction::Exit(EXIT_FAILURE)
        );
        assert_eq!(
            handle_error(ErrorCategory::Fatal, "run", &error, Some("install ffmpeg")),
            ErrorAction::Exit(EXIT_FAILURE)
        );
        assert_eq!(
            handle_error(ErrorCategory::Optional, "cleanup", &error, None),
            ErrorAction::Continue
        );
    }

    #[test]
    fn test_handled_error_stays_off_console_log() {
        let error = io::Error::other("ffprobe exploded");
        let console = capture_logs(Level::WARN, || {
            handle_error(ErrorCategory::Fatal, "run", &error, None);
            report_error(&error);
        });
        assert!(console.is_empty(), "{}", console);

        let file = capture_logs(Level::INFO, || {
            handle_error(ErrorCategory::Fatal, "run", &error, None);
        });
        assert!(file.contains("ffprobe exploded"));
        assert!(file.contains("category=fatal"));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Recoverable.to_string(), "recoverable");
        assert_eq!(ErrorCategory::Fatal.to_string(), "fatal");
        assert_eq!(ErrorCategory::Optional.to_string(), "optional");
    }
}
