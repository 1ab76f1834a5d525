//! Progress display
//!
//! One look for every progress indicator in the tool: braille spinner,
//! `█▓░` bar, cyan prefix. Transcoding has no measurable completion ratio, so
//! it gets a spinner whose message is the latest log line. Downloads get a
//! byte bar when the server sends a length, a spinner otherwise.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

pub mod progress_style {
    /// Filled, current, empty.
    pub const PROGRESS_CHARS: &str = "█▓░";

    pub const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

    pub const DOWNLOAD_TEMPLATE: &str = "{spinner:.green} {prefix:.cyan.bold} ▕{bar:35.green/black}▏ {percent:>3}% • {bytes}/{total_bytes} • {bytes_per_sec} (ETA: {eta})";

    pub const SPINNER_TEMPLATE: &str =
        "{spinner:.green} {prefix:.cyan.bold} • ⏱️ {elapsed_precise} • {msg}";

    pub const BYTES_SPINNER_TEMPLATE: &str =
        "{spinner:.green} {prefix:.cyan.bold} • ⏱️ {elapsed_precise} • {bytes} • {bytes_per_sec}";
}

fn styled(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or(fallback)
        .progress_chars(progress_style::PROGRESS_CHARS)
        .tick_chars(progress_style::SPINNER_CHARS)
}

/// Spinner showing elapsed time and the most recent message.
pub fn create_spinner(prefix: &str, quiet: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if quiet {
        pb.set_draw_target(ProgressDrawTarget::hidden());
        return pb;
    }
    pb.set_style(styled(
        progress_style::SPINNER_TEMPLATE,
        ProgressStyle::default_spinner(),
    ));
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Byte progress for a download of `total` bytes, or a byte-counting spinner
/// when the length is unknown.
pub fn create_download_bar(total: Option<u64>, prefix: &str, quiet: bool) -> ProgressBar {
    let pb = match total {
        Some(len) if len > 0 => {
            let pb = ProgressBar::new(len);
            pb.set_style(styled(
                progress_style::DOWNLOAD_TEMPLATE,
                ProgressStyle::default_bar(),
            ));
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(styled(
                progress_style::BYTES_SPINNER_TEMPLATE,
                ProgressStyle::default_spinner(),
            ));
            pb
        }
    };

    if quiet {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_prefix(prefix.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb
}

/// Spinner messages are single-line; long log lines are cut on a char boundary.
pub fn truncate_message(line: &str, max_chars: usize) -> String {
    if line.chars().count() <= max_chars {
        return line.to_string();
    }
    let cut: String = line.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut)
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.2} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}
