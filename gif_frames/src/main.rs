// ============================================================================
// 🎞️ GIF Frame Count Retargeter CLI
// ============================================================================
//
// Usage:
//   gif-frames                                  (prompts for everything)
//   gif-frames run cat.gif -t 100 -o cat_small
//   gif-frames info cat.gif --json
//   gif-frames install
//
// ============================================================================

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::{style, Term};
use gif_frames::{
    default_output_name, default_target, execute_plan, format_rate, plan_from_media, Advice,
    Formulation, RetargetOutcome, RetargetRequest, Verification,
};
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::progress::{create_spinner, truncate_message};
use shared_utils::{
    ensure_all, handle_error, install_panic_handler, probe_media, report_error,
    validate_input_file, validate_output_name, AppError, CancellationToken, DriverLayout,
    ErrorAction, FileSize, FrameCount, InstallOptions, MediaInfo, ToolPaths, EXIT_FAILURE,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "gif-frames")]
#[command(version, about = "Retarget the frame count of animated GIFs through ffmpeg", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Echo debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-encode an animation to a target frame count (missing values are prompted for)
    Run(RunArgs),

    /// Show frame rate, duration and estimated frame count of a file
    Info {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
        /// Directory holding downloaded tools (default: ./driver or $GIF_FRAMES_DRIVER_DIR)
        #[arg(long)]
        driver_dir: Option<PathBuf>,
    },

    /// Download 7za and ffmpeg into the driver directory
    Install {
        #[arg(long)]
        driver_dir: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Desired number of frames in the output
    #[arg(short, long, value_parser = parse_target)]
    target: Option<u64>,

    /// Output file name; `.gif` is appended if missing, bare names go next to the input
    #[arg(short, long)]
    output: Option<String>,

    /// Print ffmpeg's full log after the run
    #[arg(long)]
    show_log: bool,

    /// How the new frame rate is derived
    #[arg(long, value_enum, default_value_t = Formulation::Duration)]
    formulation: Formulation,

    /// Directory holding downloaded tools (default: ./driver or $GIF_FRAMES_DRIVER_DIR)
    #[arg(long)]
    driver_dir: Option<PathBuf>,

    /// Fail instead of downloading missing tools
    #[arg(long)]
    no_install: bool,
}

fn parse_target(s: &str) -> std::result::Result<u64, String> {
    s.parse::<FrameCount>()
        .map(|f| f.get())
        .map_err(|e| e.to_string())
}

fn main() {
    let cli = Cli::parse();

    let console_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    if let Err(e) = init_logging("gif_frames", LogConfig::default().with_console_level(console_level)) {
        eprintln!("⚠️  Could not initialize logging: {}", e);
    }
    install_panic_handler();

    let cancel = CancellationToken::new();
    let transcoding = Arc::new(AtomicBool::new(false));
    let handler_token = cancel.clone();
    let handler_busy = Arc::clone(&transcoding);
    if let Err(e) = ctrlc::set_handler(move || {
        if interrupt_exits_now(handler_busy.load(Ordering::Acquire), handler_token.is_cancelled()) {
            eprintln!("\n⏹️  Cancelled");
            std::process::exit(130);
        }
        eprintln!("\n⏹️  Cancelling... (press Ctrl-C again to quit)");
        handler_token.cancel();
    }) {
        warn!(error = %e, "Could not install Ctrl-C handler");
    }

    let result = match cli.command {
        None => run_command(RunArgs::default(), cancel, &transcoding),
        Some(Commands::Run(args)) => run_command(args, cancel, &transcoding),
        Some(Commands::Info {
            input,
            json,
            driver_dir,
        }) => info_command(&input, json, driver_dir),
        Some(Commands::Install { driver_dir }) => install_command(driver_dir),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_FAILURE),
        Err(e) => std::process::exit(exit_code_for(e)),
    }
}

/// Without a running transcode (prompts, probing) there is nothing to stop, so
/// Ctrl-C exits at once. A second Ctrl-C during a transcode does too.
fn interrupt_exits_now(transcoding: bool, already_cancelled: bool) -> bool {
    !transcoding || already_cancelled
}

/// Report a command's error and pick the process exit code from its category.
fn exit_code_for(error: anyhow::Error) -> i32 {
    match error.downcast::<AppError>() {
        Ok(app) => match handle_error(app.category(), "gif-frames", &app, app.suggestion()) {
            ErrorAction::Exit(code) => code,
            ErrorAction::Continue => EXIT_FAILURE,
        },
        Err(other) => {
            let err: &(dyn std::error::Error + 'static) = other.as_ref();
            report_error(err);
            EXIT_FAILURE
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Tool resolution
// ═══════════════════════════════════════════════════════════════

fn layout_for(driver_dir: Option<PathBuf>) -> DriverLayout {
    driver_dir
        .map(DriverLayout::new)
        .unwrap_or_else(DriverLayout::from_env)
}

fn resolve_tools(driver_dir: Option<PathBuf>, allow_install: bool) -> Result<ToolPaths> {
    let layout = layout_for(driver_dir);
    match ToolPaths::resolve(&layout) {
        Ok(tools) => Ok(tools),
        Err(e) if allow_install && cfg!(windows) => {
            warn!(error = %e, "Tools missing, installing into driver directory");
            Ok(ensure_all(&layout, &InstallOptions::default())?)
        }
        Err(e) => Err(e.into()),
    }
}

// ═══════════════════════════════════════════════════════════════
// Prompts
// ═══════════════════════════════════════════════════════════════

fn ask(term: &Term, question: &str) -> Result<String> {
    term.write_str(&format!("{} ", style(question).bold()))?;
    let line = term.read_line().context("Failed to read from terminal")?;
    Ok(line.trim().to_string())
}

/// Dropped paths arrive wrapped in quotes on some terminals.
fn strip_quotes(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '"' || c == '\'')
}

fn prompt_input(term: &Term) -> Result<PathBuf> {
    loop {
        let answer = ask(term, "📁 Input GIF path (or drag the file here):")?;
        if answer.is_empty() {
            anyhow::bail!(AppError::invalid_input("no input file given"));
        }
        let path = PathBuf::from(strip_quotes(&answer));
        match validate_input_file(&path) {
            Ok(()) => return Ok(path),
            Err(e) => term.write_line(&format!("{} {}", style("❌").red(), e))?,
        }
    }
}

fn prompt_target(term: &Term, default: u64) -> Result<u64> {
    loop {
        let answer = ask(term, &format!("🎯 Target frame count [{}]:", default))?;
        if answer.is_empty() {
            return Ok(default);
        }
        match answer.parse::<FrameCount>() {
            Ok(count) => return Ok(count.get()),
            Err(e) => term.write_line(&format!("{} {}", style("❌").red(), e))?,
        }
    }
}

fn prompt_output(term: &Term, default: &str) -> Result<String> {
    loop {
        let answer = ask(term, &format!("💾 Output file name [{}]:", default))?;
        if answer.is_empty() {
            return Ok(default.to_string());
        }
        match validate_output_name(&answer) {
            Ok(()) => return Ok(answer),
            Err(e) => term.write_line(&format!("{} {}", style("❌").red(), e))?,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Reports
// ═══════════════════════════════════════════════════════════════

fn fmt_opt(value: Option<f64>, unit: &str) -> String {
    value
        .map(|v| format!("{:.2}{}", v, unit))
        .unwrap_or_else(|| "unknown".to_string())
}

fn print_media_info(term: &Term, title: &str, path: &Path, info: &MediaInfo) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    term.write_line(&format!("\n📊 {}", style(title).bold()))?;
    term.write_line("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    term.write_line(&format!("📁 File: {}", style(name).cyan()))?;
    term.write_line(&format!("💾 Size: {}", fmt_opt(info.file_size_mib(), " MiB")))?;
    term.write_line(&format!("🎞️  Average FPS: {}", fmt_opt(info.average_frame_rate, "")))?;
    term.write_line(&format!("⏱️  Duration: {}", fmt_opt(info.duration_seconds, " s")))?;
    term.write_line(&format!(
        "🔢 Estimated frames: {}",
        info.total_frames
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    ))?;
    if let Some(ref diag) = info.error {
        term.write_line(&format!("{} {}", style("⚠️").yellow(), style(diag).yellow()))?;
    }
    term.write_line("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    Ok(())
}

fn print_advice(term: &Term, advice: Advice) -> Result<()> {
    match advice {
        Advice::WillIncrease => {
            term.write_line(&format!("{} {}", style("⚠️").yellow(), style(advice).yellow()))?
        }
        Advice::Unchanged => term.write_line(&format!("💡 {}", advice))?,
        Advice::WillReduce => {}
    }
    Ok(())
}

fn print_outcome(term: &Term, request: &RetargetRequest, outcome: &RetargetOutcome) -> Result<()> {
    let Some(ref report) = outcome.verification else {
        return Ok(());
    };
    print_media_info(term, "Output", &request.output_path, &report.output)?;
    term.write_line(&format!("🎯 Requested frames: {}", report.requested))?;
    if let (Some(before), Some(after)) = (
        outcome.plan.source.file_size_bytes,
        report.output.file_size_bytes,
    ) {
        let after = FileSize::new(after);
        if let Some(pct) = after.size_change_percent(FileSize::new(before)) {
            term.write_line(&format!(
                "📉 Size change: {:+.1}% ({} → {})",
                pct,
                FileSize::new(before).display_mib(),
                after.display_mib()
            ))?;
        }
    }

    let line = match &report.outcome {
        Verification::ExactMatch | Verification::NearMatch(_) => {
            format!("{} {}", style("✅").green(), style(&report.outcome).green())
        }
        Verification::Mismatch(_) | Verification::Unverifiable(_) => {
            format!("{} {}", style("⚠️").yellow(), style(&report.outcome).yellow())
        }
    };
    term.write_line(&line)?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════

fn run_command(args: RunArgs, cancel: CancellationToken, transcoding: &AtomicBool) -> Result<bool> {
    let term = Term::stdout();
    term.write_line("╔══════════════════════════════════════════════╗")?;
    term.write_line("║   🎞️  GIF Frame Count Retargeter              ║")?;
    term.write_line("╚══════════════════════════════════════════════╝")?;

    let tools = resolve_tools(args.driver_dir.clone(), !args.no_install)?;

    let input = match args.input {
        Some(path) => path,
        None => prompt_input(&term)?,
    };
    validate_input_file(&input).map_err(|e| AppError::invalid_input(e.to_string()))?;

    let source = probe_media(&tools, &input);
    print_media_info(&term, "Source", &input, &source)?;

    let target = match args.target {
        Some(t) => t,
        None => prompt_target(&term, default_target(source.total_frames))?,
    };
    let output_name = match args.output {
        Some(name) => name,
        None => prompt_output(&term, &default_output_name(&input, target))?,
    };

    let request = RetargetRequest::new(&input, &output_name, target)?;
    let plan = plan_from_media(source, &request, args.formulation)?;

    print_advice(&term, plan.advice)?;
    term.write_line(&format!(
        "⚙️  New frame rate: {} ({:?})",
        style(format_rate(plan.rate)).cyan(),
        args.formulation
    ))?;
    term.write_line(&format!("💾 Output: {}", request.output_path.display()))?;

    let spinner = create_spinner("Transcoding", false);
    transcoding.store(true, Ordering::Release);
    let outcome = execute_plan(&tools, &request, plan, cancel, |line| {
        spinner.set_message(truncate_message(line, 80));
    });
    transcoding.store(false, Ordering::Release);
    spinner.finish_and_clear();
    let outcome = outcome?;

    if args.show_log {
        term.write_line(&format!("\n📜 {}", style("FFmpeg log").bold()))?;
        for line in &outcome.transcode.log_lines {
            term.write_line(&format!("   {}", line))?;
        }
    }

    if outcome.transcode.was_cancelled() {
        term.write_line(&format!("⏹️  {}", outcome.transcode.message))?;
        return Err(AppError::Cancelled.into());
    }
    if !outcome.transcode.succeeded {
        term.write_line(&format!("{} {}", style("❌").red(), outcome.transcode.message))?;
        return Ok(false);
    }

    term.write_line(&format!("{} {}", style("✅").green(), outcome.transcode.message))?;
    print_outcome(&term, &request, &outcome)?;
    info!(
        output = %request.output_path.display(),
        verification = ?outcome.verification.as_ref().map(|r| &r.outcome),
        "Run complete"
    );
    Ok(true)
}

fn info_command(input: &Path, json: bool, driver_dir: Option<PathBuf>) -> Result<bool> {
    validate_input_file(input).map_err(|e| AppError::invalid_input(e.to_string()))?;
    let tools = resolve_tools(driver_dir, false)?;
    let info = probe_media(&tools, input);

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_media_info(&Term::stdout(), "Media Info", input, &info)?;
    }
    Ok(info.error.is_none())
}

fn install_command(driver_dir: Option<PathBuf>) -> Result<bool> {
    let layout = layout_for(driver_dir);
    let tools = ensure_all(&layout, &InstallOptions::default())?;
    println!("{} ffmpeg:  {}", style("✅").green(), tools.ffmpeg.display());
    println!("{} ffprobe: {}", style("✅").green(), tools.ffprobe.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args_parse() {
        let cli = Cli::try_parse_from([
            "gif-frames", "run", "cat.gif", "-t", "100", "-o", "small", "--formulation", "frame-count",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.input, Some(PathBuf::from("cat.gif")));
                assert_eq!(args.target, Some(100));
                assert_eq!(args.output.as_deref(), Some("small"));
                assert_eq!(args.formulation, Formulation::FrameCount);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_zero_target_rejected_by_parser() {
        assert!(Cli::try_parse_from(["gif-frames", "run", "-t", "0"]).is_err());
        assert!(Cli::try_parse_from(["gif-frames", "run", "-t", "-3"]).is_err());
        assert!(Cli::try_parse_from(["gif-frames", "run", "-t", "abc"]).is_err());
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["gif-frames"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_interrupt_while_prompting_exits() {
        assert!(interrupt_exits_now(false, false));
        assert!(!interrupt_exits_now(true, false));
        assert!(interrupt_exits_now(true, true));
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(exit_code_for(AppError::invalid_input("bad target").into()), EXIT_FAILURE);
        assert_eq!(exit_code_for(AppError::Cancelled.into()), EXIT_FAILURE);
        assert_eq!(exit_code_for(anyhow::anyhow!("boom")), EXIT_FAILURE);
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"C:\\a b\\cat.gif\""), "C:\\a b\\cat.gif");
        assert_eq!(strip_quotes(" '/tmp/x.gif' "), "/tmp/x.gif");
    }
}
