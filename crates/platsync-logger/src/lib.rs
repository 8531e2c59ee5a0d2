//! Operator-facing output for platsync
//!
//! Console messages go to stderr and are filtered by verbosity; every message
//! is also appended to a log file that is truncated at the start of each run.
//! Subprocess output is only written to the log file.

use colored::Colorize;
use indicatif::ProgressBar;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

static LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);
static VERBOSITY: Mutex<u8> = Mutex::new(0);
static CURRENT_MODULE: Mutex<Option<String>> = Mutex::new(None);
static SPINNER: Mutex<Option<ProgressBar>> = Mutex::new(None);

const LOG_FILE_NAME: &str = "platsync.log";

/// Get the current verbosity level
pub fn get_verbosity() -> u8 {
    VERBOSITY.lock().ok().map(|v| *v).unwrap_or(0)
}

fn set_verbosity(verbosity: u8) {
    if let Ok(mut v) = VERBOSITY.lock() {
        *v = verbosity;
    }
}

/// Get the id of the platform module being processed
pub fn get_current_module() -> Option<String> {
    CURRENT_MODULE.lock().ok().and_then(|guard| guard.clone())
}

/// Set the id of the platform module being processed
pub fn set_current_module(module: Option<String>) {
    if let Ok(mut v) = CURRENT_MODULE.lock() {
        *v = module;
    }
}

/// Initialize the logger with the default log file location
pub fn init_with_verbosity(verbosity: u8) -> Result<(), String> {
    let log_dir = get_log_dir()?;
    init_with_log_file(verbosity, &log_dir.join(LOG_FILE_NAME))
}

/// Initialize the logger writing to a specific log file
pub fn init_with_log_file(verbosity: u8, log_file: &Path) -> Result<(), String> {
    set_verbosity(verbosity);

    if let Some(parent) = log_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create log directory: {}", e))?;
        }
    }

    // Truncate log file on each run (overwrite instead of append)
    if log_file.exists() {
        let _ = fs::remove_file(log_file);
    }

    let mut log_file_guard = LOG_FILE
        .lock()
        .map_err(|_| "Log file lock poisoned".to_string())?;
    *log_file_guard = Some(log_file.to_path_buf());

    Ok(())
}

/// Get the log directory path
fn get_log_dir() -> Result<PathBuf, String> {
    #[cfg(not(target_os = "windows"))]
    let log_dir = dirs::home_dir()
        .ok_or("Could not determine home directory")?
        .join(".config")
        .join("platsync");

    #[cfg(target_os = "windows")]
    let log_dir = dirs::config_dir()
        .ok_or("Could not determine config directory")?
        .join("platsync");

    Ok(log_dir)
}

/// Write to log file
fn write_to_log(message: &str) {
    if let Ok(log_file_guard) = LOG_FILE.lock() {
        if let Some(ref log_path) = *log_file_guard {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_path) {
                let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                let module = get_current_module().unwrap_or_else(|| "-".to_string());
                let _ = writeln!(file, "[{}] [{}] {}", timestamp, module, message);
            }
        }
    }
}

/// Log an informational message (to console if verbose >= 1, always to file)
pub fn info(message: &str) {
    write_to_log(&format!("INFO {}", message));
    if get_verbosity() >= 1 {
        suspend_spinner(|| eprintln!("{}", message));
    }
}

/// Log a debug message (to console if verbose >= 1, always to file)
pub fn debug(message: &str) {
    write_to_log(&format!("DEBUG {}", message));
    if get_verbosity() >= 1 {
        suspend_spinner(|| eprintln!("{} {}", "DEBUG:".blue().bold(), message));
    }
}

/// Log a warning message (to both file and console)
pub fn warn(message: &str) {
    write_to_log(&format!("WARN {}", message));
    suspend_spinner(|| eprintln!("{} {}", "warning:".yellow().bold(), message));
}

/// Log an error message (to both file and console)
pub fn error(message: &str) {
    write_to_log(&format!("ERROR {}", message));
    spinner_stop();
    eprintln!("{} {}", "Error:".red().bold(), message);
}

/// Log a success message
pub fn success(message: &str) {
    write_to_log(&format!("SUCCESS {}", message));
    let check = "\u{2714}".green().bold();
    suspend_spinner(|| eprintln!("{} {}", check, message));
}

/// Log a step message (console only at -vv, always to file)
pub fn step(message: &str) {
    if get_verbosity() >= 2 {
        suspend_spinner(|| eprintln!("TRACE: {}", message));
    }
    write_to_log(&format!("STEP: {}", message));
}

/// Record a finished subprocess and its output in the log file
pub fn capture_output(command_name: &str, exit_code: Option<i32>, stdout: &[u8], stderr: &[u8]) {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);

    write_to_log(&format!(
        "COMMAND: {} (exit code: {:?})",
        command_name, exit_code
    ));

    if !stdout.is_empty() {
        write_to_log(&format!("  STDOUT:\n{}", stdout));
    }

    if !stderr.is_empty() {
        write_to_log(&format!("  STDERR:\n{}", stderr));
    }
}

/// Get the log file path for display
pub fn get_log_path() -> Option<PathBuf> {
    LOG_FILE.lock().ok().and_then(|guard| guard.clone())
}

/// Print the log file path to the user
pub fn show_log_path() {
    if let Some(path) = get_log_path() {
        eprintln!("Log file: {}", path.display());
    } else if let Ok(log_dir) = get_log_dir() {
        eprintln!("Log file: {}", log_dir.join(LOG_FILE_NAME).display());
    } else {
        eprintln!("Log file location not available");
    }
}

fn suspend_spinner<F: FnOnce()>(print: F) {
    let guard = SPINNER.lock();
    match guard.as_ref().ok().and_then(|g| g.as_ref()) {
        Some(spinner) => spinner.suspend(print),
        None => print(),
    }
}

/// Start a spinner with the given message (only if not verbose)
pub fn spinner_start(message: &str) {
    // Don't show spinner in verbose mode, build steps print their own progress
    if get_verbosity() > 0 {
        return;
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.cyan} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner.set_message(message.to_string());

    if let Ok(mut spinner_guard) = SPINNER.lock() {
        if let Some(previous) = spinner_guard.replace(spinner) {
            previous.finish_and_clear();
        }
    }
}

/// Complete the spinner with a success message
pub fn spinner_success(message: &str) {
    spinner_stop();
    write_to_log(&format!("SUCCESS {}", message));
    eprintln!("{} {}", "✔".green().bold(), message);
}

/// Stop the spinner with an error message
pub fn spinner_error(message: &str) {
    spinner_stop();
    write_to_log(&format!("ERROR {}", message));
    eprintln!("  {} {}", "✗".red().bold(), message);
}

/// Stop the spinner without any message
pub fn spinner_stop() {
    if let Ok(mut spinner_guard) = SPINNER.lock() {
        if let Some(spinner) = spinner_guard.take() {
            spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Logger state is process-wide, so everything is checked in one test
    #[test]
    fn test_file_logging_and_module_tag() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let log_path = temp_dir.path().join("logs").join(LOG_FILE_NAME);
        assert!(fs::write(temp_dir.path().join("stale"), "x").is_ok());

        assert!(init_with_log_file(0, &log_path).is_ok());
        assert_eq!(get_verbosity(), 0);
        assert_eq!(get_log_path().as_deref(), Some(log_path.as_path()));

        set_current_module(Some("tidal".to_string()));
        debug("resolving library name");
        capture_output("cargo build --release", Some(101), b"", b"error[E0433]");
        set_current_module(None);
        step("done");

        let content = fs::read_to_string(&log_path).unwrap_or_default();
        assert!(content.contains("[tidal] DEBUG resolving library name"));
        assert!(content.contains("COMMAND: cargo build --release (exit code: Some(101))"));
        assert!(content.contains("error[E0433]"));
        assert!(content.contains("[-] STEP: done"));

        // Re-initializing truncates the previous run's log
        assert!(init_with_log_file(1, &log_path).is_ok());
        assert!(!log_path.exists());
        assert_eq!(get_verbosity(), 1);
    }
}
