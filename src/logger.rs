//! Terminal logging with colored module prefixes.
//!
//! - `log!` always prints, `debug!` only in verbose mode
//! - [`Progress`] draws a single in-place bar while build waves run
//!
//! Everything goes to stderr so that `summary` and `dump` output on stdout
//! stays machine-readable.
//!
//! ```ignore
//! log!("build"; "{} pages", count);
//! debug!("stale"; "{} seeds", seeds.len());
//!
//! let progress = Progress::new("build", total);
//! progress.inc();
//! progress.finish();
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
};
use parking_lot::Mutex;
use std::{
    io::{IsTerminal, Write, stderr},
    sync::{
        OnceLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set while a [`Progress`] line occupies the bottom row.
static PROGRESS_ACTIVE: AtomicBool = AtomicBool::new(false);

// "[module] [████░░░░] 42/100"
const MIN_BAR_WIDTH: usize = 10;
const MAX_BAR_WIDTH: usize = 40;

/// `[`, `]` and the trailing space around a module name.
#[inline]
const fn prefix_len(module_len: usize) -> usize {
    module_len + 3
}

fn terminal_width() -> usize {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120)) as usize
}

// ============================================================================
// Macros
// ============================================================================

/// Log a message with a colored module prefix.
///
/// ```ignore
/// log!("watch"; "{} changed", path.display());
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Like [`log!`], but only when `--verbose` is set.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

pub fn set_verbose(on: bool) {
    VERBOSE.store(on, Ordering::Relaxed);
}

#[inline]
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

// ============================================================================
// Progress
// ============================================================================

/// Single-row progress bar, safe to bump from rayon workers.
///
/// Does nothing when stderr is not a terminal.
pub struct Progress {
    module: &'static str,
    total: usize,
    current: AtomicUsize,
    enabled: bool,
    lock: Mutex<()>,
}

impl Progress {
    pub fn new(module: &'static str, total: usize) -> Self {
        let enabled = total > 1 && stderr().is_terminal();
        if enabled {
            PROGRESS_ACTIVE.store(true, Ordering::SeqCst);
        }
        Self {
            module,
            total,
            current: AtomicUsize::new(0),
            enabled,
            lock: Mutex::new(()),
        }
    }

    pub fn inc(&self) {
        let current = self.current.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.enabled {
            return;
        }

        let _guard = self.lock.lock();
        let text = format!("{current}/{}", self.total);
        let overhead = prefix_len(self.module.len()) + 3 + 1 + text.len();
        let width = terminal_width().saturating_sub(overhead).clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);
        let filled = (current * width) / self.total.max(1);
        let bar = "█".repeat(filled.min(width)) + &"░".repeat(width.saturating_sub(filled));

        let mut err = stderr().lock();
        execute!(err, Clear(ClearType::CurrentLine), cursor::MoveToColumn(0)).ok();
        write!(err, "{} [{bar}] {text}", colorize_prefix(self.module)).ok();
        err.flush().ok();
    }

    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        let _guard = self.lock.lock();
        let mut err = stderr().lock();
        execute!(err, Clear(ClearType::CurrentLine), cursor::MoveToColumn(0)).ok();
        err.flush().ok();
        PROGRESS_ACTIVE.store(false, Ordering::SeqCst);
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish();
    }
}

// ============================================================================
// Output
// ============================================================================

/// Print `[module] message`, truncated to the terminal width.
///
/// Multi-line messages (error chains, cycle listings) are printed whole.
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);
    let mut err = stderr().lock();

    if PROGRESS_ACTIVE.load(Ordering::SeqCst) {
        execute!(err, Clear(ClearType::CurrentLine), cursor::MoveToColumn(0)).ok();
    }

    let message = if message.contains('\n') {
        message
    } else {
        truncate_str(message, terminal_width().saturating_sub(prefix_len(module.len())))
    };

    writeln!(err, "{prefix} {message}").ok();
    err.flush().ok();
}

fn colorize_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "serve" => prefix.bright_blue().bold(),
        "watch" => prefix.bright_green().bold(),
        "error" | "fail" => prefix.bright_red().bold(),
        "cycle" => prefix.bright_magenta().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Cut `s` to at most `max_len` bytes on a char boundary.
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_len() {
        // "[build] "
        assert_eq!(prefix_len(5), 8);
        assert_eq!(prefix_len(0), 3);
    }

    #[test]
    fn test_truncate_str_ascii() {
        assert_eq!(truncate_str("hello world", 5), "hello");
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 0), "");
    }

    #[test]
    fn test_truncate_str_unicode_boundary() {
        // 3 bytes per char
        assert_eq!(truncate_str("你好", 4), "你");
        assert_eq!(truncate_str("a你b", 3), "a");
    }

    #[test]
    fn test_verbose_toggle() {
        set_verbose(true);
        assert!(is_verbose());
        set_verbose(false);
        assert!(!is_verbose());
    }

    #[test]
    fn test_progress_counts_without_terminal() {
        let progress = Progress::new("build", 3);
        progress.inc();
        progress.inc();
        assert_eq!(progress.current.load(Ordering::Relaxed), 2);
        progress.finish();
    }
}
