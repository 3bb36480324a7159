// src/report.rs

//! User-facing status output.
//!
//! Components never print directly; they are handed an `Arc<dyn Reporter>`.
//! [`TerminalReporter`] is the production implementation. Diagnostics that are
//! not meant for the developer's eyes go through `tracing` instead.

use std::io::Write;
use std::time::Duration;

use is_terminal::IsTerminal;
use owo_colors::{OwoColorize, Style};

use crate::config::Config;
use crate::errors::DevloopError;

/// How a line of build output should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    /// Package/module header such as `# example.com/app/cmd/api`.
    Context,
    /// Anything else the compiler printed.
    Error,
}

/// Sink for everything the developer sees from the loop itself.
pub trait Reporter: Send + Sync {
    /// Startup summary of what is being watched.
    fn banner(&self, config: &Config);
    fn build_started(&self);
    fn build_line(&self, kind: LineKind, line: &str);
    fn build_failed(&self, code: Option<i32>);
    /// The new generation is running; `elapsed` is the build duration.
    fn restarted(&self, elapsed: Duration);
    fn start_failed(&self, err: &DevloopError);
    fn warning(&self, message: &str);
    fn stopping(&self);
    fn stopped(&self);
}

/// Renders badges and classified build lines on the terminal.
///
/// Status goes to stdout, build output to stderr.
#[derive(Debug, Clone)]
pub struct TerminalReporter {
    color: bool,
}

impl TerminalReporter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Enable colour only when stdout is a terminal.
    pub fn detect() -> Self {
        Self::new(std::io::stdout().is_terminal())
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn badge(&self, label: &str, style: Style) -> String {
        self.paint(&format!(" {label} "), style)
    }

    fn status(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out);
        let _ = writeln!(out, "  {line}");
        let _ = writeln!(out);
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::detect()
    }
}

fn on_green() -> Style {
    Style::new().white().on_green().bold()
}

fn on_red() -> Style {
    Style::new().white().on_red().bold()
}

fn on_blue() -> Style {
    Style::new().white().on_blue().bold()
}

fn gray() -> Style {
    Style::new().bright_black()
}

impl Reporter for TerminalReporter {
    fn banner(&self, config: &Config) {
        let sep = self.paint(&"─".repeat(54), Style::new().dimmed());
        let label = |name: &str| self.paint(&format!("  {name:<12}"), gray());
        let value = |v: &str| self.paint(v, Style::new().bold());

        let dirs: Vec<String> = config
            .watch_dirs()
            .iter()
            .map(|d| d.display().to_string())
            .collect();

        let mut out = std::io::stdout().lock();
        let _ = writeln!(out);
        let _ = writeln!(out, "  {sep}");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  {}  {}",
            self.badge("DEVLOOP", on_green()),
            self.paint("watching for changes, Ctrl+C to stop", gray())
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "  {}{}", label("extensions"), value(&config.extensions().join(" ")));
        let _ = writeln!(out, "  {}{}", label("watch dirs"), value(&dirs.join(", ")));
        let _ = writeln!(
            out,
            "  {}{}",
            label("debounce"),
            value(&format!("{} ms", config.debounce().as_millis()))
        );
        let _ = writeln!(out, "  {}{}", label("binary"), value(config.bin()));
        let _ = writeln!(out);
        let _ = writeln!(out, "  {sep}");
    }

    fn build_started(&self) {
        self.status(&self.badge("RE-BUILDING", on_blue()));
    }

    fn build_line(&self, kind: LineKind, line: &str) {
        let mut err = std::io::stderr().lock();
        let _ = match kind {
            LineKind::Blank => writeln!(err),
            LineKind::Context => writeln!(
                err,
                "  {}",
                self.paint(line, Style::new().bright_black().dimmed())
            ),
            LineKind::Error => writeln!(err, "  {}", self.paint(&format!("× {line}"), Style::new().red())),
        };
    }

    fn build_failed(&self, code: Option<i32>) {
        let detail = match code {
            Some(code) => format!("exit code {code}"),
            None => "terminated".to_string(),
        };
        self.status(&format!(
            "{}  {}",
            self.badge("BUILD FAILED", on_red()),
            self.paint(&format!("({detail})"), gray())
        ));
    }

    fn restarted(&self, elapsed: Duration) {
        self.status(&format!(
            "{}  {}",
            self.badge("APP RESTARTED", on_green()),
            self.paint(&format!("({})", format_elapsed(elapsed)), gray())
        ));
    }

    fn start_failed(&self, err: &DevloopError) {
        self.status(&format!(
            "{}  {}",
            self.badge("ERROR", on_red()),
            self.paint(&format!("failed to start binary: {err}"), Style::new().red())
        ));
    }

    fn warning(&self, message: &str) {
        let _ = writeln!(
            std::io::stdout().lock(),
            "  {}",
            self.paint(&format!("⚠  {message}"), Style::new().yellow())
        );
    }

    fn stopping(&self) {
        self.status(&self.paint("Stopping application…", gray()));
    }

    fn stopped(&self) {
        self.status(&format!(
            "{}  {}",
            self.badge("DEVLOOP", on_green()),
            self.paint("stopped.", gray())
        ));
    }
}

/// `742ms` below one second, `3.4s` from there on.
pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}
