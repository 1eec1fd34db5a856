//! Console rendering: colours, banner, progress spinner.

use std::io::IsTerminal;
use std::time::Duration;

use colored::{Color, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use terminal_size::{terminal_size, Height, Width};

/// Moves the cursor up one line and clears it.
const ERASE_PREVIOUS_LINE: &str = "\x1b[1A\x1b[2K";

const RESET: &str = "\x1b[0m";

/// How the conversation is drawn. Injected into the input resolver and the
/// conversation loop instead of hard-coded escape sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleStyle {
    /// Prompt and echoed query
    pub prompt: Option<Color>,
    /// Agent answers and the farewell
    pub answer: Option<Color>,
    /// Hints such as the blank-input reminder
    pub hint: Option<Color>,
    /// Overwrite the blank input line when a sample query is substituted
    pub rewrite_lines: bool,
    /// Show a spinner while the agent is working
    pub spinner: bool,
}

impl ConsoleStyle {
    /// Colours and cursor control for an interactive terminal.
    pub fn colored() -> Self {
        Self {
            prompt: Some(Color::Yellow),
            answer: Some(Color::Cyan),
            hint: Some(Color::BrightBlack),
            rewrite_lines: true,
            spinner: true,
        }
    }

    /// No escape sequences at all.
    pub fn plain() -> Self {
        Self {
            prompt: None,
            answer: None,
            hint: None,
            rewrite_lines: false,
            spinner: false,
        }
    }

    /// Colour only when stdout is a terminal and `NO_COLOR` is not set.
    pub fn detect() -> Self {
        if std::io::stdout().is_terminal() && colored::control::SHOULD_COLORIZE.should_colorize() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn prompt(&self, text: &str) -> String {
        paint(text, self.prompt)
    }

    pub fn answer(&self, text: &str) -> String {
        paint(text, self.answer)
    }

    pub fn hint(&self, text: &str) -> String {
        paint(text, self.hint)
    }

    /// Switch to the prompt colour without resetting, so typed input echoes
    /// in it. Pair with [`ConsoleStyle::end_input_echo`].
    pub fn begin_input_echo(&self) -> String {
        match self.prompt {
            Some(color) => format!("\x1b[{}m", color.to_fg_str()),
            None => String::new(),
        }
    }

    pub fn end_input_echo(&self) -> &'static str {
        if self.prompt.is_some() {
            RESET
        } else {
            ""
        }
    }

    /// Escape sequence that removes the line just typed, if enabled.
    pub fn erase_previous_line(&self) -> &'static str {
        if self.rewrite_lines {
            ERASE_PREVIOUS_LINE
        } else {
            ""
        }
    }

    /// Spinner shown on stderr while the agent runs; `None` when disabled.
    pub fn thinking_spinner(&self) -> Option<ProgressBar> {
        if !self.spinner {
            return None;
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.magenta} {msg}") {
            bar.set_style(style);
        }
        bar.set_message("Thinking...");
        bar.enable_steady_tick(Duration::from_millis(100));
        Some(bar)
    }
}

impl Default for ConsoleStyle {
    fn default() -> Self {
        Self::detect()
    }
}

fn paint(text: &str, color: Option<Color>) -> String {
    match color {
        Some(c) => text.color(c).to_string(),
        None => text.to_string(),
    }
}

/// Startup banner with model and tool information.
pub fn print_header(provider: &str, model: &str, tool_count: usize) {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    let width = width.0 as usize;

    let line = "─".repeat(width);
    println!("{}", line.black().bold());

    let name = "mcp-chat".yellow().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  {} {}", name, version);

    let info = format!("  {}  •  {}  •  {} tool(s)", provider, model, tool_count).cyan();
    println!("{}", info);

    println!("{}", line.black().bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_style_passes_text_through() {
        let style = ConsoleStyle::plain();
        assert_eq!(style.prompt("Query: "), "Query: ");
        assert_eq!(style.answer("done"), "done");
        assert_eq!(style.erase_previous_line(), "");
        assert_eq!(style.begin_input_echo(), "");
        assert_eq!(style.end_input_echo(), "");
        assert!(style.thinking_spinner().is_none());
    }

    #[test]
    fn test_colored_style_rewrites_lines() {
        let style = ConsoleStyle::colored();
        assert_eq!(style.erase_previous_line(), ERASE_PREVIOUS_LINE);
        assert_eq!(style.prompt, Some(Color::Yellow));
        assert_eq!(style.answer, Some(Color::Cyan));
        assert_eq!(style.begin_input_echo(), "\x1b[33m");
        assert_eq!(style.end_input_echo(), RESET);
    }
}
