//! Running progress log: colorized on the console, plain on disk

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

use crossterm::style::Stylize;
use regex::Regex;

use crate::error::Result;

fn ansi_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ansi pattern is valid"))
}

/// Remove ANSI escape sequences
pub fn strip_ansi(text: &str) -> String {
    ansi_regex().replace_all(text, "").into_owned()
}

/// Color of a progress line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Failure,
    Heading,
}

impl Tone {
    fn paint(self, line: &str) -> String {
        match self {
            Tone::Info => line.to_string(),
            Tone::Success => line.green().to_string(),
            Tone::Warning => line.yellow().to_string(),
            Tone::Failure => line.red().bold().to_string(),
            Tone::Heading => line.cyan().bold().to_string(),
        }
    }
}

/// Appends every line to the colorized and plain log files
#[derive(Debug)]
pub struct SummaryLog {
    color: File,
    plain: File,
    console: bool,
}

impl SummaryLog {
    /// Open (appending) both log files
    pub fn open(color_path: &Path, plain_path: &Path) -> Result<Self> {
        let open = |path: &Path| OpenOptions::new().create(true).append(true).open(path);
        Ok(Self {
            color: open(color_path)?,
            plain: open(plain_path)?,
            console: true,
        })
    }

    /// Also print lines to stdout
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Write one line in the given tone
    pub fn line(&mut self, tone: Tone, text: &str) -> Result<()> {
        let painted = tone.paint(text);
        if self.console {
            println!("{painted}");
        }
        writeln!(self.color, "{painted}")?;
        writeln!(self.plain, "{}", strip_ansi(&painted))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[32mok\x1b[0m"), "ok");
        assert_eq!(strip_ansi("\x1b[1m\x1b[31mbad\x1b[0m done"), "bad done");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_plain_log_has_no_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let color = dir.path().join("summary_color.log");
        let plain = dir.path().join("summary.log");

        let mut log = SummaryLog::open(&color, &plain).unwrap().with_console(false);
        log.line(Tone::Heading, "Sweep started").unwrap();
        log.line(Tone::Success, "scenario 1/2 succeeded").unwrap();
        log.line(Tone::Failure, "scenario 2/2 failed").unwrap();
        drop(log);

        let plain_text = std::fs::read_to_string(&plain).unwrap();
        assert_eq!(
            plain_text,
            "Sweep started\nscenario 1/2 succeeded\nscenario 2/2 failed\n"
        );
        assert!(!plain_text.contains('\x1b'));

        let color_text = std::fs::read_to_string(&color).unwrap();
        assert_eq!(strip_ansi(&color_text), plain_text);
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let color = dir.path().join("c.log");
        let plain = dir.path().join("p.log");

        for text in ["one", "two"] {
            SummaryLog::open(&color, &plain)
                .unwrap()
                .with_console(false)
                .line(Tone::Info, text)
                .unwrap();
        }
        assert_eq!(std::fs::read_to_string(&plain).unwrap(), "one\ntwo\n");
    }
}
