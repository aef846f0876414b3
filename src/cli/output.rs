//! Colored terminal output for conversions
//!
//! Progress goes to stdout and is silenced by `--quiet`; errors and their
//! suggestions always go to stderr.

use std::io::{self, Write};
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Output manager for consistent colored terminal output
#[derive(Debug)]
pub struct OutputManager {
    stdout: BufferWriter,
    stderr: BufferWriter,
    quiet: bool,
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(quiet: bool) -> Self {
        Self {
            stdout: BufferWriter::stdout(ColorChoice::Auto),
            stderr: BufferWriter::stderr(ColorChoice::Auto),
            quiet,
        }
    }

    /// Print an info message (normal output)
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.status(&self.stdout, "ℹ", Color::Cyan, false, message);
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.status(&self.stdout, "✓", Color::Green, false, message);
        }
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        if !self.quiet {
            self.status(&self.stdout, "⚠", Color::Yellow, true, message);
        }
    }

    /// Print an error message (always shown)
    pub fn error(&self, message: &str) {
        self.status(&self.stderr, "✗", Color::Red, true, message);
    }

    /// Print indented text under an error (always shown)
    pub fn indent(&self, message: &str) {
        let mut buffer = self.stderr.buffer();
        let _ = writeln!(&mut buffer, "    {}", message);
        let _ = self.stderr.print(&buffer);
    }

    /// Symbol in bold color, then the message (colored too when `tinted`).
    fn status(
        &self,
        writer: &BufferWriter,
        symbol: &str,
        color: Color,
        tinted: bool,
        message: &str,
    ) {
        let mut buffer = writer.buffer();
        if render(&mut buffer, symbol, color, tinted, message).is_err()
            || writer.print(&buffer).is_err()
        {
            eprintln!("{} {}", symbol, message);
        }
    }
}

fn render(
    buffer: &mut Buffer,
    symbol: &str,
    color: Color,
    tinted: bool,
    message: &str,
) -> io::Result<()> {
    buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(buffer, "{}", symbol)?;
    buffer.reset()?;
    if tinted {
        buffer.set_color(ColorSpec::new().set_fg(Some(color)))?;
    }
    writeln!(buffer, " {}", message)?;
    buffer.reset()
}
