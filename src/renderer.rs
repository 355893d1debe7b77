//! Receipt Renderer (C8): a 40-column line sink.
//!
//! Abstracted behind [`LineSink`] so the fiscal state machine can print
//! without depending on standard output directly; tests use [`CapturingSink`]
//! to assert on the exact lines produced.

use std::io::Write as _;
use std::time::Duration;

/// Column width every rendered line is padded/truncated to.
pub const WIDTH: usize = 40;

/// First byte of a line that marks "double-wide" bold styling.
pub const DOUBLE_WIDE_MARKER: char = '\u{f4}';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
}

/// A line-oriented sink for the emulated printer.
pub trait LineSink {
    fn write_line(&mut self, text: &str, align: Align);
    fn flush(&mut self);

    fn write_left(&mut self, text: &str) {
        self.write_line(text, Align::Left);
    }

    fn write_right(&mut self, text: &str) {
        self.write_line(text, Align::Right);
    }

    fn write_separator(&mut self) {
        self.write_line(&"-".repeat(WIDTH), Align::Left);
    }
}

/// Applies the `0xF4` double-wide convention, if present, then pads/truncates
/// to [`WIDTH`] columns per `align`.
fn format_line(text: &str, align: Align) -> String {
    let rendered = if let Some(rest) = text.strip_prefix(DOUBLE_WIDE_MARKER) {
        let spaced: String = rest
            .chars()
            .enumerate()
            .flat_map(|(i, c)| if i == 0 { vec![c] } else { vec![' ', c] })
            .collect();
        let content: String = std::iter::once(' ').chain(spaced.chars()).take(WIDTH).collect();
        format!("\x1b[;1m{content}\x1b[0m")
    } else {
        text.to_string()
    };

    let len = rendered.chars().count();
    if len >= WIDTH {
        return rendered;
    }
    let pad = WIDTH - len;
    match align {
        Align::Left => format!("{rendered}{}", " ".repeat(pad)),
        Align::Right => format!("{}{rendered}", " ".repeat(pad)),
        Align::Center => {
            let left = pad / 2;
            let right = pad - left;
            format!("{}{rendered}{}", " ".repeat(left), " ".repeat(right))
        }
    }
}

/// Default [`LineSink`]: standard output with ANSI styling, paced by a small
/// per-line sleep (not required for correctness, just to mimic a slow printer).
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn write_line(&mut self, text: &str, align: Align) {
        std::thread::sleep(Duration::from_millis(20));
        println!("{}", format_line(text, align));
        let _ = std::io::stdout().flush();
    }

    fn flush(&mut self) {
        let _ = std::io::stdout().flush();
    }
}

/// A [`LineSink`] that captures rendered lines in memory, for tests.
#[derive(Default)]
pub struct CapturingSink {
    pub lines: Vec<String>,
}

impl LineSink for CapturingSink {
    fn write_line(&mut self, text: &str, align: Align) {
        self.lines.push(format_line(text, align));
    }

    fn flush(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line_left_padded_to_width() {
        let line = format_line("hello", Align::Left);
        assert_eq!(line.chars().count(), WIDTH);
        assert!(line.starts_with("hello"));
    }

    #[test]
    fn separator_is_forty_dashes() {
        let mut sink = CapturingSink::default();
        sink.write_separator();
        assert_eq!(sink.lines[0], "-".repeat(WIDTH));
    }

    #[test]
    fn double_wide_marker_wraps_in_bold_ansi() {
        let line = format_line("\u{f4}TOTAL", Align::Left);
        assert!(line.starts_with("\x1b[;1m"));
        assert!(line.ends_with("\x1b[0m"));
    }

    #[test]
    fn right_align_pads_on_the_left() {
        let line = format_line("hi", Align::Right);
        assert!(line.ends_with("hi"));
        assert_eq!(line.chars().count(), WIDTH);
    }
}
