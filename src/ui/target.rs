//! Render targets for decoded terminal output
//!
//! Every frame replaces the visible text wholesale. Text is always shown as
//! plain text: control characters are dropped so that escape sequences in the
//! remote output can never drive the local terminal.

use std::io::{self, Write};

use unicode_width::UnicodeWidthChar;

const TAB_WIDTH: usize = 8;

/// A surface that shows the latest frame
pub trait RenderTarget {
    /// Replace the visible text with `text`
    fn set_text(&mut self, text: &str) -> io::Result<()>;

    /// Show a short notice next to the frame (decode failures, stream end)
    fn notify(&mut self, _notice: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Split a frame into displayable lines.
///
/// `\r\n` and `\n` end lines, tabs expand to the next multiple of 8 columns,
/// and all other control characters are removed.
pub fn plain_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|raw| {
            let raw = raw.strip_suffix('\r').unwrap_or(raw);
            let mut line = String::with_capacity(raw.len());
            let mut col = 0usize;
            for ch in raw.chars() {
                if ch == '\t' {
                    let next = (col / TAB_WIDTH + 1) * TAB_WIDTH;
                    line.extend(std::iter::repeat(' ').take(next - col));
                    col = next;
                } else if !ch.is_control() {
                    line.push(ch);
                    col += ch.width().unwrap_or(0);
                }
            }
            line
        })
        .collect()
}

/// Lines of a frame as displayed; a trailing newline does not open a line
pub fn frame_lines(text: &str) -> Vec<String> {
    let mut lines = plain_lines(text);
    if lines.len() > 1 && lines.last().map_or(false, |l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// In-memory surface
#[cfg(test)]
#[derive(Debug, Default)]
pub struct TextSurface {
    text: String,
    renders: usize,
    notices: Vec<String>,
}

#[cfg(test)]
impl TextSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of the last frame
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of frames rendered so far
    pub fn renders(&self) -> usize {
        self.renders
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }
}

#[cfg(test)]
impl RenderTarget for TextSurface {
    fn set_text(&mut self, text: &str) -> io::Result<()> {
        self.text.clear();
        self.text.push_str(text);
        self.renders += 1;
        Ok(())
    }

    fn notify(&mut self, notice: &str) -> io::Result<()> {
        self.notices.push(notice.to_string());
        Ok(())
    }
}

/// Writes each frame to a stream, separated by form feeds
pub struct PlainTarget<W: Write> {
    out: W,
}

impl<W: Write> PlainTarget<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RenderTarget for PlainTarget<W> {
    fn set_text(&mut self, text: &str) -> io::Result<()> {
        for line in frame_lines(text) {
            writeln!(self.out, "{}", line)?;
        }
        writeln!(self.out, "\x0c")?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lines_strip_controls() {
        assert_eq!(plain_lines("hello"), vec!["hello"]);
        assert_eq!(plain_lines("a\r\nb\n"), vec!["a", "b", ""]);
        assert_eq!(plain_lines("\x1b[1;32mok\x1b[0m"), vec!["[1;32mok[0m"]);
        assert_eq!(plain_lines("\x07bell\x08"), vec!["bell"]);
    }

    #[test]
    fn test_plain_lines_expand_tabs() {
        assert_eq!(plain_lines("a\tb"), vec!["a       b"]);
        assert_eq!(plain_lines("\tx"), vec!["        x"]);
    }

    #[test]
    fn test_text_surface_overwrites() {
        let mut surface = TextSurface::new();
        surface.set_text("hello").unwrap();
        surface.set_text("world").unwrap();
        assert_eq!(surface.text(), "world");
        assert_eq!(surface.renders(), 2);
    }

    #[test]
    fn test_plain_target_frames() {
        let mut target = PlainTarget::new(Vec::new());
        target.set_text("$ ls\r\nfoo\r\n").unwrap();
        target.set_text("\x1b[Hbar").unwrap();
        let out = String::from_utf8(target.into_inner()).unwrap();
        assert_eq!(out, "$ ls\nfoo\n\x0c\n[Hbar\n\x0c\n");
    }
}
