//! Full-screen renderer using crossterm
//!
//! Shows the latest frame of the remote terminal with a status bar on the
//! last row. Frames longer than the screen show their last lines, the way a
//! terminal keeps its newest output in view.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::target::{frame_lines, RenderTarget};
use crate::config::ColorScheme;

/// What the status bar describes
#[derive(Debug, Clone, Default)]
pub struct StatusInfo {
    pub server: String,
    pub terminal: Option<String>,
    pub state: &'static str,
    /// Key help shown on the right
    pub hint: &'static str,
    /// Draw with alert colors
    pub alert: bool,
}

/// Terminal renderer
pub struct Renderer {
    /// Whether the terminal has been initialized
    initialized: bool,
    color_scheme: ColorScheme,
    status_visible: bool,
    status: StatusInfo,
    /// Last notice from the session
    notice: Option<String>,
    /// Sanitized lines of the current frame
    lines: Vec<String>,
    /// Current terminal size
    size: (u16, u16),
}

impl Renderer {
    pub fn new(color_scheme: ColorScheme, status_visible: bool) -> Self {
        Self {
            initialized: false,
            color_scheme,
            status_visible,
            status: StatusInfo::default(),
            notice: None,
            lines: Vec::new(),
            size: (80, 24),
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        self.size = Self::size()?;
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            DisableLineWrap,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        stdout.flush()?;
        self.initialized = true;
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        // End synchronized update (if active)
        write!(stdout, "\x1b[?2026l")?;
        let _ = execute!(
            stdout,
            ResetColor,
            SetAttribute(Attribute::Reset),
            Show,
            EnableLineWrap,
            LeaveAlternateScreen
        );
        let _ = stdout.flush();

        terminal::disable_raw_mode()
    }

    /// Get terminal size
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }

    pub fn resize(&mut self, cols: u16, rows: u16) -> io::Result<()> {
        self.size = (cols, rows);
        self.redraw()
    }

    pub fn set_status(&mut self, status: StatusInfo) -> io::Result<()> {
        self.status = status;
        self.redraw()
    }

    /// Draw the current frame and status bar
    pub fn redraw(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let stdout = io::stdout();
        let mut out = io::BufWriter::with_capacity(65536, stdout.lock());
        self.draw(&mut out)?;
        out.flush()
    }

    fn draw<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let (cols, rows) = self.size;
        let content_rows = usize::from(if self.status_visible {
            rows.saturating_sub(1)
        } else {
            rows
        });

        // Begin synchronized update (reduces flicker)
        write!(out, "\x1b[?2026h")?;

        let skip = self.lines.len().saturating_sub(content_rows);
        let mut visible = self.lines.iter().skip(skip);
        for row in 0..content_rows {
            queue!(out, MoveTo(0, row as u16))?;
            if let Some(line) = visible.next() {
                write!(out, "{}", clip_to_width(line, cols as usize))?;
            }
            queue!(out, Clear(ClearType::UntilNewLine))?;
        }

        if self.status_visible && rows > 0 {
            self.draw_status_bar(out, cols, rows - 1)?;
        }

        write!(out, "\x1b[?2026l")?;
        Ok(())
    }

    /// Render the status bar
    fn draw_status_bar<W: Write>(&self, out: &mut W, cols: u16, y: u16) -> io::Result<()> {
        let cs = &self.color_scheme;
        let (bg, fg) = if self.status.alert || self.notice.is_some() {
            (cs.status_alert_bg, cs.status_alert_fg)
        } else {
            (cs.status_bar_bg, cs.status_bar_fg)
        };
        queue!(
            out,
            MoveTo(0, y),
            SetBackgroundColor(bg.to_crossterm()),
            SetForegroundColor(fg.to_crossterm())
        )?;

        let left = status_text(&self.status, self.notice.as_deref());
        let right = self.status.hint;
        let width = cols as usize;
        let left = clip_to_width(&left, width.saturating_sub(right.width() + 3));
        let padding = width.saturating_sub(left.width() + right.width() + 2);

        let line = format!(" {}{:padding$}{} ", left, "", right, padding = padding);
        write!(out, "{}", clip_to_width(&line, width))?;
        queue!(out, ResetColor)?;
        Ok(())
    }
}

impl RenderTarget for Renderer {
    fn set_text(&mut self, text: &str) -> io::Result<()> {
        self.lines = frame_lines(text);
        self.redraw()
    }

    fn notify(&mut self, notice: &str) -> io::Result<()> {
        self.notice = Some(notice.to_string());
        self.redraw()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn status_text(status: &StatusInfo, notice: Option<&str>) -> String {
    let mut parts = vec!["termfeed".to_string(), status.server.clone()];
    if let Some(id) = &status.terminal {
        parts.push(format!("terminal {}", id));
    }
    if !status.state.is_empty() {
        parts.push(status.state.to_string());
    }
    if let Some(notice) = notice {
        parts.push(notice.to_string());
    }
    parts.join(" | ")
}

/// Truncate a line to at most `width` display columns
pub fn clip_to_width(line: &str, width: usize) -> String {
    let mut used = 0;
    let mut clipped = String::with_capacity(line.len().min(width * 4));
    for ch in line.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        clipped.push(ch);
    }
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(cols: u16, rows: u16, status_visible: bool) -> Renderer {
        let mut renderer = Renderer::new(ColorScheme::default(), status_visible);
        renderer.size = (cols, rows);
        renderer
    }

    fn drawn(renderer: &Renderer) -> String {
        let mut out = Vec::new();
        renderer.draw(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_clip_to_width() {
        assert_eq!(clip_to_width("hello", 3), "hel");
        assert_eq!(clip_to_width("hi", 10), "hi");
        // Wide characters are not split
        assert_eq!(clip_to_width("日本語", 5), "日本");
        assert_eq!(clip_to_width("abc", 0), "");
    }

    #[test]
    fn test_frame_overwrites_previous() {
        let mut renderer = renderer(20, 5, false);
        renderer.set_text("hello").unwrap();
        renderer.set_text("world").unwrap();
        let out = drawn(&renderer);
        assert!(out.contains("world"));
        assert!(!out.contains("hello"));
    }

    #[test]
    fn test_long_frame_shows_tail() {
        let mut renderer = renderer(20, 3, true);
        renderer.set_text("one\ntwo\nthree\nfour\n").unwrap();
        let out = drawn(&renderer);
        assert!(!out.contains("one"));
        assert!(!out.contains("two"));
        assert!(out.contains("three"));
        assert!(out.contains("four"));
    }

    #[test]
    fn test_escape_sequences_not_passed_through() {
        let mut renderer = renderer(40, 5, false);
        renderer.set_text("\x1b]0;title\x07\x1b[31mred").unwrap();
        let out = drawn(&renderer);
        assert!(out.contains("]0;title[31mred"));
        assert!(!out.contains("\x1b]0;"));
    }

    #[test]
    fn test_status_bar_contents() {
        let mut renderer = renderer(120, 5, true);
        renderer
            .set_status(StatusInfo {
                server: "http://127.0.0.1:8080/".to_string(),
                terminal: Some("1".to_string()),
                state: "streaming",
                hint: "q: quit",
                alert: false,
            })
            .unwrap();
        renderer.notify("stream closed").unwrap();

        let out = drawn(&renderer);
        assert!(out.contains("termfeed | http://127.0.0.1:8080/ | terminal 1 | streaming | stream closed"));
        assert!(out.contains("q: quit"));
    }

    #[test]
    fn test_status_text_without_terminal() {
        let status = StatusInfo {
            server: "http://h/".to_string(),
            state: "connecting",
            ..StatusInfo::default()
        };
        assert_eq!(status_text(&status, None), "termfeed | http://h/ | connecting");
    }
}
