//! Terminal output: a scoped writer that redraws frames in place and a pacer
//! that holds the configured frame rate.

use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, MoveToColumn, MoveToNextLine, MoveToPreviousLine, Show};
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};

use crate::frame::Frame;
use crate::geometry::Anchor;

/// Detected terminal size as (columns, rows).
pub fn terminal_size() -> Option<(usize, usize)> {
    crossterm::terminal::size()
        .ok()
        .filter(|(columns, rows)| *columns > 0 && *rows > 0)
        .map(|(columns, rows)| (usize::from(columns), usize::from(rows)))
}

/// Shows the cursor again, and leaves the alternate screen when playback
/// entered it, before the default panic output runs.
pub fn install_panic_hook(alternate_screen: bool) {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        if alternate_screen {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
        let _ = execute!(io::stdout(), Show);
        original_hook(panic_info);
    }));
}

/// Owns the terminal region frames are drawn into. The cursor is hidden while
/// the value lives; dropping it emits the end symbol once and shows the
/// cursor again.
pub struct TerminalOutput<W: Write> {
    writer: W,
    rows: u16,
    column_offset: u16,
    top_padding: u16,
    end_symbol: String,
    alternate_screen: bool,
    finished: bool,
}

impl<W: Write> TerminalOutput<W> {
    /// Hides the cursor and reserves enough lines below it for a canvas of
    /// `canvas` (columns, rows) anchored inside `terminal`. With
    /// `alternate_screen` frames are drawn on the alternate screen and the
    /// end symbol is written after returning to the main one.
    pub fn acquire(
        mut writer: W,
        canvas: (usize, usize),
        anchor: Anchor,
        terminal: Option<(usize, usize)>,
        end_symbol: impl Into<String>,
        alternate_screen: bool,
    ) -> io::Result<Self> {
        let (column_offset, top_padding) = match terminal {
            Some(outer) => {
                let (x, y) = anchor.place(canvas, outer);
                let free_rows = outer.1.saturating_sub(canvas.1);
                (x, free_rows - y)
            }
            None => (0, 0),
        };
        let rows = clamp_u16(canvas.1 + top_padding);

        if alternate_screen {
            queue!(writer, EnterAlternateScreen)?;
        }
        queue!(writer, Hide)?;
        for _ in 0..rows {
            queue!(writer, Print("\n"))?;
        }
        writer.flush()?;

        Ok(Self {
            writer,
            rows,
            column_offset: clamp_u16(column_offset),
            top_padding: clamp_u16(top_padding),
            end_symbol: end_symbol.into(),
            alternate_screen,
            finished: false,
        })
    }

    /// Redraws the reserved region with `frame`; the cursor ends below it.
    pub fn print(&mut self, frame: &Frame) -> io::Result<()> {
        if self.rows == 0 {
            return Ok(());
        }
        queue!(self.writer, MoveToPreviousLine(self.rows))?;
        if self.top_padding > 0 {
            queue!(self.writer, MoveToNextLine(self.top_padding))?;
        }
        for line in frame.lines() {
            queue!(
                self.writer,
                MoveToColumn(self.column_offset),
                Print(line),
                Clear(ClearType::UntilNewLine),
                MoveToNextLine(1)
            )?;
        }
        self.writer.flush()
    }

    /// Emits the end symbol and restores the cursor, reporting write errors
    /// that a drop would swallow.
    pub fn finish(mut self) -> io::Result<()> {
        self.restore()
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if self.alternate_screen {
            queue!(self.writer, LeaveAlternateScreen)?;
        }
        queue!(self.writer, Print(&self.end_symbol), Show)?;
        self.writer.flush()
    }
}

impl<W: Write> Drop for TerminalOutput<W> {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

fn clamp_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Sleeps between frames so output runs at a fixed rate. A rate of 0 never
/// sleeps.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Option<Duration>,
    next_deadline: Option<Instant>,
}

impl FramePacer {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            interval: (frame_rate > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(frame_rate))),
            next_deadline: None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn wait(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        match self.next_deadline {
            Some(deadline) if deadline > now => {
                thread::sleep(deadline - now);
                self.next_deadline = Some(deadline + interval);
            }
            _ => self.next_deadline = Some(now + interval),
        }
    }
}
