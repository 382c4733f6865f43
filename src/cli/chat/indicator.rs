use std::io::Write;
use std::time::Duration;

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use eyre::Result;

pub const BLINK_INTERVAL: Duration = Duration::from_millis(500);

const LIT: &str = "●";
const DIM: &str = "○";

/// A one-line "waiting for a reply" marker that blinks in place.
#[derive(Debug, Default)]
pub struct Indicator {
    lit: bool,
    drawn: bool,
}

impl Indicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the marker and redraw it over the current line.
    pub fn blink<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.lit = !self.lit;
        let glyph = if self.lit { LIT } else { DIM };
        queue!(
            out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(format!("{glyph} waiting for Gemini"))
        )?;
        out.flush()?;
        self.drawn = true;
        Ok(())
    }

    /// Erase the marker if it was ever drawn.
    pub fn clear<W: Write>(&mut self, out: &mut W) -> Result<()> {
        if self.drawn {
            queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
            out.flush()?;
        }
        self.lit = false;
        self.drawn = false;
        Ok(())
    }
}
