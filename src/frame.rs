use crate::color::{ColorMode, SGR_RESET};
use crate::scene::Visual;

/// One composited frame. Lines are stored top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    tick: u64,
    lines: Vec<String>,
    plain: Vec<String>,
}

impl Frame {
    /// Renders a `height` x `width` cell grid (top row first); empty cells
    /// print as spaces.
    pub fn from_cells(
        cells: &[Option<Visual>],
        width: usize,
        height: usize,
        tick: u64,
        mode: ColorMode,
    ) -> Self {
        let mut lines = Vec::with_capacity(height);
        let mut plain = Vec::with_capacity(height);
        for row in cells.chunks(width.max(1)).take(height) {
            let (styled, bare) = render_line(row, mode);
            lines.push(styled);
            plain.push(bare);
        }
        while lines.len() < height {
            lines.push(" ".repeat(width));
            plain.push(" ".repeat(width));
        }
        Self {
            width,
            height,
            tick,
            lines,
            plain,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn plain_lines(&self) -> &[String] {
        &self.plain
    }

    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn to_plain_text(&self) -> String {
        self.plain.join("\n")
    }
}

fn render_line(row: &[Option<Visual>], mode: ColorMode) -> (String, String) {
    let mut styled = String::with_capacity(row.len());
    let mut bare = String::with_capacity(row.len());
    let mut active: Option<String> = None;

    for cell in row {
        let (symbol, style) = match cell {
            Some(visual) => (visual.symbol, style_for(visual, mode)),
            None => (' ', None),
        };
        if style != active {
            if active.is_some() {
                styled.push_str(SGR_RESET);
            }
            if let Some(params) = &style {
                styled.push_str("\u{1b}[");
                styled.push_str(params);
                styled.push('m');
            }
            active = style;
        }
        styled.push(symbol);
        bare.push(symbol);
    }
    if active.is_some() {
        styled.push_str(SGR_RESET);
    }
    (styled, bare)
}

fn style_for(visual: &Visual, mode: ColorMode) -> Option<String> {
    let fg = visual.fg.and_then(|color| mode.sgr(color, false));
    let bg = visual.bg.and_then(|color| mode.sgr(color, true));
    match (fg, bg) {
        (None, None) => None,
        (Some(fg), None) => Some(fg),
        (None, Some(bg)) => Some(bg),
        (Some(fg), Some(bg)) => Some(format!("{fg};{bg}")),
    }
}
