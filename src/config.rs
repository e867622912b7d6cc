use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::canvas::{Canvas, IngestOptions};
use crate::color::ColorMode;
use crate::error::EngineError;
use crate::geometry::Anchor;

/// Terminal and canvas settings shared by every effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerminalConfig {
    /// Canvas width in columns; 0 detects the terminal width.
    #[serde(default)]
    pub width: usize,
    /// Canvas height in rows; 0 uses the input's line count, capped to the
    /// terminal height.
    #[serde(default)]
    pub height: usize,
    #[serde(default)]
    pub canvas_anchor: Anchor,
    #[serde(default)]
    pub text_anchor: Anchor,
    /// Target frames per second; 0 runs unpaced.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default = "default_tab_width")]
    pub tab_width: usize,
    #[serde(default)]
    pub wrap_text: bool,
    #[serde(default)]
    pub xterm_colors: bool,
    #[serde(default)]
    pub no_color: bool,
    #[serde(default = "default_end_symbol")]
    pub end_symbol: String,
    /// Play on the terminal's alternate screen instead of inline.
    #[serde(default)]
    pub alternate_screen: bool,
}

fn default_frame_rate() -> u32 {
    60
}

fn default_tab_width() -> usize {
    4
}

fn default_end_symbol() -> String {
    "\n".to_owned()
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            canvas_anchor: Anchor::Center,
            text_anchor: Anchor::Center,
            frame_rate: default_frame_rate(),
            tab_width: default_tab_width(),
            wrap_text: false,
            xterm_colors: false,
            no_color: false,
            end_symbol: default_end_symbol(),
            alternate_screen: false,
        }
    }
}

/// CLI values layered over a loaded configuration. `None` keeps the file value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub canvas_anchor: Option<Anchor>,
    pub text_anchor: Option<Anchor>,
    pub frame_rate: Option<u32>,
    pub tab_width: Option<usize>,
    pub wrap_text: Option<bool>,
    pub xterm_colors: Option<bool>,
    pub no_color: Option<bool>,
    pub end_symbol: Option<String>,
    pub alternate_screen: Option<bool>,
}

impl TerminalConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_yaml(&contents)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(contents).map_err(|error| {
            let location = error
                .location()
                .map(|location| format!("line {}, column {}", location.line(), location.column()))
                .unwrap_or_else(|| "unknown location".to_owned());
            anyhow!("failed to parse yaml at {}: {}", location, error)
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) -> Result<()> {
        let ConfigOverrides {
            width,
            height,
            canvas_anchor,
            text_anchor,
            frame_rate,
            tab_width,
            wrap_text,
            xterm_colors,
            no_color,
            end_symbol,
            alternate_screen,
        } = overrides;

        if let Some(width) = width {
            self.width = width;
        }
        if let Some(height) = height {
            self.height = height;
        }
        if let Some(anchor) = canvas_anchor {
            self.canvas_anchor = anchor;
        }
        if let Some(anchor) = text_anchor {
            self.text_anchor = anchor;
        }
        if let Some(frame_rate) = frame_rate {
            self.frame_rate = frame_rate;
        }
        if let Some(tab_width) = tab_width {
            self.tab_width = tab_width;
        }
        if let Some(wrap) = wrap_text {
            self.wrap_text = wrap;
        }
        if let Some(xterm) = xterm_colors {
            self.xterm_colors = xterm;
        }
        if let Some(no_color) = no_color {
            self.no_color = no_color;
        }
        if let Some(end_symbol) = end_symbol {
            self.end_symbol = end_symbol;
        }
        if let Some(alternate) = alternate_screen {
            self.alternate_screen = alternate;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.tab_width == 0 {
            return Err(EngineError::InvalidTabWidth(self.tab_width).into());
        }
        if self.frame_rate > 1_000 {
            bail!("frame_rate must be <= 1000, got {}", self.frame_rate);
        }
        Ok(())
    }

    pub fn color_mode(&self) -> ColorMode {
        ColorMode::from_flags(self.xterm_colors, self.no_color)
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            tab_width: self.tab_width,
            wrap: self.wrap_text,
            anchor: self.text_anchor,
        }
    }

    /// Builds the canvas, filling zero dimensions from `input` and the
    /// detected `terminal` size (columns, rows).
    pub fn canvas(&self, input: &str, terminal: Option<(usize, usize)>) -> Result<Canvas> {
        let (terminal_width, terminal_height) = terminal.unwrap_or((80, 24));
        let width = if self.width == 0 {
            terminal_width
        } else {
            self.width
        };
        let height = if self.height == 0 {
            let lines = input.lines().count().max(1);
            if self.wrap_text {
                let wrapped = input
                    .lines()
                    .map(|line| {
                        let length = line.replace('\t', &" ".repeat(self.tab_width)).chars().count();
                        length.max(1).div_ceil(width.max(1))
                    })
                    .sum::<usize>();
                wrapped.max(1).min(terminal_height.max(1))
            } else {
                lines.min(terminal_height.max(1))
            }
        } else {
            self.height
        };
        Canvas::new(width, height).map_err(Into::into)
    }
}
