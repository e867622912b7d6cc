use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::EngineError;
use crate::geometry::Coord;

/// How a gradient is laid across the canvas when mapping coordinates to
/// colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Horizontal,
    #[default]
    Vertical,
    Diagonal,
    Radial,
}

impl FromStr for Direction {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "horizontal" => Ok(Self::Horizontal),
            "vertical" => Ok(Self::Vertical),
            "diagonal" => Ok(Self::Diagonal),
            "radial" | "center" => Ok(Self::Radial),
            other => Err(EngineError::UnknownDirection(other.to_owned())),
        }
    }
}

/// Inclusive coordinate bounds a gradient spans, usually the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
    pub top: i32,
}

impl Bounds {
    pub fn new(left: i32, bottom: i32, right: i32, top: i32) -> Self {
        Self {
            left,
            bottom,
            right: right.max(left),
            top: top.max(bottom),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    stops: Vec<Color>,
    spectrum: Vec<Color>,
}

impl Gradient {
    /// Builds the color spectrum. `steps` holds one count per stop pair; when
    /// shorter than the number of pairs its last count is reused. With a
    /// single stop the spectrum is `steps[0]` copies of it.
    pub fn new(stops: &[Color], steps: &[u32]) -> Result<Self, EngineError> {
        if stops.is_empty() {
            return Err(EngineError::EmptyGradient);
        }
        if steps.is_empty() || steps.contains(&0) {
            return Err(EngineError::ZeroGradientSteps);
        }

        let spectrum = if stops.len() == 1 {
            vec![stops[0]; steps[0] as usize]
        } else {
            let mut spectrum = Vec::new();
            for (pair_index, pair) in stops.windows(2).enumerate() {
                let count = steps[pair_index.min(steps.len() - 1)];
                let (start, end) = (pair[0].to_rgb(), pair[1].to_rgb());
                spectrum.push(pair[0]);
                for step in 1..count {
                    spectrum.push(Color::Rgb(start.lerp(end, f64::from(step) / f64::from(count))));
                }
            }
            spectrum.push(stops[stops.len() - 1]);
            spectrum
        };

        Ok(Self {
            stops: stops.to_vec(),
            spectrum,
        })
    }

    pub fn uniform(stops: &[Color], steps: u32) -> Result<Self, EngineError> {
        Self::new(stops, &[steps])
    }

    pub fn stops(&self) -> &[Color] {
        &self.stops
    }

    pub fn colors(&self) -> &[Color] {
        &self.spectrum
    }

    pub fn len(&self) -> usize {
        self.spectrum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectrum.is_empty()
    }

    pub fn first(&self) -> Color {
        self.spectrum[0]
    }

    pub fn last(&self) -> Color {
        self.spectrum[self.spectrum.len() - 1]
    }

    pub fn color_at_fraction(&self, fraction: f64) -> Color {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let index = (fraction * (self.spectrum.len() - 1) as f64).round() as usize;
        self.spectrum[index.min(self.spectrum.len() - 1)]
    }

    pub fn color_at(&self, coord: Coord, bounds: Bounds, direction: Direction) -> Color {
        self.color_at_fraction(direction_fraction(coord, bounds, direction))
    }

    pub fn coordinate_map<I>(
        &self,
        coords: I,
        bounds: Bounds,
        direction: Direction,
    ) -> HashMap<Coord, Color>
    where
        I: IntoIterator<Item = Coord>,
    {
        coords
            .into_iter()
            .map(|coord| (coord, self.color_at(coord, bounds, direction)))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Gradient {
    type Item = &'a Color;
    type IntoIter = std::slice::Iter<'a, Color>;

    fn into_iter(self) -> Self::IntoIter {
        self.spectrum.iter()
    }
}

/// Position of `coord` along `direction`, 0 at the gradient's start edge
/// (left, bottom, bottom-left corner or center) and 1 at its far edge.
pub fn direction_fraction(coord: Coord, bounds: Bounds, direction: Direction) -> f64 {
    let span = |value: i32, start: i32, end: i32| {
        if end == start {
            0.0
        } else {
            (f64::from(value - start) / f64::from(end - start)).clamp(0.0, 1.0)
        }
    };
    let horizontal = span(coord.column, bounds.left, bounds.right);
    let vertical = span(coord.row, bounds.bottom, bounds.top);

    match direction {
        Direction::Horizontal => horizontal,
        Direction::Vertical => vertical,
        Direction::Diagonal => (horizontal + vertical) / 2.0,
        Direction::Radial => {
            let center_x = f64::from(bounds.left + bounds.right) / 2.0;
            let center_y = f64::from(bounds.bottom + bounds.top) / 2.0;
            let dx = f64::from(coord.column) - center_x;
            let dy = (f64::from(coord.row) - center_y) * 2.0;
            let max_x = f64::from(bounds.right) - center_x;
            let max_y = (f64::from(bounds.top) - center_y) * 2.0;
            let max = (max_x * max_x + max_y * max_y).sqrt();
            if max == 0.0 {
                0.0
            } else {
                ((dx * dx + dy * dy).sqrt() / max).clamp(0.0, 1.0)
            }
        }
    }
}
