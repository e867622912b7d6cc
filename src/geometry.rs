use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A cell position. Columns count from the left edge, rows from the bottom
/// edge; both start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub column: i32,
    pub row: i32,
}

impl Coord {
    pub const fn new(column: i32, row: i32) -> Self {
        Self { column, row }
    }

    pub fn offset(self, columns: i32, rows: i32) -> Self {
        Self {
            column: self.column + columns,
            row: self.row + rows,
        }
    }

    pub fn distance(self, other: Coord) -> f64 {
        let dc = f64::from(other.column - self.column);
        let dr = f64::from(other.row - self.row);
        (dc * dc + dr * dr).sqrt()
    }

    /// Distance with the row difference doubled, closer to what the eye sees
    /// on a grid of cells twice as tall as they are wide.
    pub fn distance_weighted(self, other: Coord) -> f64 {
        let dc = f64::from(other.column - self.column);
        let dr = f64::from(other.row - self.row) * 2.0;
        (dc * dc + dr * dr).sqrt()
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// Continuous point used while evaluating curves; rounded back to a [`Coord`]
/// for drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn round(self) -> Coord {
        Coord {
            column: self.x.round() as i32,
            row: self.y.round() as i32,
        }
    }

    fn distance(self, other: Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

impl From<Coord> for Point {
    fn from(coord: Coord) -> Self {
        Self {
            x: f64::from(coord.column),
            y: f64::from(coord.row),
        }
    }
}

pub fn lerp(start: Coord, end: Coord, t: f64) -> Point {
    let a = Point::from(start);
    let b = Point::from(end);
    Point {
        x: a.x + (b.x - a.x) * t,
        y: a.y + (b.y - a.y) * t,
    }
}

pub fn quadratic_bezier(start: Coord, control: Coord, end: Coord, t: f64) -> Point {
    let (p0, p1, p2) = (Point::from(start), Point::from(control), Point::from(end));
    let u = 1.0 - t;
    Point {
        x: u * u * p0.x + 2.0 * u * t * p1.x + t * t * p2.x,
        y: u * u * p0.y + 2.0 * u * t * p1.y + t * t * p2.y,
    }
}

pub fn cubic_bezier(start: Coord, c1: Coord, c2: Coord, end: Coord, t: f64) -> Point {
    let (p0, p1, p2, p3) = (
        Point::from(start),
        Point::from(c1),
        Point::from(c2),
        Point::from(end),
    );
    let u = 1.0 - t;
    let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
    Point {
        x: a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        y: a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    }
}

/// Polyline length of a sampled curve. Straight segments should use
/// [`Coord::distance`] instead.
pub fn curve_length<F>(samples: usize, curve: F) -> f64
where
    F: Fn(f64) -> Point,
{
    let samples = samples.max(1);
    let mut previous = curve(0.0);
    let mut total = 0.0;
    for step in 1..=samples {
        let point = curve(step as f64 / samples as f64);
        total += previous.distance(point);
        previous = point;
    }
    total
}

/// Every cell within `radius` of `center` by [`Coord::distance_weighted`],
/// so the disc spans `radius` columns but only `radius / 2` rows each way.
/// Cells off the canvas are included.
pub fn coords_in_circle(center: Coord, radius: usize) -> Vec<Coord> {
    let reach = i32::try_from(radius).unwrap_or(i32::MAX / 2);
    let limit = radius as f64;
    let mut coords = Vec::new();
    for rows in -(reach / 2)..=(reach / 2) {
        for columns in -reach..=reach {
            let coord = center.offset(columns, rows);
            if center.distance_weighted(coord) <= limit {
                coords.push(coord);
            }
        }
    }
    coords
}

/// Nine-way placement used for the canvas inside the terminal and for the text
/// block inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Anchor {
    #[serde(rename = "n")]
    North,
    #[serde(rename = "ne")]
    NorthEast,
    #[serde(rename = "e")]
    East,
    #[serde(rename = "se")]
    SouthEast,
    #[serde(rename = "s")]
    South,
    #[serde(rename = "sw")]
    SouthWest,
    #[serde(rename = "w")]
    West,
    #[serde(rename = "nw")]
    NorthWest,
    #[default]
    #[serde(rename = "c")]
    Center,
}

impl Anchor {
    /// Offset of an `inner` extent placed inside an `outer` extent, measured
    /// from the left / bottom edge. Inner extents larger than outer pin to the
    /// start edge.
    pub fn place(self, inner: (usize, usize), outer: (usize, usize)) -> (usize, usize) {
        let free_x = outer.0.saturating_sub(inner.0);
        let free_y = outer.1.saturating_sub(inner.1);
        let x = match self {
            Self::NorthWest | Self::West | Self::SouthWest => 0,
            Self::North | Self::Center | Self::South => free_x / 2,
            Self::NorthEast | Self::East | Self::SouthEast => free_x,
        };
        let y = match self {
            Self::SouthWest | Self::South | Self::SouthEast => 0,
            Self::West | Self::Center | Self::East => free_y / 2,
            Self::NorthWest | Self::North | Self::NorthEast => free_y,
        };
        (x, y)
    }
}

impl FromStr for Anchor {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "n" => Ok(Self::North),
            "ne" => Ok(Self::NorthEast),
            "e" => Ok(Self::East),
            "se" => Ok(Self::SouthEast),
            "s" => Ok(Self::South),
            "sw" => Ok(Self::SouthWest),
            "w" => Ok(Self::West),
            "nw" => Ok(Self::NorthWest),
            "c" | "center" => Ok(Self::Center),
            other => Err(EngineError::UnknownAnchor(other.to_owned())),
        }
    }
}
