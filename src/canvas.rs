use rand::Rng;

use crate::error::EngineError;
use crate::geometry::{Anchor, Coord};
use crate::gradient::Bounds;

/// The drawable area. Coordinates run `1..=width` left to right and
/// `1..=height` bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    width: usize,
    height: usize,
}

/// How input text is laid into a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub tab_width: usize,
    pub wrap: bool,
    pub anchor: Anchor,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            tab_width: 4,
            wrap: false,
            anchor: Anchor::Center,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub symbol: char,
    pub coord: Coord,
}

/// Non-whitespace characters of the input with their final coordinates, plus
/// the bounds of the placed text block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub glyphs: Vec<Glyph>,
    pub bounds: Bounds,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Result<Self, EngineError> {
        if width == 0 || height == 0 || width > i32::MAX as usize || height > i32::MAX as usize {
            return Err(EngineError::InvalidCanvas { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn right(&self) -> i32 {
        self.width as i32
    }

    pub fn top(&self) -> i32 {
        self.height as i32
    }

    pub fn center(&self) -> Coord {
        Coord::new((self.right() + 1) / 2, (self.top() + 1) / 2)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(1, 1, self.right(), self.top())
    }

    pub fn contains(&self, coord: Coord) -> bool {
        (1..=self.right()).contains(&coord.column) && (1..=self.top()).contains(&coord.row)
    }

    pub fn random_coord<R: Rng>(&self, rng: &mut R) -> Coord {
        Coord::new(rng.gen_range(1..=self.right()), rng.gen_range(1..=self.top()))
    }

    /// A random coordinate just outside the canvas on one of its four edges.
    pub fn random_outside_coord<R: Rng>(&self, rng: &mut R) -> Coord {
        match rng.gen_range(0..4) {
            0 => Coord::new(rng.gen_range(1..=self.right()), self.top() + 1),
            1 => Coord::new(self.right() + 1, rng.gen_range(1..=self.top())),
            2 => Coord::new(rng.gen_range(1..=self.right()), 0),
            _ => Coord::new(0, rng.gen_range(1..=self.top())),
        }
    }

    /// Lays `text` out inside the canvas. Tabs expand to `tab_width` spaces,
    /// long lines wrap or truncate at the canvas width and rows past the
    /// canvas height are dropped.
    pub fn ingest(&self, text: &str, options: &IngestOptions) -> Result<TextBlock, EngineError> {
        if options.tab_width == 0 {
            return Err(EngineError::InvalidTabWidth(0));
        }
        let tab = " ".repeat(options.tab_width);
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

        let mut rows: Vec<Vec<char>> = Vec::new();
        for line in normalized.lines() {
            let chars = line.replace('\t', &tab).trim_end().chars().collect::<Vec<_>>();
            if chars.len() <= self.width {
                rows.push(chars);
            } else if options.wrap {
                rows.extend(chars.chunks(self.width).map(<[char]>::to_vec));
            } else {
                rows.push(chars[..self.width].to_vec());
            }
        }
        while rows.last().is_some_and(|row| row.is_empty()) {
            rows.pop();
        }
        rows.truncate(self.height);

        let block_width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let block_height = rows.len();
        let (x, y) = options
            .anchor
            .place((block_width, block_height), (self.width, self.height));

        let mut glyphs = Vec::new();
        for (line_index, row) in rows.iter().enumerate() {
            let row_number = (y + block_height - line_index) as i32;
            for (column_index, symbol) in row.iter().enumerate() {
                if symbol.is_whitespace() {
                    continue;
                }
                glyphs.push(Glyph {
                    symbol: *symbol,
                    coord: Coord::new((x + column_index + 1) as i32, row_number),
                });
            }
        }

        let left = x as i32 + 1;
        let bottom = y as i32 + 1;
        Ok(TextBlock {
            glyphs,
            bounds: Bounds::new(
                left,
                bottom,
                left + block_width.max(1) as i32 - 1,
                bottom + block_height.max(1) as i32 - 1,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{Canvas, IngestOptions};
    use crate::error::EngineError;
    use crate::geometry::{Anchor, Coord};

    fn coords(block: &super::TextBlock) -> Vec<(char, Coord)> {
        block.glyphs.iter().map(|glyph| (glyph.symbol, glyph.coord)).collect()
    }

    #[test]
    fn rejects_empty_canvas() {
        assert_eq!(
            Canvas::new(0, 4),
            Err(EngineError::InvalidCanvas {
                width: 0,
                height: 4
            })
        );
    }

    #[test]
    fn rows_count_from_the_bottom() {
        let canvas = Canvas::new(3, 2).expect("canvas");
        let options = IngestOptions {
            anchor: Anchor::SouthWest,
            ..IngestOptions::default()
        };
        let block = canvas.ingest("ab\nc", &options).expect("ingest");
        assert_eq!(
            coords(&block),
            vec![
                ('a', Coord::new(1, 2)),
                ('b', Coord::new(2, 2)),
                ('c', Coord::new(1, 1)),
            ]
        );
    }

    #[test]
    fn tabs_expand_and_whitespace_is_skipped() {
        let canvas = Canvas::new(10, 1).expect("canvas");
        let options = IngestOptions {
            tab_width: 2,
            anchor: Anchor::West,
            ..IngestOptions::default()
        };
        let block = canvas.ingest("\tx y", &options).expect("ingest");
        assert_eq!(
            coords(&block),
            vec![('x', Coord::new(3, 1)), ('y', Coord::new(5, 1))]
        );
    }

    #[test]
    fn wide_lines_wrap_or_truncate() {
        let canvas = Canvas::new(3, 3).expect("canvas");
        let truncate = IngestOptions {
            anchor: Anchor::NorthWest,
            ..IngestOptions::default()
        };
        let block = canvas.ingest("abcdefg", &truncate).expect("ingest");
        assert_eq!(block.glyphs.len(), 3);

        let wrap = IngestOptions {
            wrap: true,
            ..truncate
        };
        let block = canvas.ingest("abcdefg\nh", &wrap).expect("ingest");
        let symbols = block.glyphs.iter().map(|glyph| glyph.symbol).collect::<String>();
        assert_eq!(symbols, "abcdefg");
        assert_eq!(block.glyphs[6].coord, Coord::new(1, 1));
    }

    #[test]
    fn center_anchor_centers_the_block() {
        let canvas = Canvas::new(7, 3).expect("canvas");
        let block = canvas.ingest("abc", &IngestOptions::default()).expect("ingest");
        assert_eq!(block.glyphs[0].coord, Coord::new(3, 2));
        assert_eq!(block.bounds.left, 3);
        assert_eq!(block.bounds.right, 5);
    }

    #[test]
    fn zero_tab_width_is_a_configuration_error() {
        let canvas = Canvas::new(4, 4).expect("canvas");
        let options = IngestOptions {
            tab_width: 0,
            ..IngestOptions::default()
        };
        assert_eq!(
            canvas.ingest("a", &options),
            Err(EngineError::InvalidTabWidth(0))
        );
    }

    #[test]
    fn random_coords_stay_in_or_just_outside_bounds() {
        let canvas = Canvas::new(5, 4).expect("canvas");
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            assert!(canvas.contains(canvas.random_coord(&mut rng)));
            assert!(!canvas.contains(canvas.random_outside_coord(&mut rng)));
        }
    }
}
