//! Weighted rectangle sums over an integral image.

use crate::{ObjdetectError, Result};

/// Which inclusion-exclusion formula a rectangle needs.
///
/// Rectangles touching the first row or column of the window would read
/// integral cells at index -1; those terms are zero and are dropped instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RectKind {
    /// Zero-area placeholder, always sums to 0.
    None,
    /// Anchored at (0, 0): one lookup.
    TopLeft,
    /// Touches the first row: two lookups.
    Top,
    /// Touches the first column: two lookups.
    Left,
    /// Strictly interior: four lookups.
    Any,
}

impl RectKind {
    pub fn classify(x: i32, y: i32, w: i32, h: i32) -> Self {
        if w == 0 || h == 0 {
            RectKind::None
        } else if x == 0 && y == 0 {
            RectKind::TopLeft
        } else if x == 0 {
            RectKind::Left
        } else if y == 0 {
            RectKind::Top
        } else {
            RectKind::Any
        }
    }
}

/// Flat integral-image offsets of the cells a rectangle reads, valid for one
/// image width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RectOffsets([usize; 4]);

impl RectOffsets {
    pub fn as_array(&self) -> [usize; 4] {
        self.0
    }
}

/// One weighted rectangle of a Haar-like feature, in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HaarRect {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    weight: i32,
    kind: RectKind,
}

impl HaarRect {
    /// Create a rectangle.
    ///
    /// # Errors
    ///
    /// [`ObjdetectError::InvalidCascade`] if any coordinate or extent is
    /// negative.
    pub fn new(x: i32, y: i32, w: i32, h: i32, weight: i32) -> Result<Self> {
        if x < 0 || y < 0 || w < 0 || h < 0 {
            return Err(ObjdetectError::InvalidCascade(format!(
                "rectangle ({x}, {y}, {w}, {h}) has negative geometry"
            )));
        }
        Ok(Self {
            x,
            y,
            w,
            h,
            weight,
            kind: RectKind::classify(x, y, w, h),
        })
    }

    /// The zero-area placeholder used for unused feature slots.
    pub const fn empty() -> Self {
        Self {
            x: 0,
            y: 0,
            w: 0,
            h: 0,
            weight: 0,
            kind: RectKind::None,
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> i32 {
        self.w
    }

    pub fn height(&self) -> i32 {
        self.h
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn kind(&self) -> RectKind {
        self.kind
    }

    /// Whether the rectangle lies inside a `width`×`height` window.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.kind == RectKind::None
            || (self.x as i64 + self.w as i64 <= width as i64
                && self.y as i64 + self.h as i64 <= height as i64)
    }

    /// Offsets of the cells this rectangle reads in an integral image of the
    /// given width. Must be re-derived whenever the width changes.
    pub fn offsets(&self, width: usize) -> RectOffsets {
        let (x, y, w, h) = (
            self.x as usize,
            self.y as usize,
            self.w as usize,
            self.h as usize,
        );
        let at = |col: usize, row: usize| row * width + col;

        match self.kind {
            RectKind::None => RectOffsets::default(),
            RectKind::TopLeft => RectOffsets([at(w - 1, h - 1), 0, 0, 0]),
            RectKind::Top => RectOffsets([at(x + w - 1, h - 1), at(x - 1, h - 1), 0, 0]),
            RectKind::Left => RectOffsets([at(w - 1, y + h - 1), at(w - 1, y - 1), 0, 0]),
            RectKind::Any => RectOffsets([
                at(x - 1, y - 1),
                at(x + w - 1, y + h - 1),
                at(x + w - 1, y - 1),
                at(x - 1, y + h - 1),
            ]),
        }
    }

    /// Weighted pixel sum of the rectangle.
    ///
    /// `offsets` must come from [`HaarRect::offsets`] for the width of
    /// `integral`.
    #[inline]
    pub fn evaluate(&self, offsets: &RectOffsets, integral: &[u32]) -> i64 {
        let [a, b, c, d] = offsets.0;
        let sum = match self.kind {
            RectKind::None => return 0,
            RectKind::TopLeft => integral[a],
            RectKind::Top | RectKind::Left => integral[a].wrapping_sub(integral[b]),
            RectKind::Any => integral[a]
                .wrapping_add(integral[b])
                .wrapping_sub(integral[c])
                .wrapping_sub(integral[d]),
        };
        self.weight as i64 * sum as i64
    }
}

impl HaarRect {
    /// Offsets for evaluating inside a zero-padded integral image of row
    /// stride `stride`, relative to the window's top-left padded cell.
    ///
    /// In the padded table every rectangle is interior, so all non-empty
    /// kinds read the four `Any` cells.
    pub fn embedded_offsets(&self, stride: usize) -> RectOffsets {
        if self.kind == RectKind::None {
            return RectOffsets::default();
        }
        let (x, y, w, h) = (
            self.x as usize,
            self.y as usize,
            self.w as usize,
            self.h as usize,
        );
        let at = |col: usize, row: usize| row * stride + col;
        RectOffsets([at(x, y), at(x + w, y + h), at(x + w, y), at(x, y + h)])
    }

    /// Weighted pixel sum read from a padded integral image, for the window
    /// whose top-left padded cell is at `base`.
    #[inline]
    pub fn evaluate_embedded(&self, offsets: &RectOffsets, integral: &[u32], base: usize) -> i64 {
        if self.kind == RectKind::None {
            return 0;
        }
        let [a, b, c, d] = offsets.0;
        let sum = integral[base + a]
            .wrapping_add(integral[base + b])
            .wrapping_sub(integral[base + c])
            .wrapping_sub(integral[base + d]);
        self.weight as i64 * sum as i64
    }
}

impl Default for HaarRect {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_selection() {
        assert_eq!(RectKind::classify(3, 4, 0, 5), RectKind::None);
        assert_eq!(RectKind::classify(3, 4, 5, 0), RectKind::None);
        assert_eq!(RectKind::classify(0, 0, 2, 2), RectKind::TopLeft);
        assert_eq!(RectKind::classify(0, 3, 2, 2), RectKind::Left);
        assert_eq!(RectKind::classify(3, 0, 2, 2), RectKind::Top);
        assert_eq!(RectKind::classify(1, 1, 2, 2), RectKind::Any);
    }

    #[test]
    fn negative_geometry_is_rejected() {
        assert!(HaarRect::new(-1, 0, 2, 2, 1).is_err());
        assert!(HaarRect::new(0, 0, 2, -2, 1).is_err());
        // negative weights are the norm for Haar features
        assert!(HaarRect::new(0, 0, 2, 2, -3).is_ok());
    }

    #[test]
    fn offsets_follow_width() {
        let r = HaarRect::new(2, 3, 4, 5, 1).unwrap();
        assert_eq!(r.offsets(10).as_array(), [2 * 10 + 1, 7 * 10 + 5, 2 * 10 + 5, 7 * 10 + 1]);
        assert_eq!(r.offsets(20).as_array(), [2 * 20 + 1, 7 * 20 + 5, 2 * 20 + 5, 7 * 20 + 1]);
    }

    #[test]
    fn embedded_offsets_are_interior() {
        let r = HaarRect::new(0, 3, 4, 5, 1).unwrap();
        assert_eq!(r.kind(), RectKind::Left);
        assert_eq!(r.embedded_offsets(10).as_array(), [30, 84, 34, 80]);
        assert_eq!(HaarRect::empty().embedded_offsets(10), RectOffsets::default());
    }

    #[test]
    fn fits_window() {
        let r = HaarRect::new(20, 0, 4, 24, 1).unwrap();
        assert!(r.fits(24, 24));
        assert!(!r.fits(23, 24));
        assert!(HaarRect::new(100, 100, 0, 0, 0).unwrap().fits(24, 24));
    }
}
