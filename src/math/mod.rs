//! Mathematics types and functions, mostly based on
//! [_glam-rs_](https://github.com/bitshifter/glam-rs).
//!
//! Also contains some geometric math types used for cell/pixel layout.

mod coord;
mod rect;

pub use glam::{vec2, Vec2};

use self::{coord::Coord as GenericCoord, rect::Rect as GenericRect};

pub use self::rect::EdgeRect;

/// A coordinate with i32 values (terminal cell or signed pixel coordinates).
pub type Coord = GenericCoord<i32>;

/// A coordinate with f32 values.
pub type CoordF = GenericCoord<f32>;

/// A coordinate with u32 values (pixel dimensions, cell counts).
pub type Extent = GenericCoord<u32>;

/// A pixel-space rectangle: `u32` size, `u32` position.
pub type PixelRect = GenericRect<u32, u32>;

/// A cell-space rectangle: `u32` size (cell span), `i32` position (row/column,
/// which may be negative once scrolled off-screen).
pub type CellRect = GenericRect<u32, i32>;

/// Returns `true` if the given vector is neither infinite nor `NaN`.
#[inline]
pub fn vec2_is_finite(val: Vec2) -> bool {
    let x = val.x.is_finite() as u8;
    let y = val.y.is_finite() as u8;

    x * y == 1
}
