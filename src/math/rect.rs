use super::GenericCoord;

/// A rectangle expressed as a position plus a size, generic over both
/// component types so the same shape serves pixel-space crop rects (`u32`
/// dims, `u32` pos) and cell-space placement spans (`u32` dims, `i32` pos).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Rect<D, P>
where
    D: Copy,
    P: Copy,
{
    pub dims: GenericCoord<D>,
    pub pos: GenericCoord<P>,
}

impl<D, P> Rect<D, P>
where
    D: Copy,
    P: Copy,
{
    pub fn new(x: P, y: P, width: D, height: D) -> Self {
        Self {
            dims: GenericCoord {
                x: width,
                y: height,
            },
            pos: GenericCoord { x, y },
        }
    }
}

/// A rectangle expressed as its four edges in normalized device coordinates
/// (or normalized `[0, 1]` texture space), mirroring the original's
/// `ImageRect` struct rather than this crate's dims/pos convention — the
/// compositor and the source-rect math both want edges, not size+origin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EdgeRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl EdgeRect {
    pub const ZERO: Self = Self {
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
    };

    /// Returns `true` if `[bottom, top]` has any overlap with `[other.bottom,
    /// other.top]`. Both rects use the convention `top >= bottom` (screen
    /// space with +y up), matching the original's vertical culling test.
    pub fn vertically_overlaps(&self, screen_bottom: f32, screen_top: f32) -> bool {
        !(self.top <= screen_bottom || self.bottom >= screen_top)
    }
}
