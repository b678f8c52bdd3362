use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Coord<T>
where
    T: Sized,
{
    pub x: T,
    pub y: T,
}

impl<T> Coord<T>
where
    T: Sized,
{
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl Coord<i32> {
    pub const ZERO: Self = Self { x: 0, y: 0 };
}

impl Coord<u32> {
    pub const ZERO: Self = Self { x: 0, y: 0 };
}

impl<T, U> From<(T, T)> for Coord<U>
where
    T: Into<U>,
{
    fn from(val: (T, T)) -> Self {
        Self {
            x: val.0.into(),
            y: val.1.into(),
        }
    }
}

impl From<Coord<i32>> for Coord<f32> {
    fn from(val: Coord<i32>) -> Self {
        Self {
            x: val.x as _,
            y: val.y as _,
        }
    }
}

impl From<Coord<u32>> for Coord<f32> {
    fn from(val: Coord<u32>) -> Self {
        Self {
            x: val.x as _,
            y: val.y as _,
        }
    }
}

impl From<Coord<u32>> for Coord<i32> {
    fn from(val: Coord<u32>) -> Self {
        Self {
            x: val.x as _,
            y: val.y as _,
        }
    }
}
