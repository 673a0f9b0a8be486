//! Shared geometry primitives for the settings model.
//!
//! Floating components default to quiet NaN meaning "not set", distinct
//! from zero.

/// Single-precision 3D point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Point3 { x, y, z }
    }

    /// True when every component carries a value.
    pub fn is_set(&self) -> bool {
        !self.x.is_nan() && !self.y.is_nan() && !self.z.is_nan()
    }
}

impl Default for Point3 {
    fn default() -> Self {
        Point3::new(f32::NAN, f32::NAN, f32::NAN)
    }
}

/// Double-precision position used by skeleton transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Position { x, y, z }
    }

    pub fn is_set(&self) -> bool {
        !self.x.is_nan() && !self.y.is_nan() && !self.z.is_nan()
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::new(f64::NAN, f64::NAN, f64::NAN)
    }
}

/// Unit-quaternion rotation used by skeleton transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Rotation {
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Rotation { x, y, z, w }
    }

    pub fn is_set(&self) -> bool {
        !self.x.is_nan() && !self.y.is_nan() && !self.z.is_nan() && !self.w.is_nan()
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_not_set() {
        assert!(!Point3::default().is_set());
        assert!(!Position::default().is_set());
        assert!(!Rotation::default().is_set());
        assert!(Point3::new(0.0, 0.0, 0.0).is_set());
        assert!(Rotation::new(0.0, 0.0, 0.0, 1.0).is_set());
    }

    #[test]
    fn one_missing_component_leaves_the_point_unset() {
        assert!(!Point3::new(1.0, f32::NAN, 3.0).is_set());
        assert!(!Position::new(1.0, 2.0, f64::NAN).is_set());
    }
}
