// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Radius queries against point fields.

use std::fmt;

use crate::value::{format_number, Point};

/// Unit of a GEO radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceUnit {
    #[default]
    Meters,
    Kilometers,
    Feet,
    Miles,
}

impl DistanceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceUnit::Meters => "m",
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Feet => "ft",
            DistanceUnit::Miles => "mi",
        }
    }
}

/// A circle on the map: origin, radius and unit.
///
/// Defaults to a 1 meter radius around `0,0`.
///
/// ```
/// use schema_engine::search::Circle;
///
/// let circle = Circle::new().origin((-0.1276, 51.5072)).radius(5.0).kilometers();
/// assert_eq!(circle.to_string(), "-0.1276 51.5072 5 km");
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub origin: Point,
    pub radius: f64,
    pub unit: DistanceUnit,
}

impl Default for Circle {
    fn default() -> Self {
        Self {
            origin: Point::new(0.0, 0.0),
            radius: 1.0,
            unit: DistanceUnit::Meters,
        }
    }
}

impl Circle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the origin from a [`Point`] or a `(longitude, latitude)` pair.
    pub fn origin(mut self, origin: impl Into<Point>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn longitude(mut self, longitude: f64) -> Self {
        self.origin.longitude = longitude;
        self
    }

    pub fn latitude(mut self, latitude: f64) -> Self {
        self.origin.latitude = latitude;
        self
    }

    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn meters(mut self) -> Self {
        self.unit = DistanceUnit::Meters;
        self
    }

    pub fn kilometers(mut self) -> Self {
        self.unit = DistanceUnit::Kilometers;
        self
    }

    pub fn feet(mut self) -> Self {
        self.unit = DistanceUnit::Feet;
        self
    }

    pub fn miles(mut self) -> Self {
        self.unit = DistanceUnit::Miles;
        self
    }

    /// Radius must be positive and finite, origin inside the indexable range.
    pub fn is_valid(&self) -> bool {
        self.radius.is_finite() && self.radius > 0.0 && self.origin.is_valid()
    }
}

/// `longitude latitude radius unit`, the body of a GEO clause.
impl fmt::Display for Circle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.origin.longitude,
            self.origin.latitude,
            format_number(self.radius),
            self.unit.as_str()
        )
    }
}
