// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Named parameter values for render passes.
//!
//! A [`Parameters`] set is handed to [`crate::images::render_pass::render`] alongside a
//! [`crate::images::program::Program`].  Only the names the program declares are bound;
//! anything else in the set is ignored, so one set can be shared across several programs.
//!
//! ```
//! use wavefield::bindings::parameters::{Parameters, ParameterValue};
//!
//! let parameters = Parameters::new()
//!     .with("damping", 0.995f32)
//!     .with("wind", [0.1f32, 0.0]);
//! assert_eq!(parameters.get("damping"), Some(&ParameterValue::Float(0.995)));
//! assert!(parameters.get("missing").is_none());
//! ```
use crate::bindings::surface::SurfaceHandle;
use crate::pixel_formats::Float4;
use std::collections::HashMap;

/// The type a program declares for one of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Float,
    Vec2,
    Vec4,
    /// A surface sampled by the program.
    Surface,
}

/// A value bound to a program parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec4(Float4),
    Surface(SurfaceHandle),
}

impl ParameterValue {
    pub const fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Float(_) => ParameterKind::Float,
            ParameterValue::Vec2(_) => ParameterKind::Vec2,
            ParameterValue::Vec4(_) => ParameterKind::Vec4,
            ParameterValue::Surface(_) => ParameterKind::Surface,
        }
    }

    /// The value widened to four lanes, as uniform blocks store it.
    ///
    /// Surfaces have no scalar representation and widen to zero.
    pub const fn as_lanes(&self) -> [f32; 4] {
        match self {
            ParameterValue::Float(v) => [*v, 0.0, 0.0, 0.0],
            ParameterValue::Vec2(v) => [v[0], v[1], 0.0, 0.0],
            ParameterValue::Vec4(v) => v.to_array(),
            ParameterValue::Surface(_) => [0.0; 4],
        }
    }
}

impl From<f32> for ParameterValue {
    fn from(v: f32) -> Self {
        ParameterValue::Float(v)
    }
}
impl From<[f32; 2]> for ParameterValue {
    fn from(v: [f32; 2]) -> Self {
        ParameterValue::Vec2(v)
    }
}
impl From<Float4> for ParameterValue {
    fn from(v: Float4) -> Self {
        ParameterValue::Vec4(v)
    }
}
impl From<SurfaceHandle> for ParameterValue {
    fn from(v: SurfaceHandle) -> Self {
        ParameterValue::Surface(v)
    }
}

/// A set of named parameter values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: HashMap<String, ParameterValue>,
}

impl Parameters {
    pub fn new() -> Self {
        Parameters {
            values: HashMap::new(),
        }
    }

    /// Adds or replaces `name`, consuming the set.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Adds or replaces `name`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
