//! Action of the car racing environment.
use serde::{Deserialize, Serialize};

/// `[steering, gas, brake]`, steering in `[-1, 1]`, gas and brake in `[0, 1]`.
///
/// Serialized as a plain array of three numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarAction(pub [f32; 3]);

impl CarAction {
    /// Constructs an action.
    pub fn new(steering: f32, gas: f32, brake: f32) -> Self {
        Self([steering, gas, brake])
    }

    /// Steering, negative to the left.
    pub fn steering(&self) -> f32 {
        self.0[0]
    }

    /// Gas.
    pub fn gas(&self) -> f32 {
        self.0[1]
    }

    /// Brake.
    pub fn brake(&self) -> f32 {
        self.0[2]
    }
}

impl From<[f32; 3]> for CarAction {
    fn from(v: [f32; 3]) -> Self {
        Self(v)
    }
}
