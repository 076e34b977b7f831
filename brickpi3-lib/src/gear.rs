//! Gear train ratios.
//!
//! Start at the gear on the motor axle and follow the train: `drive` meshes
//! the next gear (direction flips, speed scales by the teeth ratio), `connect`
//! puts the next gear on the same axle (same rotation).

/// The last gear of a train, carrying the train's accumulated ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gear {
    teeth: u32,
    factor: f64,
}

impl Gear {
    /// A gear directly on the motor axle.
    pub fn new(teeth: u32) -> Self {
        Self { teeth, factor: 1.0 }
    }

    /// Mesh a gear with `teeth` teeth against this one.
    pub fn drive(self, teeth: u32) -> Self {
        Self {
            teeth,
            factor: self.factor * -(self.teeth as f64 / teeth as f64),
        }
    }

    /// Put a gear with `teeth` teeth on this gear's axle.
    pub fn connect(self, teeth: u32) -> Self {
        Self {
            teeth,
            factor: self.factor,
        }
    }

    pub fn teeth(&self) -> u32 {
        self.teeth
    }

    /// Rotation of this gear per rotation of the motor. Negative means reversed.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Degrees this gear turns when the motor turns `motor_degrees`.
    pub fn output_degrees(&self, motor_degrees: f64) -> f64 {
        motor_degrees * self.factor
    }

    /// Motor degrees (e.g. for `set_motor_position`) that turn this gear by `degrees`.
    pub fn motor_degrees(&self, degrees: f64) -> f64 {
        degrees / self.factor
    }
}
