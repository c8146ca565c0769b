use glam::Mat4;

/// The tolerance used to absorb importer floating point noise.
pub const EPSILON: f32 = 1e-4;

/// Snap the value to the nearest integer if it is within EPSILON of it.
/// param value: The value.
/// return: The snapped value.
pub fn snap(value: f32) -> f32 {
  let rounded = value.round();
  if (value - rounded).abs() < EPSILON {
    rounded
  } else {
    value
  }
}

/// A 4x4 column-major matrix, stored the way it is written out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaMatrix {
  pub data: [f32; 16],
}

/// The default implementation of the matrix.
impl Default for HalaMatrix {
  fn default() -> Self {
    Self::IDENTITY
  }
}

impl From<Mat4> for HalaMatrix {
  fn from(mtx: Mat4) -> Self {
    Self {
      data: mtx.to_cols_array(),
    }
  }
}

/// The implementation of the matrix.
impl HalaMatrix {
  pub const IDENTITY: Self = Self {
    data: [
      1.0, 0.0, 0.0, 0.0,
      0.0, 1.0, 0.0, 0.0,
      0.0, 0.0, 1.0, 0.0,
      0.0, 0.0, 0.0, 1.0,
    ],
  };

  /// Create a matrix from a glam matrix, snapping every element.
  /// param mtx: The column-major source matrix.
  /// return: The snapped matrix.
  pub fn snapped(mtx: &Mat4) -> Self {
    let mut data = mtx.to_cols_array();
    for value in data.iter_mut() {
      *value = snap(*value);
    }
    Self { data }
  }

  /// Convert the matrix to a glam matrix.
  /// return: The glam matrix.
  pub fn to_mat4(&self) -> Mat4 {
    Mat4::from_cols_array(&self.data)
  }

  /// Check if the matrix is the identity matrix.
  /// return: True if the summed absolute difference to identity is negligible.
  pub fn is_identity(&self) -> bool {
    let delta: f32 = self.data.iter()
      .zip(Self::IDENTITY.data.iter())
      .map(|(value, identity)| (value - identity).abs())
      .sum();
    delta < 1e-6
  }
}
