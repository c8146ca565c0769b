use glam::{
  Mat4,
  Vec3,
  Vec4,
};

use crate::scene::matrix::HalaMatrix;

/// A perspective camera in the scene.
#[derive(Debug, Clone)]
pub struct HalaCamera {
  /// The field of view in degrees.
  pub fov: f32,
  pub near: f32,
  pub far: f32,
  pub matrix: HalaMatrix,
}

/// The default implementation of the camera.
impl Default for HalaCamera {
  fn default() -> Self {
    Self {
      fov: 60.0,
      near: 0.1,
      far: 100.0,
      matrix: HalaMatrix::IDENTITY,
    }
  }
}

impl HalaCamera {

  /// Create a camera placed by the node transform and oriented by the look-at vectors.
  /// param fov: The field of view in degrees.
  /// param near: The near clip plane.
  /// param far: The far clip plane.
  /// param world_transform: The accumulated transform of the camera node.
  /// param look_at: The look-at direction.
  /// param up: The up direction.
  /// param position: The position.
  /// return: The camera.
  pub fn new(
    fov: f32,
    near: f32,
    far: f32,
    world_transform: &Mat4,
    look_at: Vec3,
    up: Vec3,
    position: Vec3,
  ) -> Self {
    let mut camera = Self {
      fov,
      near,
      far,
      matrix: HalaMatrix::snapped(world_transform),
    };
    camera.mul_look_at(look_at, up, position);
    camera
  }

  /// Multiply the look-at transform into the camera matrix.
  /// param look_at: The look-at direction.
  /// param up: The up direction.
  /// param position: The position.
  pub fn mul_look_at(&mut self, look_at: Vec3, up: Vec3, position: Vec3) {
    let forward = look_at.normalize_or_zero();
    let right = forward.cross(up).normalize_or_zero();
    let up = right.cross(forward).normalize_or_zero();

    let look_mtx = Mat4::from_cols(
      Vec4::new(right.x, up.x, -forward.x, 0.0),
      Vec4::new(right.y, up.y, -forward.y, 0.0),
      Vec4::new(right.z, up.z, -forward.z, 0.0),
      position.extend(1.0),
    );
    self.matrix = HalaMatrix::from(self.matrix.to_mat4() * look_mtx);
  }
}
