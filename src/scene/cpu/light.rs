use glam::Vec3;

use crate::scene::matrix::HalaMatrix;

/// A light source in the scene.
#[derive(Debug, Clone)]
pub struct HalaLight {
  pub matrix: HalaMatrix,
  pub diffuse_color: Vec3,
}
