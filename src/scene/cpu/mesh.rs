use glam::{
  Vec2,
  Vec3,
  Vec4,
};

/// The joint value which terminates the influence list of a vertex.
pub const JOINT_SENTINEL: f32 = -1.0;

/// The maximum number of joint influences per vertex.
pub const MAX_WEIGHTS_PER_VERTEX: usize = 4;

/// A morph target of the mesh.
#[derive(Debug, Clone, Default)]
pub struct HalaBlendShape {
  pub name: String,
  pub positions: Vec<Vec3>,
  pub normals: Vec<Vec3>,
  pub tangents: Vec<Vec3>,
  pub weight: f32,
}

/// The texture dimensions needed to store all blend shape deltas of a mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HalaBlendShapeHeader {
  pub width: u16,
  pub height: u16,
}

impl HalaBlendShapeHeader {
  /// Calculate the power of two dimensions that hold the elements plus one.
  /// param num_of_elements: The number of attribute elements of all blend shapes.
  /// return: The header.
  pub fn with_elements(num_of_elements: u32) -> Self {
    let num_of_bits = u32::BITS - (num_of_elements + 1).leading_zeros();
    let pow_width = num_of_bits / 2;
    let pow_height = num_of_bits - pow_width;
    Self {
      width: 1u16 << pow_width,
      height: 1u16 << pow_height,
    }
  }
}

/// A mesh is a collection of vertex attributes and triangle indices.
#[derive(Debug, Clone, Default)]
pub struct HalaMesh {
  pub positions: Vec<Vec3>,
  pub normals: Vec<Vec3>,
  pub tangents: Vec<Vec3>,
  pub tex_coords: Vec<Vec2>,
  pub indices: Vec<u16>,

  /// Joint indices, stored as floats. Scene node indices until rebased onto the skeleton.
  pub joints0: Vec<Vec4>,
  pub weights0: Vec<Vec4>,
  /// The skeleton root node.
  pub skeleton: Option<u32>,

  pub blend_shape_header: HalaBlendShapeHeader,
  pub blend_shapes: Vec<HalaBlendShape>,
  pub morph_method: u32,
}

impl HalaMesh {
  pub fn is_skinned(&self) -> bool {
    self.skeleton.is_some()
  }

  pub fn num_of_vertices(&self) -> usize {
    self.positions.len()
  }
}
