use crate::scene::matrix::HalaMatrix;

/// The mesh index of a node without a mesh.
pub const INVALID_MESH: u32 = u32::MAX;

/// A node is a transform in the hierarchy, optionally carrying a mesh or a joint.
#[derive(Debug, Clone)]
pub struct HalaNode {
  /// The position of the node in the scene node list.
  pub index: u32,
  pub name: String,
  pub parent: Option<u32>,
  pub children: Vec<u32>,
  pub transform: HalaMatrix,

  pub mesh_index: u32,
  pub material_index: u32,
  pub is_blend_enabled: bool,

  /// The root of the skeleton this node is part of.
  pub skeleton: Option<u32>,
  /// Only joints have an inverse bind pose.
  pub inverse_bind_pose: Option<HalaMatrix>,
}

/// The default implementation of the node.
impl Default for HalaNode {
  fn default() -> Self {
    Self {
      index: u32::MAX,
      name: String::new(),
      parent: None,
      children: Vec::new(),
      transform: HalaMatrix::IDENTITY,
      mesh_index: INVALID_MESH,
      material_index: 0,
      is_blend_enabled: false,
      skeleton: None,
      inverse_bind_pose: None,
    }
  }
}

/// The implementation of the node.
impl HalaNode {
  /// Create a new node.
  /// param name: The name of the node.
  /// param parent: The parent node index.
  /// param transform: The local transform.
  /// return: The node.
  pub fn new(name: &str, parent: Option<u32>, transform: HalaMatrix) -> Self {
    Self {
      name: name.to_owned(),
      parent,
      transform,
      ..Default::default()
    }
  }

  /// Replace ASCII whitespace, vertical tab included, and colons in the name with underscores.
  /// param name: The name.
  /// return: The name which is valid in the output document.
  pub fn make_valid_name(name: &str) -> String {
    name.chars()
      .map(|c| if c.is_ascii_whitespace() || c == '\x0B' || c == ':' { '_' } else { c })
      .collect()
  }

  pub fn has_mesh(&self) -> bool {
    self.mesh_index != INVALID_MESH
  }

  pub fn is_joint(&self) -> bool {
    self.inverse_bind_pose.is_some()
  }

  /// Check if the node is the root of its own skeleton.
  /// return: True if the skeleton reference is the node itself.
  pub fn is_skeleton_root(&self) -> bool {
    self.skeleton == Some(self.index)
  }
}
