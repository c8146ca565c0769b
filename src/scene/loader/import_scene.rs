use glam::{
  Mat4,
  Quat,
  Vec3,
};

/// A node of the imported hierarchy.
#[derive(Debug, Clone, Default)]
pub struct HalaImportNode {
  pub name: String,
  /// The column-major local transform.
  pub transform: Mat4,
  /// Indices into the imported mesh list.
  pub meshes: Vec<u32>,
  pub children: Vec<HalaImportNode>,
}

impl HalaImportNode {
  pub fn new(name: &str, transform: Mat4) -> Self {
    Self {
      name: name.to_owned(),
      transform,
      ..Default::default()
    }
  }

  pub fn is_leaf(&self) -> bool {
    self.meshes.is_empty() && self.children.is_empty()
  }
}

/// A texture coordinate set. Only two component sets are exported.
#[derive(Debug, Clone, Default)]
pub struct HalaImportUvSet {
  pub num_of_components: u32,
  pub coords: Vec<Vec3>,
}

/// The influence of a bone on a vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaImportVertexWeight {
  pub vertex: u32,
  pub weight: f32,
}

/// A bone of an imported mesh, named after the node it moves.
#[derive(Debug, Clone, Default)]
pub struct HalaImportBone {
  pub name: String,
  pub offset_matrix: Mat4,
  pub weights: Vec<HalaImportVertexWeight>,
}

/// A morph target with absolute attribute values.
#[derive(Debug, Clone, Default)]
pub struct HalaImportMorphTarget {
  pub name: String,
  pub positions: Vec<Vec3>,
  pub normals: Vec<Vec3>,
  pub tangents: Vec<Vec3>,
}

/// An imported mesh.
#[derive(Debug, Clone, Default)]
pub struct HalaImportMesh {
  pub name: String,
  pub positions: Vec<Vec3>,
  pub normals: Vec<Vec3>,
  pub tangents: Vec<Vec3>,
  pub tex_coords: Option<HalaImportUvSet>,
  pub faces: Vec<Vec<u32>>,
  pub material_index: u32,
  pub bones: Vec<HalaImportBone>,
  pub morph_targets: Vec<HalaImportMorphTarget>,
  pub morph_method: u32,
}

/// The alpha mode of an imported material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HalaImportAlphaMode {
  #[default]
  Opaque,
  Mask,
  Blend,
}

/// An imported material. Only the alpha mode matters to the export.
#[derive(Debug, Clone, Default)]
pub struct HalaImportMaterial {
  pub name: String,
  pub alpha_mode: HalaImportAlphaMode,
}

/// An imported camera, named after its node.
#[derive(Debug, Clone)]
pub struct HalaImportCamera {
  pub name: String,
  /// The horizontal field of view in radians.
  pub horizontal_fov: f32,
  pub clip_plane_near: f32,
  pub clip_plane_far: f32,
  pub look_at: Vec3,
  pub up: Vec3,
  pub position: Vec3,
}

/// An imported light, named after its node.
#[derive(Debug, Clone)]
pub struct HalaImportLight {
  pub name: String,
  pub diffuse_color: Vec3,
}

/// A time stamped value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaImportKey<T> {
  pub time: f64,
  pub value: T,
}

/// The transform keys of one node.
#[derive(Debug, Clone, Default)]
pub struct HalaImportNodeChannel {
  pub node_name: String,
  pub rotation_keys: Vec<HalaImportKey<Quat>>,
  pub position_keys: Vec<HalaImportKey<Vec3>>,
  pub scaling_keys: Vec<HalaImportKey<Vec3>>,
}

/// The morph weight keys of one node; every key holds the weights of all morph targets.
#[derive(Debug, Clone, Default)]
pub struct HalaImportMorphChannel {
  pub name: String,
  pub keys: Vec<HalaImportKey<Vec<f64>>>,
}

/// An imported animation.
#[derive(Debug, Clone, Default)]
pub struct HalaImportAnimation {
  pub name: String,
  /// The duration in ticks.
  pub duration: f64,
  pub ticks_per_second: f64,
  pub channels: Vec<HalaImportNodeChannel>,
  pub morph_channels: Vec<HalaImportMorphChannel>,
}

/// The scene graph produced by an importer.
#[derive(Debug, Clone, Default)]
pub struct HalaImportScene {
  pub root: HalaImportNode,
  pub meshes: Vec<HalaImportMesh>,
  pub materials: Vec<HalaImportMaterial>,
  pub cameras: Vec<HalaImportCamera>,
  pub lights: Vec<HalaImportLight>,
  pub animations: Vec<HalaImportAnimation>,
}

impl HalaImportScene {
  /// Check if a camera has the given name.
  /// param name: The name.
  /// return: True if a camera has the name.
  pub fn is_camera_name(&self, name: &str) -> bool {
    self.cameras.iter().any(|camera| camera.name == name)
  }
}
