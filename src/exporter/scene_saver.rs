use std::collections::{
  BTreeMap,
  BTreeSet,
};
use std::fs::File;
use std::io::{
  BufWriter,
  Write,
};
use std::path::Path;

use glam::{
  Vec2,
  Vec3,
  Vec4,
};

use crate::error::HalaExporterError;
use crate::scene::matrix::{
  EPSILON,
  HalaMatrix,
};
use crate::scene::cpu::{
  HalaScene,
  node::HalaNode,
  mesh::HalaMesh,
  animation::{HalaAnimation, HalaKeyFrame},
};
use super::json_writer::HalaJsonWriter;
use super::options::HalaExportOptions;
use super::recorder::{
  HalaAnimationRecorder,
  HalaFileRecorder,
  HalaMapRecorder,
};

const BLEND_SHAPE_VERSION: &str = "2.0";

const DEFAULT_CAMERA_MATRIX: [f64; 16] = [
  1.0, 0.0, 0.0, 0.0,
  0.0, 1.0, 0.0, 0.0,
  0.0, 0.0, 1.0, 0.0,
  0.0, 0.0, 3.5, 1.0,
];

/// The vertex attributes present in a mesh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HalaMeshAttributeFlags(u32);
impl HalaMeshAttributeFlags {
  pub const INDICES: Self = Self(1);
  pub const POSITIONS: Self = Self(1 << 1);
  pub const NORMALS: Self = Self(1 << 2);
  pub const TEXTURES: Self = Self(1 << 3);
  pub const TANGENTS: Self = Self(1 << 4);
  // 1 << 5 was bitangents.
  pub const JOINTS0: Self = Self(1 << 6);
  pub const WEIGHTS0: Self = Self(1 << 7);

  /// Get the attributes of the mesh.
  /// param mesh: The mesh.
  /// return: The flags.
  pub fn from_mesh(mesh: &HalaMesh) -> Self {
    let mut flags = Self::default();
    let attributes = [
      (!mesh.indices.is_empty(), Self::INDICES),
      (!mesh.positions.is_empty(), Self::POSITIONS),
      (!mesh.normals.is_empty(), Self::NORMALS),
      (!mesh.tex_coords.is_empty(), Self::TEXTURES),
      (!mesh.tangents.is_empty(), Self::TANGENTS),
      // Joints and weights are only written with their skeleton.
      (mesh.is_skinned(), Self::JOINTS0),
      (mesh.is_skinned(), Self::WEIGHTS0),
    ];
    for (present, flag) in attributes {
      if present {
        flags |= flag;
      }
    }
    flags
  }

  pub fn bits(&self) -> u32 {
    self.0
  }

  pub fn contains(&self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }
}

impl std::ops::BitOr for HalaMeshAttributeFlags {
  type Output = Self;
  fn bitor(self, rhs: Self) -> Self {
    Self(self.0 | rhs.0)
  }
}

impl std::ops::BitOrAssign for HalaMeshAttributeFlags {
  fn bitor_assign(&mut self, rhs: Self) {
    self.0 |= rhs.0;
  }
}

fn u16s_to_bytes(values: &[u16]) -> Vec<u8> {
  let mut bytes = Vec::with_capacity(values.len() * 2);
  for value in values.iter() {
    bytes.extend_from_slice(&value.to_le_bytes());
  }
  bytes
}

fn floats_to_bytes<I: IntoIterator<Item = f32>>(values: I) -> Vec<u8> {
  let mut bytes = Vec::new();
  for value in values {
    bytes.extend_from_slice(&value.to_le_bytes());
  }
  bytes
}

fn vec2s_to_bytes(values: &[Vec2]) -> Vec<u8> {
  floats_to_bytes(values.iter().flat_map(|v| v.to_array()))
}

fn vec3s_to_bytes(values: &[Vec3]) -> Vec<u8> {
  floats_to_bytes(values.iter().flat_map(|v| v.to_array()))
}

fn vec4s_to_bytes(values: &[Vec4]) -> Vec<u8> {
  floats_to_bytes(values.iter().flat_map(|v| v.to_array()))
}

/// Pack position deltas into [0, 1]: 0.5 is no displacement, 0 and 1 the largest one.
/// param deltas: The position deltas of every blend shape.
/// return: The scaled deltas and the factor restoring the original scale.
pub fn normalize_position_deltas(deltas: &[Vec<Vec3>]) -> (Vec<Vec<Vec3>>, f32) {
  let max_distance_sq = deltas.iter()
    .flatten()
    .map(|delta| delta.length_squared())
    .fold(0.0f32, f32::max);
  let normalize_factor = if max_distance_sq.abs() < EPSILON {
    1.0
  } else {
    0.5 / max_distance_sq.sqrt()
  };

  let normalized = deltas.iter()
    .map(|deltas| deltas.iter()
      .map(|delta| (*delta * normalize_factor + Vec3::splat(0.5)).clamp(Vec3::ZERO, Vec3::ONE))
      .collect())
    .collect();
  (normalized, 1.0 / normalize_factor)
}

/// Move direction deltas from [-2, 2] into [-0.5, 1.5] centered on 0.5.
fn offset_direction_deltas(base: &[Vec3], target: &[Vec3]) -> Vec<Vec3> {
  base.iter()
    .zip(target.iter())
    .map(|(base, target)| (*target - *base) * 0.5 + Vec3::splat(0.5))
    .collect()
}

/// Writes a scene as a DLI document and its binary buffers.
pub struct HalaSceneSaver;

/// The implementation of the scene saver.
impl HalaSceneSaver {
  /// Save the scene to a document file and a binary file.
  /// Binary animations go to files next to the binary file.
  /// param scene: The scene.
  /// param dli_path: The path of the document.
  /// param bin_path: The path of the binary file.
  /// param options: The export options.
  /// return: The result.
  pub fn save<P: AsRef<Path>, Q: AsRef<Path>>(
    scene: &HalaScene,
    dli_path: P,
    bin_path: Q,
    options: &HalaExportOptions,
  ) -> Result<(), HalaExporterError> {
    let dli_path = dli_path.as_ref();
    let bin_path = bin_path.as_ref();
    let dli_file = File::create(dli_path)
      .map_err(|err| HalaExporterError::new(&format!("Create file \"{:?}\" failed.", dli_path), Some(Box::new(err))))?;
    let bin_file = File::create(bin_path)
      .map_err(|err| HalaExporterError::new(&format!("Create file \"{:?}\" failed.", bin_path), Some(Box::new(err))))?;
    let mut dli = BufWriter::new(dli_file);
    let mut bin = BufWriter::new(bin_file);

    Self::convert(scene, &bin_path.to_string_lossy(), &mut dli, &mut bin, options, None)?;

    dli.flush()?;
    bin.flush()?;
    log::debug!("Saved scene to \"{:?}\" and \"{:?}\".", dli_path, bin_path);
    Ok(())
  }

  /// Write the scene as a document and a binary stream.
  /// param scene: The scene.
  /// param bin_file_name: The path of the binary file. Meshes reference its file name; binary
  /// animation files go to its directory unless animation_contents is given.
  /// param dli: The document sink.
  /// param bin: The binary sink.
  /// param options: The export options.
  /// param animation_contents: The map receiving the binary animation streams instead of files.
  /// return: The result.
  pub fn convert<D: Write, B: Write>(
    scene: &HalaScene,
    bin_file_name: &str,
    dli: &mut D,
    bin: &mut B,
    options: &HalaExportOptions,
    animation_contents: Option<&mut BTreeMap<String, Vec<u8>>>,
  ) -> Result<(), HalaExporterError> {
    // The binary file sits next to the document, so only its file name is referenced.
    let (out_dir, bin_file_name) = match bin_file_name.rfind(|c: char| c == '/' || c == '\\') {
      Some(pos) => bin_file_name.split_at(pos + 1),
      None => ("", bin_file_name),
    };

    let mut writer = HalaJsonWriter::new(dli, &options.indentation);
    writer.write_object(None, false)?;

    writer.write_object(Some("asset"), true)?;
    writer.write_value(Some("version"), "1.0")?;
    writer.close_scope()?;

    writer.write_value(Some("scene"), 0)?;

    writer.write_array(Some("scenes"), true)?;
    writer.write_object(None, true)?;
    writer.write_array(Some("nodes"), true)?;
    writer.write_value(None, 0)?;
    writer.close_scope()?;
    writer.close_scope()?;
    writer.close_scope()?;

    writer.write_array(Some("nodes"), false)?;
    Self::save_nodes(scene, &mut writer, options.save_materials)?;
    writer.close_scope()?;

    writer.write_array(Some("meshes"), false)?;
    Self::save_meshes(scene, &mut writer, bin, bin_file_name)?;
    writer.close_scope()?;

    Self::save_skeletons(scene, &mut writer)?;

    writer.write_array(Some("cameras"), false)?;
    Self::save_cameras(scene, &mut writer)?;
    writer.close_scope()?;

    writer.write_array(Some("lights"), false)?;
    Self::save_lights(scene, &mut writer)?;
    writer.close_scope()?;

    writer.write_array(Some("materials"), false)?;
    Self::save_materials(&mut writer)?;
    writer.close_scope()?;

    writer.write_array(Some("environment"), false)?;
    Self::save_environment(&mut writer)?;
    writer.close_scope()?;

    writer.write_array(Some("shaders"), false)?;
    Self::save_shaders(&mut writer)?;
    writer.close_scope()?;

    if scene.has_animations() {
      writer.write_array(Some("animations"), false)?;
      if options.binary_animations {
        match animation_contents {
          Some(contents) => {
            let mut recorder = HalaMapRecorder::new(contents);
            Self::save_animations_binary(scene, &mut writer, &mut recorder)?;
          },
          None => {
            let mut recorder = HalaFileRecorder::new(out_dir);
            Self::save_animations_binary(scene, &mut writer, &mut recorder)?;
          },
        }
      } else {
        Self::save_animations(scene, &mut writer)?;
      }
      writer.close_scope()?;
    }

    writer.close_scope()?;
    writer.write_raw("\n")?;
    Ok(())
  }

  fn write_matrix<W: Write>(writer: &mut HalaJsonWriter<W>, name: &str, matrix: &HalaMatrix) -> Result<(), HalaExporterError> {
    Self::write_floats(writer, name, &matrix.data)
  }

  fn write_floats<W: Write>(writer: &mut HalaJsonWriter<W>, name: &str, values: &[f32]) -> Result<(), HalaExporterError> {
    writer.write_array(Some(name), true)?;
    for &value in values.iter() {
      writer.write_value(None, value)?;
    }
    writer.close_scope()
  }

  fn save_nodes<W: Write>(scene: &HalaScene, writer: &mut HalaJsonWriter<W>, save_materials: bool) -> Result<(), HalaExporterError> {
    for node in scene.nodes.iter() {
      writer.write_object(None, false)?;
      if !node.name.is_empty() {
        writer.write_value(Some("name"), HalaNode::make_valid_name(&node.name).as_str())?;
      }
      if !node.transform.is_identity() {
        Self::write_matrix(writer, "matrix", &node.transform)?;
      }

      if node.has_mesh() {
        writer.write_object(Some("model"), false)?;
        writer.write_value(Some("mesh"), node.mesh_index)?;
        if save_materials {
          writer.write_value(Some("material"), node.material_index + 1)?;
        }
        writer.close_scope()?;
      }

      if !node.children.is_empty() {
        writer.write_array(Some("children"), true)?;
        for &child in node.children.iter() {
          writer.write_value(None, child)?;
        }
        writer.close_scope()?;
      }

      if let Some(inverse_bind_pose) = node.inverse_bind_pose.as_ref() {
        Self::write_matrix(writer, "inverseBindPoseMatrix", inverse_bind_pose)?;
      }
      writer.close_scope()?;
    }
    Ok(())
  }

  /// Write the buffer descriptor and the bytes.
  /// return: The byte length.
  fn write_buffer<W: Write, B: Write>(
    writer: &mut HalaJsonWriter<W>,
    bin: &mut B,
    name: &str,
    offset: u32,
    bytes: &[u8],
  ) -> Result<u32, HalaExporterError> {
    let length = bytes.len() as u32;
    writer.write_object(Some(name), true)?;
    writer.write_value(Some("byteOffset"), offset)?;
    writer.write_value(Some("byteLength"), length)?;
    writer.close_scope()?;
    bin.write_all(bytes)?;
    Ok(length)
  }

  fn save_meshes<W: Write, B: Write>(
    scene: &HalaScene,
    writer: &mut HalaJsonWriter<W>,
    bin: &mut B,
    bin_file_name: &str,
  ) -> Result<(), HalaExporterError> {
    let mut offset = 0u32;
    for (mesh_index, mesh) in scene.meshes.iter().enumerate() {
      writer.write_object(None, false)?;
      writer.write_value(Some("uri"), bin_file_name)?;
      writer.write_value(Some("attributes"), HalaMeshAttributeFlags::from_mesh(mesh).bits())?;
      writer.write_value(Some("primitive"), "TRIANGLES")?;

      offset += Self::write_buffer(writer, bin, "indices", offset, &u16s_to_bytes(&mesh.indices))?;
      offset += Self::write_buffer(writer, bin, "positions", offset, &vec3s_to_bytes(&mesh.positions))?;
      if !mesh.normals.is_empty() {
        offset += Self::write_buffer(writer, bin, "normals", offset, &vec3s_to_bytes(&mesh.normals))?;
      }
      if !mesh.tex_coords.is_empty() {
        offset += Self::write_buffer(writer, bin, "textures", offset, &vec2s_to_bytes(&mesh.tex_coords))?;
      }
      if !mesh.tangents.is_empty() {
        offset += Self::write_buffer(writer, bin, "tangents", offset, &vec3s_to_bytes(&mesh.tangents))?;
      }

      if let Some(root) = mesh.skeleton {
        offset += Self::write_buffer(writer, bin, "joints0", offset, &vec4s_to_bytes(&mesh.joints0))?;
        offset += Self::write_buffer(writer, bin, "weights0", offset, &vec4s_to_bytes(&mesh.weights0))?;
        let skeleton_id = scene.find_skeleton_id(root)
          .ok_or(HalaExporterError::new(&format!("The skeleton of mesh {} is not a skeleton root.", mesh_index), None))?;
        writer.write_value(Some("skeleton"), skeleton_id)?;
      }

      if !mesh.blend_shapes.is_empty() {
        offset += Self::save_blend_shapes(mesh, writer, bin, offset)?;
      }

      writer.close_scope()?;
    }
    Ok(())
  }

  /// Write the blend shape header, the blend shape deltas and the position unnormalize factor.
  /// return: The byte length.
  fn save_blend_shapes<W: Write, B: Write>(
    mesh: &HalaMesh,
    writer: &mut HalaJsonWriter<W>,
    bin: &mut B,
    start: u32,
  ) -> Result<u32, HalaExporterError> {
    let mut offset = start;
    let header = mesh.blend_shape_header;
    let mut header_bytes = Vec::with_capacity(4);
    header_bytes.extend_from_slice(&header.width.to_le_bytes());
    header_bytes.extend_from_slice(&header.height.to_le_bytes());

    writer.write_object(Some("blendShapeHeader"), true)?;
    writer.write_value(Some("version"), BLEND_SHAPE_VERSION)?;
    writer.write_value(Some("byteOffset"), offset)?;
    writer.write_value(Some("byteLength"), header_bytes.len() as u32)?;
    writer.close_scope()?;
    bin.write_all(&header_bytes)?;
    offset += header_bytes.len() as u32;

    let num_of_vertices = mesh.positions.len();
    let matches = |values: &[Vec3]| !values.is_empty() && values.len() == num_of_vertices;

    // Shapes without a full position set keep an empty delta list.
    let position_deltas = mesh.blend_shapes.iter()
      .map(|blend_shape| if matches(&blend_shape.positions) {
        mesh.positions.iter()
          .zip(blend_shape.positions.iter())
          .map(|(base, target)| *target - *base)
          .collect()
      } else {
        Vec::new()
      })
      .collect::<Vec<Vec<Vec3>>>();
    let (position_deltas, unnormalize_factor) = normalize_position_deltas(&position_deltas);

    writer.write_array(Some("blendShapes"), false)?;
    for (blend_shape, positions) in mesh.blend_shapes.iter().zip(position_deltas.iter()) {
      writer.write_object(None, false)?;
      writer.write_value(Some("name"), blend_shape.name.as_str())?;
      writer.write_value(Some("weight"), blend_shape.weight)?;

      if !positions.is_empty() {
        offset += Self::write_buffer(writer, bin, "positions", offset, &vec3s_to_bytes(positions))?;
      }
      if matches(&blend_shape.normals) && matches(&mesh.normals) {
        let normals = offset_direction_deltas(&mesh.normals, &blend_shape.normals);
        offset += Self::write_buffer(writer, bin, "normals", offset, &vec3s_to_bytes(&normals))?;
      }
      if matches(&blend_shape.tangents) && matches(&mesh.tangents) {
        let tangents = offset_direction_deltas(&mesh.tangents, &blend_shape.tangents);
        offset += Self::write_buffer(writer, bin, "tangents", offset, &vec3s_to_bytes(&tangents))?;
      }
      writer.close_scope()?;
    }
    writer.close_scope()?;

    bin.write_all(&unnormalize_factor.to_le_bytes())?;
    offset += std::mem::size_of::<f32>() as u32;

    Ok(offset - start)
  }

  fn save_skeletons<W: Write>(scene: &HalaScene, writer: &mut HalaJsonWriter<W>) -> Result<(), HalaExporterError> {
    writer.write_array(Some("skeletons"), false)?;
    for &root in scene.skeleton_roots.iter() {
      writer.write_object(None, true)?;
      let name = HalaNode::make_valid_name(&scene.nodes[root as usize].name);
      writer.write_value(Some("node"), name.as_str())?;
      writer.close_scope()?;
    }
    writer.close_scope()
  }

  fn save_cameras<W: Write>(scene: &HalaScene, writer: &mut HalaJsonWriter<W>) -> Result<(), HalaExporterError> {
    if scene.cameras.is_empty() {
      writer.write_object(None, false)?;
      writer.write_value(Some("fov"), 60.0)?;
      writer.write_value(Some("near"), 0.1)?;
      writer.write_value(Some("far"), 100.0)?;
      writer.write_array(Some("matrix"), true)?;
      for value in DEFAULT_CAMERA_MATRIX {
        writer.write_value(None, value)?;
      }
      writer.close_scope()?;
      writer.close_scope()?;
    }

    for camera in scene.cameras.iter() {
      writer.write_object(None, false)?;
      writer.write_value(Some("fov"), camera.fov)?;
      writer.write_value(Some("near"), camera.near)?;
      writer.write_value(Some("far"), camera.far)?;
      Self::write_matrix(writer, "matrix", &camera.matrix)?;
      writer.close_scope()?;
    }
    Ok(())
  }

  fn save_lights<W: Write>(scene: &HalaScene, writer: &mut HalaJsonWriter<W>) -> Result<(), HalaExporterError> {
    for light in scene.lights.iter() {
      writer.write_object(None, false)?;
      Self::write_matrix(writer, "matrix", &light.matrix)?;
      Self::write_floats(writer, "color", &light.diffuse_color.to_array())?;
      writer.close_scope()?;
    }
    Ok(())
  }

  fn save_materials<W: Write>(writer: &mut HalaJsonWriter<W>) -> Result<(), HalaExporterError> {
    writer.write_object(None, false)?;
    writer.write_value(Some("texture1"), "Basic_albedo_metallic.png")?;
    writer.write_value(Some("texture2"), "Basic_normal_roughness.png")?;
    writer.write_value(Some("mipmap"), true)?;
    writer.write_value(Some("environment"), 1)?;
    writer.close_scope()
  }

  fn save_environment<W: Write>(writer: &mut HalaJsonWriter<W>) -> Result<(), HalaExporterError> {
    writer.write_object(None, false)?;
    writer.close_scope()?;
    writer.write_object(None, false)?;
    writer.write_value(Some("cubeSpecular"), "Studio/Studio_Radiance.ktx")?;
    writer.write_value(Some("cubeDiffuse"), "Studio/Studio_Irradiance.ktx")?;
    writer.close_scope()
  }

  fn save_shaders<W: Write>(writer: &mut HalaJsonWriter<W>) -> Result<(), HalaExporterError> {
    writer.write_object(None, false)?;
    writer.write_value(Some("vertex"), "default_pbr_shader.vsh")?;
    writer.write_value(Some("fragment"), "default_pbr_shader.fsh")?;
    writer.write_value(Some("rendererState"), "DEPTH_TEST|DEPTH_WRITE|CULL_BACK|DEPTH_FUNC:LESS_EQUAL")?;
    Self::write_matrix(writer, "uCubeMatrix", &HalaMatrix::IDENTITY)?;
    writer.write_value(Some("uMaxLOD"), 6)?;
    writer.close_scope()
  }

  /// Warn about an animation name seen before. The animation is still written.
  fn check_unique_name(names: &mut BTreeSet<String>, animation: &HalaAnimation) {
    if !names.insert(animation.name.clone()) {
      log::warn!("Animation name \"{}\" is not unique.", animation.name);
    }
  }

  /// Get the key frame lists of a track with their property names and value sizes.
  /// Weight properties are numbered per node; the numbering restarts when the node changes.
  fn properties<'a>(animation: &'a HalaAnimation) -> Vec<(&'a str, String, &'a [HalaKeyFrame], usize)> {
    let mut properties = Vec::new();
    let mut weight_index = 0;
    let mut current_node_name: Option<&str> = None;
    for node_animation in animation.node_animations.iter() {
      let node_name = node_animation.node_name.as_str();
      properties.push((node_name, "orientation".to_owned(), node_animation.rotations.as_slice(), 4));
      properties.push((node_name, "position".to_owned(), node_animation.positions.as_slice(), 3));
      properties.push((node_name, "scale".to_owned(), node_animation.scales.as_slice(), 3));
      if !node_animation.weights.is_empty() {
        if current_node_name != Some(node_name) {
          current_node_name = Some(node_name);
          weight_index = 0;
        }
        properties.push((node_name, format!("uBlendShapeWeight[{}]", weight_index), node_animation.weights.as_slice(), 1));
        weight_index += 1;
      }
    }
    properties.retain(|(_, _, key_frames, _)| !key_frames.is_empty());
    properties
  }

  /// Write the property header shared by both animation modes.
  fn write_property_header<W: Write>(
    writer: &mut HalaJsonWriter<W>,
    animation: &HalaAnimation,
    node_name: &str,
    property: &str,
  ) -> Result<(), HalaExporterError> {
    writer.write_value(Some("node"), HalaNode::make_valid_name(node_name).as_str())?;
    writer.write_value(Some("property"), property)?;
    writer.write_object(Some("timePeriod"), true)?;
    writer.write_value(Some("delay"), 0.0)?;
    writer.write_value(Some("duration"), animation.duration_in_seconds())?;
    writer.close_scope()
  }

  /// Write the animations with their key frames inline. Animations without tracks are kept.
  fn save_animations<W: Write>(scene: &HalaScene, writer: &mut HalaJsonWriter<W>) -> Result<(), HalaExporterError> {
    let mut names = BTreeSet::new();
    for animation in scene.animations.iter() {
      writer.write_object(None, false)?;
      writer.write_value(Some("name"), animation.name.as_str())?;
      Self::check_unique_name(&mut names, animation);

      writer.write_array(Some("properties"), false)?;
      for (node_name, property, key_frames, num_of_values) in Self::properties(animation) {
        writer.write_object(None, false)?;
        Self::write_property_header(writer, animation, node_name, &property)?;
        writer.write_array(Some("keyFrames"), false)?;
        for key_frame in key_frames.iter() {
          writer.write_object(None, true)?;
          writer.write_value(Some("progress"), animation.progress(key_frame))?;
          Self::write_floats(writer, "value", &key_frame.value[..num_of_values])?;
          writer.close_scope()?;
        }
        writer.close_scope()?;
        writer.close_scope()?;
      }
      writer.close_scope()?;

      writer.write_value(Some("loopCount"), 0)?;
      writer.close_scope()?;
    }
    Ok(())
  }

  /// Write the animations with their key frames recorded to one binary stream per animation.
  /// Animations without tracks are skipped.
  fn save_animations_binary<W: Write>(
    scene: &HalaScene,
    writer: &mut HalaJsonWriter<W>,
    recorder: &mut dyn HalaAnimationRecorder,
  ) -> Result<(), HalaExporterError> {
    let mut names = BTreeSet::new();
    for (animation_index, animation) in scene.animations.iter().enumerate() {
      if animation.node_animations.is_empty() {
        continue;
      }

      writer.write_object(None, false)?;
      writer.write_value(Some("name"), animation.name.as_str())?;
      Self::check_unique_name(&mut names, animation);

      // The index keeps empty and repeated names apart.
      let url = format!("{}{}.ani", animation.name, animation_index);
      writer.write_array(Some("properties"), false)?;
      recorder.begin(&url)?;

      let mut offset = 0u32;
      for (node_name, property, key_frames, num_of_values) in Self::properties(animation) {
        writer.write_object(None, false)?;
        Self::write_property_header(writer, animation, node_name, &property)?;

        writer.write_object(Some("keyFramesBin"), true)?;
        writer.write_value(Some("url"), url.as_str())?;
        writer.write_value(Some("byteOffset"), offset)?;

        let mut bytes = Vec::with_capacity(key_frames.len() * (num_of_values * 4 + 5));
        for key_frame in key_frames.iter() {
          let progress = animation.progress(key_frame);
          bytes.extend_from_slice(&progress.to_le_bytes());
          for value in key_frame.value[..num_of_values].iter() {
            bytes.extend_from_slice(&value.to_le_bytes());
          }
          bytes.push(key_frame.interpolation.to_u8());
        }
        recorder.stream()?.write_all(&bytes)?;
        offset += bytes.len() as u32;

        writer.write_value(Some("numKeys"), key_frames.len() as u32)?;
        writer.close_scope()?;
        writer.close_scope()?;
      }

      recorder.end()?;
      writer.close_scope()?;
      writer.write_value(Some("loopCount"), 0)?;
      writer.close_scope()?;
    }
    Ok(())
  }
}
