use std::path::Path;
use std::collections::BTreeMap;

use glam::{
  Mat4,
  Quat,
  Vec3,
};
use serde::{
  Deserialize, Serialize
};
use serde_json;
use gltf::animation::util::ReadOutputs;

use crate::error::HalaExporterError;
use super::import_scene::{
  HalaImportScene,
  HalaImportNode,
  HalaImportMesh,
  HalaImportUvSet,
  HalaImportBone,
  HalaImportVertexWeight,
  HalaImportMorphTarget,
  HalaImportMaterial,
  HalaImportAlphaMode,
  HalaImportCamera,
  HalaImportLight,
  HalaImportKey,
  HalaImportNodeChannel,
  HalaImportMorphChannel,
  HalaImportAnimation,
};

/// The morph method tag of targets which hold absolute values blended relative to the base.
pub const MORPH_METHOD_RELATIVE: u32 = 3;

/// glTF animations are in seconds, imported keys are in milliseconds.
const TICKS_PER_SECOND: f64 = 1000.0;

/// The glTF loader.
pub struct HalaGltfLoader;

/// The glTF mesh custom info written by most exporters.
#[derive(Serialize, Deserialize, Default)]
struct _MeshCustomInfo {
  #[serde(rename = "targetNames", default)]
  pub target_names: Vec<String>,
}

/// The glTF buffers and the lookups shared while loading.
struct _LoadContext<'a> {
  buffers: &'a [gltf::buffer::Data],
  node_names: Vec<String>,
  default_material: u32,
  uses_default_material: bool,
  meshes: Vec<HalaImportMesh>,
  // (glTF mesh, skin) -> imported meshes, one per primitive.
  mesh_instances: BTreeMap<(usize, Option<usize>), Vec<u32>>,
}

/// The implementation of the glTF loader.
impl HalaGltfLoader {
  /// Load the glTF file from the given path.
  /// param path The path of the glTF file.
  /// return The imported scene graph.
  pub fn load<P: AsRef<Path>>(path: P) -> Result<HalaImportScene, HalaExporterError> {
    let path = path.as_ref();
    let (gltf, buffers, _) = gltf::import(path)
      .map_err(|err| HalaExporterError::new(&format!("Load glTF file \"{:?}\" failed.", path), Some(Box::new(err))))?;

    let scene = match gltf.default_scene() {
      Some(scene) => scene,
      None => {
        let mut scenes = gltf.scenes();
        if scenes.len() > 1 {
          log::warn!("More than one scene in glTF file \"{:?}\". Only the first scene will be loaded.", path);
        }
        scenes.next()
          .ok_or(HalaExporterError::new(&format!("No scene in glTF file \"{:?}\".", path), None))?
      },
    };
    let scene_name = scene.name().unwrap_or("Scene").to_owned();
    log::debug!("Loading scene \"{}\".", scene_name);

    let mut context = _LoadContext {
      buffers: &buffers,
      node_names: gltf.nodes().map(|node| Self::node_name(&node)).collect(),
      default_material: gltf.materials().len() as u32,
      uses_default_material: false,
      meshes: Vec::new(),
      mesh_instances: BTreeMap::new(),
    };

    let mut roots = Vec::new();
    for node in scene.nodes() {
      roots.push(Self::load_subtree(&node, &mut context)?);
    }
    let root = if roots.len() == 1 {
      roots.remove(0)
    } else {
      HalaImportNode {
        name: scene_name,
        transform: Mat4::IDENTITY,
        meshes: Vec::new(),
        children: roots,
      }
    };

    // Load all materials.
    let mut materials = gltf.materials()
      .map(|material| Self::load_material(&material))
      .collect::<Vec<_>>();
    if context.uses_default_material {
      materials.push(HalaImportMaterial {
        name: "DefaultMaterial".to_owned(),
        alpha_mode: HalaImportAlphaMode::Opaque,
      });
    }

    // Cameras and lights take the names of the nodes that carry them.
    let mut cameras = Vec::new();
    let mut lights = Vec::new();
    for node in scene.nodes() {
      Self::load_cameras_and_lights(&node, &context.node_names, &mut cameras, &mut lights);
    }

    // Load all animations.
    let mut animations = Vec::new();
    for animation in gltf.animations() {
      animations.push(Self::load_animation(&animation, &context)?);
    }

    Ok(HalaImportScene {
      root,
      meshes: context.meshes,
      materials,
      cameras,
      lights,
      animations,
    })
  }

  /// Get the name of the node, or a generated one for unnamed nodes.
  fn node_name(node: &gltf::Node) -> String {
    match node.name() {
      Some(name) if !name.is_empty() => name.to_owned(),
      _ => format!("node_{}", node.index()),
    }
  }

  /// Load the node and its subtree, depth first.
  /// param root The gltf node.
  /// param context The load context.
  /// return The imported node.
  fn load_subtree(root: &gltf::Node, context: &mut _LoadContext) -> Result<HalaImportNode, HalaExporterError> {
    // Pre-order, so meshes are numbered in the order their nodes are reached.
    let mut loaded_nodes: Vec<(HalaImportNode, Option<usize>)> = Vec::new();
    let mut stack = vec![(root.clone(), None)];
    while let Some((node, parent)) = stack.pop() {
      let index = loaded_nodes.len();
      loaded_nodes.push((Self::load_node(&node, context)?, parent));
      let children = node.children().collect::<Vec<_>>();
      for child in children.into_iter().rev() {
        stack.push((child, Some(index)));
      }
    }

    // Descendants come after their ancestors, so popping attaches complete subtrees.
    while let Some((node, parent)) = loaded_nodes.pop() {
      match parent {
        Some(parent) => loaded_nodes[parent].0.children.insert(0, node),
        None => return Ok(node),
      }
    }
    Err(HalaExporterError::new(&format!("Node \"{}\" could not be loaded.", context.node_names[root.index()]), None))
  }

  /// Load the node without its children.
  /// param node The gltf node.
  /// param context The load context.
  /// return The imported node.
  fn load_node(node: &gltf::Node, context: &mut _LoadContext) -> Result<HalaImportNode, HalaExporterError> {
    let mut loaded_node = HalaImportNode::new(
      &context.node_names[node.index()],
      Mat4::from_cols_array_2d(&node.transform().matrix()),
    );

    if let Some(mesh) = node.mesh() {
      let skin = node.skin();
      let key = (mesh.index(), skin.as_ref().map(|skin| skin.index()));
      let mesh_ids = match context.mesh_instances.get(&key).cloned() {
        Some(mesh_ids) => mesh_ids,
        None => {
          let mut mesh_ids = Vec::new();
          for primitive in mesh.primitives() {
            let loaded_mesh = Self::load_primitive(&mesh, &primitive, skin.as_ref(), context)?;
            mesh_ids.push(context.meshes.len() as u32);
            context.meshes.push(loaded_mesh);
          }
          context.mesh_instances.insert(key, mesh_ids.clone());
          mesh_ids
        },
      };
      loaded_node.meshes = mesh_ids;
    }

    Ok(loaded_node)
  }

  /// Load the primitive as a mesh.
  /// param mesh The gltf mesh.
  /// param primitive The gltf primitive.
  /// param skin The skin of the node using the mesh.
  /// param context The load context.
  /// return The imported mesh.
  fn load_primitive(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    skin: Option<&gltf::Skin>,
    context: &mut _LoadContext,
  ) -> Result<HalaImportMesh, HalaExporterError> {
    let buffers = context.buffers;
    let mesh_name = match mesh.name() {
      Some(name) => format!("{}_{}", name, primitive.index()),
      None => format!("mesh_{}_{}", mesh.index(), primitive.index()),
    };
    log::debug!("Loading primitive \"{}\".", mesh_name);
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions = reader.read_positions()
      .ok_or(HalaExporterError::new(&format!("Read positions from mesh \"{}\" failed.", mesh_name), None))?
      .map(Vec3::from).collect::<Vec<_>>();
    let normals = reader.read_normals()
      .map(|normals| normals.map(Vec3::from).collect::<Vec<_>>())
      .unwrap_or_default();
    let tangents = reader.read_tangents()
      .map(|tangents| tangents.map(|tangent| Vec3::new(tangent[0], tangent[1], tangent[2])).collect::<Vec<_>>())
      .unwrap_or_default();
    let tex_coords = reader.read_tex_coords(0).map(|tex_coords| HalaImportUvSet {
      num_of_components: 2,
      coords: tex_coords.into_f32().map(|uv| Vec3::new(uv[0], uv[1], 0.0)).collect(),
    });
    let indices = match reader.read_indices() {
      Some(indices) => indices.into_u32().collect::<Vec<_>>(),
      None => (0..positions.len() as u32).collect(),
    };

    let material_index = match primitive.material().index() {
      Some(index) => index as u32,
      None => {
        context.uses_default_material = true;
        context.default_material
      },
    };

    let bones = match skin {
      Some(skin) => {
        let joints = reader.read_joints(0)
          .ok_or(HalaExporterError::new(&format!("Read joints from mesh \"{}\" failed.", mesh_name), None))?
          .into_u16().collect::<Vec<_>>();
        let weights = reader.read_weights(0)
          .ok_or(HalaExporterError::new(&format!("Read weights from mesh \"{}\" failed.", mesh_name), None))?
          .into_f32().collect::<Vec<_>>();
        Self::load_bones(&joints, &weights, skin, &context.node_names, buffers, &mesh_name)
      },
      None => Vec::new(),
    };

    let custom_info = match mesh.extras() {
      Some(extras) => serde_json::from_str::<_MeshCustomInfo>(extras.get())
        .map_err(|err| HalaExporterError::new("Parse mesh extras failed.", Some(Box::new(err))))?,
      None => _MeshCustomInfo::default(),
    };
    let mut morph_targets = Vec::new();
    for (i, (target_positions, target_normals, target_tangents)) in reader.read_morph_targets().enumerate() {
      let name = custom_info.target_names.get(i).cloned().unwrap_or_else(|| format!("target_{}", i));
      morph_targets.push(HalaImportMorphTarget {
        name,
        positions: Self::to_absolute(&positions, target_positions.map(|it| it.map(Vec3::from).collect())),
        normals: Self::to_absolute(&normals, target_normals.map(|it| it.map(Vec3::from).collect())),
        tangents: Self::to_absolute(&tangents, target_tangents.map(|it| it.map(Vec3::from).collect())),
      });
    }

    Ok(HalaImportMesh {
      name: mesh_name.clone(),
      faces: Self::load_faces(primitive.mode(), &indices, &mesh_name),
      positions,
      normals,
      tangents,
      tex_coords,
      material_index,
      bones,
      morph_method: if morph_targets.is_empty() { 0 } else { MORPH_METHOD_RELATIVE },
      morph_targets,
    })
  }

  /// Split the indices into faces. Strips and fans become triangles.
  fn load_faces(mode: gltf::mesh::Mode, indices: &[u32], mesh_name: &str) -> Vec<Vec<u32>> {
    match mode {
      gltf::mesh::Mode::Triangles => indices.chunks(3).map(|face| face.to_vec()).collect(),
      gltf::mesh::Mode::TriangleStrip => (2..indices.len())
        .map(|i| if i % 2 == 0 {
          vec![indices[i - 2], indices[i - 1], indices[i]]
        } else {
          vec![indices[i - 1], indices[i - 2], indices[i]]
        })
        .collect(),
      gltf::mesh::Mode::TriangleFan => (2..indices.len())
        .map(|i| vec![indices[0], indices[i - 1], indices[i]])
        .collect(),
      gltf::mesh::Mode::Points => indices.iter().map(|&index| vec![index]).collect(),
      _ => {
        log::warn!("Mesh \"{}\" is made of lines.", mesh_name);
        indices.chunks(2).map(|face| face.to_vec()).collect()
      },
    }
  }

  /// Displacements are stored relative to the base, blend shapes hold absolute values.
  fn to_absolute(base: &[Vec3], displacements: Option<Vec<Vec3>>) -> Vec<Vec3> {
    match displacements {
      Some(displacements) if !base.is_empty() => {
        base.iter().zip(displacements.iter()).map(|(b, d)| *b + *d).collect()
      },
      _ => Vec::new(),
    }
  }

  /// Load the bones of a skinned primitive.
  /// param joints The joint indices per vertex.
  /// param weights The joint weights per vertex.
  /// param skin The gltf skin.
  /// param node_names The names of all nodes.
  /// param buffers The gltf buffers.
  /// param mesh_name The name of the mesh.
  /// return The bones, one per joint of the skin.
  fn load_bones(
    joints: &[[u16; 4]],
    weights: &[[f32; 4]],
    skin: &gltf::Skin,
    node_names: &[String],
    buffers: &[gltf::buffer::Data],
    mesh_name: &str,
  ) -> Vec<HalaImportBone> {
    let skin_reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
    let inverse_bind_matrices = skin_reader.read_inverse_bind_matrices()
      .map(|matrices| matrices.map(|mtx| Mat4::from_cols_array_2d(&mtx)).collect::<Vec<_>>())
      .unwrap_or_default();

    let mut bones = skin.joints()
      .enumerate()
      .map(|(i, joint)| HalaImportBone {
        name: node_names[joint.index()].clone(),
        offset_matrix: inverse_bind_matrices.get(i).copied().unwrap_or(Mat4::IDENTITY),
        weights: Vec::new(),
      })
      .collect::<Vec<_>>();

    for (vertex, (vertex_joints, vertex_weights)) in joints.iter().zip(weights.iter()).enumerate() {
      for (&joint, &weight) in vertex_joints.iter().zip(vertex_weights.iter()) {
        if weight <= 0.0 {
          continue;
        }
        match bones.get_mut(joint as usize) {
          Some(bone) => bone.weights.push(HalaImportVertexWeight { vertex: vertex as u32, weight }),
          None => log::warn!("Vertex {} of mesh \"{}\" references missing joint {}.", vertex, mesh_name, joint),
        }
      }
    }

    bones
  }

  /// Load the material.
  /// param material The gltf material.
  /// return The imported material.
  fn load_material(material: &gltf::Material) -> HalaImportMaterial {
    let name = material.name().unwrap_or("<Unnamed>").to_owned();
    log::debug!("Loading material \"{}\".", name);
    let alpha_mode = match material.alpha_mode() {
      gltf::material::AlphaMode::Opaque => HalaImportAlphaMode::Opaque,
      gltf::material::AlphaMode::Mask => HalaImportAlphaMode::Mask,
      gltf::material::AlphaMode::Blend => HalaImportAlphaMode::Blend,
    };
    HalaImportMaterial {
      name,
      alpha_mode,
    }
  }

  /// Collect the cameras and lights of the subtree, depth first.
  fn load_cameras_and_lights(
    root: &gltf::Node,
    node_names: &[String],
    cameras: &mut Vec<HalaImportCamera>,
    lights: &mut Vec<HalaImportLight>,
  ) {
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
      Self::load_camera_and_light(&node, node_names, cameras, lights);
      let children = node.children().collect::<Vec<_>>();
      stack.extend(children.into_iter().rev());
    }
  }

  fn load_camera_and_light(
    node: &gltf::Node,
    node_names: &[String],
    cameras: &mut Vec<HalaImportCamera>,
    lights: &mut Vec<HalaImportLight>,
  ) {
    let name = &node_names[node.index()];
    if let Some(camera) = node.camera() {
      match camera.projection() {
        gltf::camera::Projection::Perspective(perspective) => {
          log::debug!("Loading camera \"{}\".", name);
          let aspect = perspective.aspect_ratio().unwrap_or(1.0);
          let yfov = perspective.yfov();
          cameras.push(HalaImportCamera {
            name: name.clone(),
            horizontal_fov: 2.0 * ((yfov * 0.5).tan() * aspect).atan(),
            clip_plane_near: perspective.znear(),
            clip_plane_far: perspective.zfar().unwrap_or(1000.0),
            look_at: Vec3::NEG_Z,
            up: Vec3::Y,
            position: Vec3::ZERO,
          });
        },
        gltf::camera::Projection::Orthographic(_) => {
          log::warn!("Orthographic camera \"{}\" is not supported.", name);
        },
      }
    }

    if let Some(light) = node.light() {
      log::debug!("Loading light \"{}\".", name);
      let color: Vec3 = light.color().into();
      lights.push(HalaImportLight {
        name: name.clone(),
        diffuse_color: color * light.intensity(),
      });
    }
  }

  /// Load the animation.
  /// param animation The gltf animation.
  /// param context The load context.
  /// return The imported animation.
  fn load_animation(animation: &gltf::Animation, context: &_LoadContext) -> Result<HalaImportAnimation, HalaExporterError> {
    let buffers = context.buffers;
    let name = animation.name().unwrap_or_default().to_owned();
    log::debug!("Loading animation \"{}\".", name);

    let mut loaded_animation = HalaImportAnimation {
      name,
      ticks_per_second: TICKS_PER_SECOND,
      ..Default::default()
    };

    for channel in animation.channels() {
      let node_name = &context.node_names[channel.target().node().index()];
      let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
      let times = reader.read_inputs()
        .ok_or(HalaExporterError::new(&format!("Read inputs of animation \"{}\" failed.", loaded_animation.name), None))?
        .map(|time| time as f64 * TICKS_PER_SECOND)
        .collect::<Vec<_>>();
      let outputs = reader.read_outputs()
        .ok_or(HalaExporterError::new(&format!("Read outputs of animation \"{}\" failed.", loaded_animation.name), None))?;
      if let Some(&end) = times.last() {
        loaded_animation.duration = loaded_animation.duration.max(end);
      }
      // Cubic spline outputs are (in tangent, value, out tangent) triples.
      let stride = match channel.sampler().interpolation() {
        gltf::animation::Interpolation::CubicSpline => 3,
        _ => 1,
      };

      match outputs {
        ReadOutputs::Translations(translations) => {
          let values = Self::sample_values(translations.map(Vec3::from).collect(), stride);
          Self::node_channel(&mut loaded_animation, node_name).position_keys = Self::make_keys(&times, values);
        },
        ReadOutputs::Rotations(rotations) => {
          let values = Self::sample_values(rotations.into_f32().map(Quat::from_array).collect(), stride);
          Self::node_channel(&mut loaded_animation, node_name).rotation_keys = Self::make_keys(&times, values);
        },
        ReadOutputs::Scales(scales) => {
          let values = Self::sample_values(scales.map(Vec3::from).collect(), stride);
          Self::node_channel(&mut loaded_animation, node_name).scaling_keys = Self::make_keys(&times, values);
        },
        ReadOutputs::MorphTargetWeights(weights) => {
          let weights = weights.into_f32().map(|weight| weight as f64).collect::<Vec<_>>();
          if times.is_empty() {
            continue;
          }
          let num_of_targets = weights.len() / (times.len() * stride);
          let values = weights.chunks(num_of_targets.max(1))
            .map(|chunk| chunk.to_vec())
            .collect::<Vec<_>>();
          let values = Self::sample_values(values, stride);
          loaded_animation.morph_channels.push(HalaImportMorphChannel {
            name: node_name.clone(),
            keys: Self::make_keys(&times, values),
          });
        },
      }
    }

    Ok(loaded_animation)
  }

  /// Get the channel of the node, adding it if missing.
  fn node_channel<'a>(animation: &'a mut HalaImportAnimation, node_name: &str) -> &'a mut HalaImportNodeChannel {
    let position = match animation.channels.iter().position(|channel| channel.node_name == node_name) {
      Some(position) => position,
      None => {
        animation.channels.push(HalaImportNodeChannel {
          node_name: node_name.to_owned(),
          ..Default::default()
        });
        animation.channels.len() - 1
      },
    };
    &mut animation.channels[position]
  }

  /// Keep the value elements of the sampler outputs.
  fn sample_values<T>(outputs: Vec<T>, stride: usize) -> Vec<T> {
    if stride == 1 {
      outputs
    } else {
      outputs.into_iter().skip(1).step_by(stride).collect()
    }
  }

  /// Pair the times with the values.
  fn make_keys<T>(times: &[f64], values: Vec<T>) -> Vec<HalaImportKey<T>> {
    times.iter()
      .zip(values)
      .map(|(&time, value)| HalaImportKey { time, value })
      .collect()
  }
}
