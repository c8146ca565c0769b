use glam::{
  Mat4,
  Vec2,
  Vec3,
  Vec4,
};

use crate::error::HalaExporterError;
use crate::scene::matrix::{
  EPSILON,
  HalaMatrix,
  snap,
};
use super::super::cpu::{
  scene::HalaScene,
  node::HalaNode,
  mesh::{HalaMesh, HalaBlendShape, HalaBlendShapeHeader, MAX_WEIGHTS_PER_VERTEX},
  camera::HalaCamera,
  light::HalaLight,
  animation::{HalaAnimation, HalaNodeAnimation, HalaKeyFrame},
};
use super::import_scene::{
  HalaImportScene,
  HalaImportNode,
  HalaImportMesh,
  HalaImportAlphaMode,
  HalaImportKey,
};
use super::skeleton::{
  consolidate_skeletons,
  convert_scene_based_indices_to_skeleton_based,
};

/// Builds a scene from an imported scene graph.
pub struct HalaSceneExtractor;

/// The implementation of the scene extractor.
impl HalaSceneExtractor {
  /// Run all extraction passes.
  /// param import_scene: The imported scene graph.
  /// return: The scene.
  pub fn extract(import_scene: &HalaImportScene) -> Result<HalaScene, HalaExporterError> {
    let mut scene = HalaScene::default();
    let mut mesh_ids = Vec::new();

    Self::extract_nodes(&mut scene, &mut mesh_ids, import_scene);
    Self::pack_scene_node_mesh_ids(&mut scene, &mesh_ids);
    let candidates = Self::extract_meshes(&mut scene, &mesh_ids, import_scene)?;
    scene.skeleton_roots = consolidate_skeletons(&mut scene, &candidates);
    convert_scene_based_indices_to_skeleton_based(&mut scene);
    Self::extract_cameras(&mut scene, import_scene);
    Self::extract_lights(&mut scene, import_scene);
    Self::extract_animations(&mut scene, import_scene);

    log::debug!(
      "Extracted {} nodes, {} meshes, {} skeletons, {} cameras, {} lights and {} animations.",
      scene.nodes.len(),
      scene.meshes.len(),
      scene.skeleton_roots.len(),
      scene.cameras.len(),
      scene.lights.len(),
      scene.animations.len(),
    );
    Ok(scene)
  }

  /// Add the imported nodes to the scene depth first, skipping camera leaves.
  /// Extra meshes of a node get a node of their own, named with a "_<n>" suffix.
  /// param scene: The scene.
  /// param mesh_ids: The sorted imported mesh indices in use.
  /// param import_scene: The imported scene graph.
  pub fn extract_nodes(
    scene: &mut HalaScene,
    mesh_ids: &mut Vec<u32>,
    import_scene: &HalaImportScene,
  ) {
    let mut stack: Vec<(Option<u32>, &HalaImportNode)> = vec![(None, &import_scene.root)];
    while let Some((parent, import_node)) = stack.pop() {
      if import_node.is_leaf() && import_scene.is_camera_name(&import_node.name) {
        log::debug!("Skipping camera node \"{}\".", import_node.name);
        continue;
      }

      let transform = HalaMatrix::snapped(&import_node.transform);
      let node_index = scene.add_node(HalaNode::new(&import_node.name, parent, transform));

      if let Some((&first_mesh, other_meshes)) = import_node.meshes.split_first() {
        Self::set_node_mesh(scene, node_index, first_mesh, import_scene, mesh_ids);

        for (i, &mesh_id) in other_meshes.iter().enumerate() {
          let name = format!("{}_{}", import_node.name, i + 1);
          // Siblings share the local transform; under a root they hang off the root itself.
          let extra_node = match parent {
            Some(_) => HalaNode::new(&name, parent, transform),
            None => HalaNode::new(&name, Some(node_index), HalaMatrix::IDENTITY),
          };
          let extra_index = scene.add_node(extra_node);
          Self::set_node_mesh(scene, extra_index, mesh_id, import_scene, mesh_ids);
        }
      }

      stack.extend(import_node.children.iter().rev().map(|child| (Some(node_index), child)));
    }
  }

  /// Attach the imported mesh to the node and record it as used.
  fn set_node_mesh(
    scene: &mut HalaScene,
    node_index: u32,
    mesh_id: u32,
    import_scene: &HalaImportScene,
    mesh_ids: &mut Vec<u32>,
  ) {
    let Some(import_mesh) = import_scene.meshes.get(mesh_id as usize) else {
      log::warn!("Node \"{}\" references missing mesh {}.", scene.nodes[node_index as usize].name, mesh_id);
      return;
    };

    let node = &mut scene.nodes[node_index as usize];
    node.mesh_index = mesh_id;
    node.material_index = import_mesh.material_index;
    if let Some(material) = import_scene.materials.get(import_mesh.material_index as usize) {
      if material.alpha_mode == HalaImportAlphaMode::Blend {
        node.is_blend_enabled = true;
      }
    }

    if let Err(pos) = mesh_ids.binary_search(&mesh_id) {
      mesh_ids.insert(pos, mesh_id);
    }
  }

  /// Convert the imported mesh indices of the nodes to indices into the used meshes.
  /// param scene: The scene.
  /// param mesh_ids: The sorted imported mesh indices in use.
  pub fn pack_scene_node_mesh_ids(scene: &mut HalaScene, mesh_ids: &[u32]) {
    for node in scene.nodes.iter_mut().filter(|node| node.has_mesh()) {
      match mesh_ids.binary_search(&node.mesh_index) {
        Ok(pos) => node.mesh_index = pos as u32,
        Err(_) => {
          log::warn!("Mesh {} of node \"{}\" was not registered.", node.mesh_index, node.name);
          node.mesh_index = super::super::cpu::node::INVALID_MESH;
        },
      }
    }
  }

  /// Extract the used meshes in ascending imported order.
  /// param scene: The scene.
  /// param mesh_ids: The sorted imported mesh indices in use.
  /// param import_scene: The imported scene graph.
  /// return: The skeleton root candidates, i.e. every bone node, sorted ascending.
  pub fn extract_meshes(
    scene: &mut HalaScene,
    mesh_ids: &[u32],
    import_scene: &HalaImportScene,
  ) -> Result<Vec<u32>, HalaExporterError> {
    let mut candidates = Vec::new();

    for &mesh_id in mesh_ids.iter() {
      let import_mesh = &import_scene.meshes[mesh_id as usize];
      log::debug!("Extracting mesh \"{}\".", import_mesh.name);
      let num_of_vertices = import_mesh.positions.len();

      let mut mesh = HalaMesh {
        indices: Self::extract_indices(import_mesh),
        positions: import_mesh.positions.clone(),
        normals: import_mesh.normals.clone(),
        ..Default::default()
      };

      mesh.tex_coords = match &import_mesh.tex_coords {
        Some(uv_set) if uv_set.num_of_components == 2 => {
          uv_set.coords.iter().map(|coord| coord.truncate()).collect()
        },
        Some(uv_set) => {
          log::warn!(
            "Texture coordinates with {} components of mesh \"{}\" are not supported, generating default texture coordinates.",
            uv_set.num_of_components,
            import_mesh.name,
          );
          vec![Vec2::ZERO; num_of_vertices]
        },
        None => {
          log::warn!("Generating default texture coordinates for mesh \"{}\".", import_mesh.name);
          vec![Vec2::ZERO; num_of_vertices]
        },
      };

      mesh.tangents = if import_mesh.tangents.is_empty() {
        log::warn!("Generating default tangents for mesh \"{}\".", import_mesh.name);
        vec![Vec3::Z; num_of_vertices]
      } else {
        import_mesh.tangents.clone()
      };

      if !import_mesh.bones.is_empty() {
        Self::extract_skin(scene, import_mesh, &mut mesh, &mut candidates)?;
      }

      if !import_mesh.morph_targets.is_empty() {
        mesh.morph_method = import_mesh.morph_method;
        let mut num_of_elements = 0u32;
        for target in import_mesh.morph_targets.iter() {
          num_of_elements += (target.positions.len() + target.normals.len() + target.tangents.len()) as u32;
          mesh.blend_shapes.push(HalaBlendShape {
            name: target.name.clone(),
            positions: target.positions.clone(),
            normals: target.normals.clone(),
            tangents: target.tangents.clone(),
            weight: 0.0,
          });
        }
        mesh.blend_shape_header = HalaBlendShapeHeader::with_elements(num_of_elements);
      }

      scene.meshes.push(mesh);
    }

    Ok(candidates)
  }

  /// Extract the triangle indices.
  fn extract_indices(import_mesh: &HalaImportMesh) -> Vec<u16> {
    let mut indices = Vec::with_capacity(import_mesh.faces.len() * 3);
    for (face_index, face) in import_mesh.faces.iter().enumerate() {
      if face.len() != 3 {
        log::warn!("Skipping face {} of mesh \"{}\" with {} indices.", face_index, import_mesh.name, face.len());
        continue;
      }
      let Ok(triangle) = face.iter().map(|&index| u16::try_from(index)).collect::<Result<Vec<_>, _>>() else {
        log::warn!("Skipping face {} of mesh \"{}\" with indices beyond 16 bits.", face_index, import_mesh.name);
        continue;
      };
      indices.extend(triangle);
    }
    indices
  }

  /// Extract joints and weights; the joints are scene node indices at this point.
  fn extract_skin(
    scene: &mut HalaScene,
    import_mesh: &HalaImportMesh,
    mesh: &mut HalaMesh,
    candidates: &mut Vec<u32>,
  ) -> Result<(), HalaExporterError> {
    let num_of_vertices = mesh.positions.len();
    mesh.joints0 = vec![Vec4::ZERO; num_of_vertices];
    mesh.weights0 = vec![Vec4::ZERO; num_of_vertices];
    let mut next_slots = vec![0usize; num_of_vertices];

    for bone in import_mesh.bones.iter() {
      if bone.weights.is_empty() {
        continue;
      }

      let bone_index = scene.find_node_named(&bone.name).ok_or_else(|| {
        log::error!("Bone \"{}\" of mesh \"{}\" references an invalid joint.", bone.name, import_mesh.name);
        HalaExporterError::new(
          &format!("Bone \"{}\" of mesh \"{}\" references an invalid joint.", bone.name, import_mesh.name),
          None,
        )
      })?;

      let bone_node = &mut scene.nodes[bone_index as usize];
      if bone_node.inverse_bind_pose.is_none() {
        bone_node.inverse_bind_pose = Some(HalaMatrix::snapped(&bone.offset_matrix));
      }

      if let Err(pos) = candidates.binary_search(&bone_index) {
        candidates.insert(pos, bone_index);
        bone_node.skeleton = Some(bone_index);
      }

      // Possibly not the root yet; fixed up after consolidation.
      if mesh.skeleton.is_none() {
        mesh.skeleton = bone_node.skeleton;
      }

      for vertex_weight in bone.weights.iter() {
        if vertex_weight.weight == 0.0 {
          continue;
        }
        let vertex = vertex_weight.vertex as usize;
        if vertex >= num_of_vertices {
          log::warn!("Bone \"{}\" of mesh \"{}\" references missing vertex {}.", bone.name, import_mesh.name, vertex);
          continue;
        }
        let slot = next_slots[vertex];
        if slot < MAX_WEIGHTS_PER_VERTEX {
          mesh.joints0[vertex][slot] = bone_index as f32;
          mesh.weights0[vertex][slot] = vertex_weight.weight;
          next_slots[vertex] += 1;
        } else {
          log::warn!("Vertex {} of mesh \"{}\" exceeds the number of supported weights.", vertex, import_mesh.name);
        }
      }
    }

    if mesh.skeleton.is_none() {
      log::warn!("No bone of mesh \"{}\" influences a vertex, dropping the skin.", import_mesh.name);
      mesh.joints0.clear();
      mesh.weights0.clear();
    }

    Ok(())
  }

  /// Extract the cameras placed on leaf nodes with the same name.
  /// param scene: The scene.
  /// param import_scene: The imported scene graph.
  pub fn extract_cameras(scene: &mut HalaScene, import_scene: &HalaImportScene) {
    for import_camera in import_scene.cameras.iter() {
      let Some(path) = Self::find_node_path(&import_scene.root, &import_camera.name, true) else {
        log::warn!("Camera \"{}\" has no node, dropping it.", import_camera.name);
        continue;
      };
      let world_transform = path.iter().fold(Mat4::IDENTITY, |acc, node| acc * node.transform);

      scene.cameras.push(HalaCamera::new(
        import_camera.horizontal_fov.to_degrees(),
        import_camera.clip_plane_near,
        import_camera.clip_plane_far,
        &world_transform,
        import_camera.look_at,
        import_camera.up,
        import_camera.position,
      ));
    }
  }

  /// Extract the lights placed on nodes with the same name.
  /// param scene: The scene.
  /// param import_scene: The imported scene graph.
  pub fn extract_lights(scene: &mut HalaScene, import_scene: &HalaImportScene) {
    for import_light in import_scene.lights.iter() {
      let Some(path) = Self::find_node_path(&import_scene.root, &import_light.name, false) else {
        log::warn!("Light \"{}\" has no node, dropping it.", import_light.name);
        continue;
      };
      if let Some(node) = path.last() {
        scene.lights.push(HalaLight {
          matrix: HalaMatrix::from(node.transform),
          diffuse_color: import_light.diffuse_color,
        });
      }
    }
  }

  /// Find the first node with the name, depth first.
  /// param root: The root of the search.
  /// param name: The name.
  /// param leaf_only: Whether only nodes without meshes and children match.
  /// return: The nodes from the root down to the found node.
  fn find_node_path<'a>(root: &'a HalaImportNode, name: &str, leaf_only: bool) -> Option<Vec<&'a HalaImportNode>> {
    let mut path: Vec<&'a HalaImportNode> = Vec::new();
    let mut stack = vec![(root, 0usize)];
    while let Some((node, depth)) = stack.pop() {
      path.truncate(depth);
      path.push(node);
      if node.name == name && (!leaf_only || node.is_leaf()) {
        return Some(path);
      }
      stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
    }
    None
  }

  /// Extract the animations, dropping constant channels.
  /// param scene: The scene.
  /// param import_scene: The imported scene graph.
  pub fn extract_animations(scene: &mut HalaScene, import_scene: &HalaImportScene) {
    let mut num_of_generated_names = 0;
    for import_animation in import_scene.animations.iter() {
      if import_animation.channels.is_empty() && import_animation.morph_channels.is_empty() {
        continue;
      }

      let name = if import_animation.name.is_empty() {
        num_of_generated_names += 1;
        format!("autogenerated-name#{}", num_of_generated_names)
      } else {
        import_animation.name.clone()
      };
      let ticks_per_second = import_animation.ticks_per_second as f32;
      let ticks_per_second = if ticks_per_second.abs() < EPSILON { 1000.0 } else { ticks_per_second };
      log::debug!("Extracting animation \"{}\".", name);

      let mut node_animations = Vec::new();
      for channel in import_animation.channels.iter() {
        let mut node_animation = HalaNodeAnimation::new(&channel.node_name);
        node_animation.rotations = Self::extract_key_frames(&channel.rotation_keys, |q| [q.x, q.y, q.z, q.w]);
        node_animation.positions = Self::extract_key_frames(&channel.position_keys, |v| v.extend(0.0).to_array());
        node_animation.scales = Self::extract_key_frames(&channel.scaling_keys, |v| v.extend(0.0).to_array());
        if !node_animation.is_empty() {
          node_animations.push(node_animation);
        }
      }

      // One track per morph target; the keys hold the weights of all targets.
      for morph_channel in import_animation.morph_channels.iter() {
        let mut weight_animations: Vec<HalaNodeAnimation> = Vec::new();
        for key in morph_channel.keys.iter() {
          for (target, &weight) in key.value.iter().enumerate() {
            if target >= weight_animations.len() {
              weight_animations.push(HalaNodeAnimation::new(&morph_channel.name));
            }
            weight_animations[target].weights.push(HalaKeyFrame::new(key.time as f32, [weight as f32, 0.0, 0.0, 0.0]));
          }
        }
        node_animations.extend(weight_animations.into_iter().filter(|animation| !animation.weights.is_empty()));
      }

      scene.animations.push(HalaAnimation {
        name,
        duration: import_animation.duration as f32,
        ticks_per_second,
        node_animations,
      });
    }
  }

  /// Copy the keys, or nothing if all of them hold the same value.
  fn extract_key_frames<T, F>(keys: &[HalaImportKey<T>], to_array: F) -> Vec<HalaKeyFrame>
  where
    F: Fn(&T) -> [f32; 4],
  {
    let key_frames = keys.iter()
      .map(|key| HalaKeyFrame::new(key.time as f32, to_array(&key.value)))
      .collect::<Vec<_>>();
    if Self::is_constant(&key_frames) {
      Vec::new()
    } else {
      key_frames
    }
  }

  /// Check if the snapped values of all key frames are equal within EPSILON.
  fn is_constant(key_frames: &[HalaKeyFrame]) -> bool {
    let Some((first, rest)) = key_frames.split_first() else {
      return true;
    };
    let first = first.value.map(snap);
    rest.iter().all(|key_frame| {
      key_frame.value.map(snap).iter()
        .zip(first.iter())
        .all(|(value, first_value)| (value - first_value).abs() <= EPSILON)
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::Quat;
  use crate::scene::cpu::node::INVALID_MESH;
  use crate::exporter::{HalaExportOptions, HalaSceneSaver};
  use crate::scene::loader::import_scene::{
    HalaImportAnimation,
    HalaImportBone,
    HalaImportCamera,
    HalaImportLight,
    HalaImportMaterial,
    HalaImportMorphChannel,
    HalaImportMorphTarget,
    HalaImportNodeChannel,
    HalaImportUvSet,
    HalaImportVertexWeight,
  };

  fn node(name: &str, meshes: Vec<u32>, children: Vec<HalaImportNode>) -> HalaImportNode {
    HalaImportNode {
      name: name.to_owned(),
      transform: Mat4::IDENTITY,
      meshes,
      children,
    }
  }

  fn triangle_mesh(name: &str, num_of_vertices: usize) -> HalaImportMesh {
    HalaImportMesh {
      name: name.to_owned(),
      positions: (0..num_of_vertices).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect(),
      faces: vec![vec![0, 1, 2]],
      ..Default::default()
    }
  }

  fn camera(name: &str) -> HalaImportCamera {
    HalaImportCamera {
      name: name.to_owned(),
      horizontal_fov: std::f32::consts::FRAC_PI_2,
      clip_plane_near: 0.5,
      clip_plane_far: 200.0,
      look_at: Vec3::NEG_Z,
      up: Vec3::Y,
      position: Vec3::ZERO,
    }
  }

  fn names(scene: &HalaScene) -> Vec<&str> {
    scene.nodes.iter().map(|node| node.name.as_str()).collect()
  }

  fn weight(vertex: u32, weight: f32) -> HalaImportVertexWeight {
    HalaImportVertexWeight { vertex, weight }
  }

  #[test]
  fn test_camera_leaf_is_excluded() {
    let import_scene = HalaImportScene {
      root: node("Root", vec![], vec![
        node("Camera", vec![], vec![]),
        node("Other", vec![], vec![]),
        node("CameraRig", vec![], vec![node("Child", vec![], vec![])]),
      ]),
      cameras: vec![camera("Camera"), camera("CameraRig")],
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();
    assert_eq!(names(&scene), vec!["Root", "Other", "CameraRig", "Child"]);
    assert_eq!(scene.nodes[0].children, vec![1, 2]);
  }

  #[test]
  fn test_mesh_ids_are_compacted() {
    let import_scene = HalaImportScene {
      root: node("Root", vec![], vec![
        node("A", vec![3], vec![]),
        node("B", vec![1], vec![]),
        node("C", vec![3], vec![]),
      ]),
      meshes: (0..5).map(|i| triangle_mesh(&format!("mesh{}", i), 3 + i)).collect(),
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();

    assert_eq!(scene.meshes.len(), 2);
    assert_eq!(scene.meshes[0].num_of_vertices(), 4);
    assert_eq!(scene.meshes[1].num_of_vertices(), 6);
    assert_eq!(scene.nodes[0].mesh_index, INVALID_MESH);
    assert_eq!(scene.nodes[1].mesh_index, 1);
    assert_eq!(scene.nodes[2].mesh_index, 0);
    assert_eq!(scene.nodes[3].mesh_index, 1);
    for node in scene.nodes.iter().filter(|node| node.has_mesh()) {
      assert!((node.mesh_index as usize) < scene.meshes.len());
    }
  }

  #[test]
  fn test_extra_meshes_get_own_nodes() {
    let mut body = node("Body", vec![0, 1, 2], vec![node("Hat", vec![], vec![])]);
    body.transform = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
    let import_scene = HalaImportScene {
      root: node("Root", vec![], vec![body]),
      meshes: (0..3).map(|i| triangle_mesh(&format!("mesh{}", i), 3)).collect(),
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();

    assert_eq!(names(&scene), vec!["Root", "Body", "Body_1", "Body_2", "Hat"]);
    assert_eq!(scene.nodes[0].children, vec![1, 2, 3]);
    assert_eq!(scene.nodes[1].children, vec![4]);
    assert_eq!(scene.nodes[2].transform, scene.nodes[1].transform);
    assert_eq!(scene.nodes[3].mesh_index, 2);
    assert!(scene.nodes[2].children.is_empty());
  }

  #[test]
  fn test_extra_meshes_on_root_stay_reachable() {
    let import_scene = HalaImportScene {
      root: node("Root", vec![0, 1], vec![]),
      meshes: (0..2).map(|i| triangle_mesh(&format!("mesh{}", i), 3)).collect(),
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();
    assert_eq!(names(&scene), vec!["Root", "Root_1"]);
    assert_eq!(scene.nodes[1].parent, Some(0));
    assert!(scene.nodes[1].transform.is_identity());
  }

  #[test]
  fn test_blend_material_enables_blending() {
    let mut mesh = triangle_mesh("glass", 3);
    mesh.material_index = 1;
    let import_scene = HalaImportScene {
      root: node("Root", vec![], vec![node("Glass", vec![0], vec![])]),
      meshes: vec![mesh],
      materials: vec![
        HalaImportMaterial { name: "opaque".to_owned(), alpha_mode: HalaImportAlphaMode::Opaque },
        HalaImportMaterial { name: "glass".to_owned(), alpha_mode: HalaImportAlphaMode::Blend },
      ],
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();
    assert!(!scene.nodes[0].is_blend_enabled);
    assert!(scene.nodes[1].is_blend_enabled);
    assert_eq!(scene.nodes[1].material_index, 1);
  }

  #[test]
  fn test_missing_attributes_are_generated() {
    let import_scene = HalaImportScene {
      root: node("Root", vec![0], vec![]),
      meshes: vec![triangle_mesh("mesh", 3)],
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();
    let mesh = &scene.meshes[0];
    assert_eq!(mesh.tex_coords, vec![Vec2::ZERO; 3]);
    assert_eq!(mesh.tangents, vec![Vec3::Z; 3]);
    assert!(mesh.normals.is_empty());
    assert_eq!(mesh.indices, vec![0, 1, 2]);
  }

  #[test]
  fn test_uv_set_is_copied() {
    let mut mesh = triangle_mesh("mesh", 3);
    mesh.tex_coords = Some(HalaImportUvSet {
      num_of_components: 2,
      coords: vec![Vec3::new(0.0, 1.0, 9.0), Vec3::new(1.0, 1.0, 9.0), Vec3::new(1.0, 0.0, 9.0)],
    });
    let import_scene = HalaImportScene {
      root: node("Root", vec![0], vec![]),
      meshes: vec![mesh],
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();
    assert_eq!(scene.meshes[0].tex_coords, vec![Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), Vec2::new(1.0, 0.0)]);
  }

  #[test]
  fn test_non_triangle_faces_are_skipped() {
    let mut mesh = triangle_mesh("mesh", 4);
    mesh.faces = vec![vec![0, 1, 2, 3], vec![0, 1], vec![1, 2, 3]];
    let import_scene = HalaImportScene {
      root: node("Root", vec![0], vec![]),
      meshes: vec![mesh],
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();
    assert_eq!(scene.meshes[0].indices, vec![1, 2, 3]);
  }

  fn skinned_scene() -> HalaImportScene {
    // Root(0) -> Armature(1) -> Hip(2) -> Spine(3) -> Head(4)
    //         -> Mesh(5)
    let armature = node("Armature", vec![], vec![
      node("Hip", vec![], vec![node("Spine", vec![], vec![node("Head", vec![], vec![])])]),
    ]);
    let mut mesh = triangle_mesh("skin", 3);
    mesh.bones = vec![
      HalaImportBone {
        name: "Spine".to_owned(),
        offset_matrix: Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)),
        weights: vec![weight(0, 1.0)],
      },
      HalaImportBone {
        name: "Hip".to_owned(),
        offset_matrix: Mat4::IDENTITY,
        weights: vec![weight(1, 0.5), weight(2, 0.0)],
      },
      HalaImportBone {
        name: "Head".to_owned(),
        offset_matrix: Mat4::from_translation(Vec3::new(0.0, -2.0, 0.0)),
        weights: vec![weight(1, 0.5), weight(2, 1.0)],
      },
    ];
    HalaImportScene {
      root: node("Root", vec![], vec![armature, node("Mesh", vec![0], vec![])]),
      meshes: vec![mesh],
      ..Default::default()
    }
  }

  #[test]
  fn test_skeleton_is_consolidated_and_rebased() {
    let scene = HalaSceneExtractor::extract(&skinned_scene()).unwrap();

    assert_eq!(scene.skeleton_roots, vec![2]);
    let mesh = &scene.meshes[0];
    assert!(mesh.is_skinned());
    assert_eq!(mesh.skeleton, Some(2));
    assert_eq!(scene.get_joints(2), vec![2, 3, 4]);
    for idx in 2..5 {
      assert!(scene.nodes[idx].is_joint());
      assert_eq!(scene.nodes[idx].skeleton, Some(2));
    }
    assert!(!scene.nodes[1].is_joint());
    assert_eq!(scene.nodes[3].inverse_bind_pose.unwrap().data[13], -1.0);

    assert_eq!(mesh.joints0[0], Vec4::new(1.0, 0.0, 0.0, 0.0));
    assert_eq!(mesh.weights0[0], Vec4::new(1.0, 0.0, 0.0, 0.0));
    assert_eq!(mesh.joints0[1], Vec4::new(0.0, 2.0, 0.0, 0.0));
    assert_eq!(mesh.weights0[1], Vec4::new(0.5, 0.5, 0.0, 0.0));
    assert_eq!(mesh.joints0[2], Vec4::new(2.0, 0.0, 0.0, 0.0));
  }

  #[test]
  fn test_extra_influences_are_dropped() {
    let mut import_scene = skinned_scene();
    import_scene.meshes[0].bones = ["Hip", "Spine", "Head", "Armature", "Root"].iter()
      .map(|name| HalaImportBone {
        name: name.to_string(),
        offset_matrix: Mat4::IDENTITY,
        weights: vec![weight(0, 0.2)],
      })
      .collect();
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();
    let mesh = &scene.meshes[0];
    assert_eq!(mesh.weights0[0], Vec4::splat(0.2));
    assert_eq!(scene.skeleton_roots, vec![0]);
    // Root is joint 0, Armature 1, Hip 2, Spine 3, Head 4; Root was dropped.
    assert_eq!(mesh.joints0[0], Vec4::new(2.0, 3.0, 4.0, 1.0));
  }

  #[test]
  fn test_unresolved_bone_fails() {
    let mut import_scene = skinned_scene();
    import_scene.meshes[0].bones[1].name = "Tail".to_owned();
    let result = HalaSceneExtractor::extract(&import_scene);
    assert!(result.is_err());
    assert!(result.unwrap_err().message().contains("Tail"));
  }

  #[test]
  fn test_blend_shapes_are_copied() {
    let mut mesh = triangle_mesh("face", 3);
    mesh.morph_method = 3;
    mesh.morph_targets = vec![
      HalaImportMorphTarget {
        name: "smile".to_owned(),
        positions: vec![Vec3::ONE; 3],
        normals: vec![Vec3::Y; 3],
        tangents: vec![],
      },
      HalaImportMorphTarget {
        name: "blink".to_owned(),
        positions: vec![Vec3::ONE; 3],
        ..Default::default()
      },
    ];
    let import_scene = HalaImportScene {
      root: node("Root", vec![0], vec![]),
      meshes: vec![mesh],
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();
    let mesh = &scene.meshes[0];
    assert_eq!(mesh.blend_shapes.len(), 2);
    assert_eq!(mesh.blend_shapes[0].name, "smile");
    assert_eq!(mesh.morph_method, 3);
    // 9 elements + 1: 4 x 4.
    assert_eq!(mesh.blend_shape_header, HalaBlendShapeHeader { width: 4, height: 4 });
  }

  #[test]
  fn test_cameras_and_lights() {
    let mut rig = node("Rig", vec![], vec![node("Camera", vec![], vec![]), node("Sun", vec![], vec![])]);
    rig.transform = Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0));
    let import_scene = HalaImportScene {
      root: node("Root", vec![], vec![rig]),
      cameras: vec![camera("Camera"), camera("Missing")],
      lights: vec![
        HalaImportLight { name: "Sun".to_owned(), diffuse_color: Vec3::new(1.0, 0.5, 0.25) },
        HalaImportLight { name: "Moon".to_owned(), diffuse_color: Vec3::ONE },
        HalaImportLight { name: "Rig".to_owned(), diffuse_color: Vec3::ONE },
      ],
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();

    assert_eq!(scene.cameras.len(), 1);
    let camera = &scene.cameras[0];
    assert!((camera.fov - 90.0).abs() < 1e-4);
    assert_eq!(camera.near, 0.5);
    assert_eq!(camera.far, 200.0);
    assert_eq!(camera.matrix.data[14], 10.0);

    assert_eq!(scene.lights.len(), 2);
    assert_eq!(scene.lights[0].diffuse_color, Vec3::new(1.0, 0.5, 0.25));
    assert!(scene.lights[0].matrix.is_identity());
    assert_eq!(scene.lights[1].matrix.data[14], 10.0);
  }

  fn vec_key(time: f64, value: Vec3) -> HalaImportKey<Vec3> {
    HalaImportKey { time, value }
  }

  #[test]
  fn test_constant_channels_are_dropped() {
    let import_scene = HalaImportScene {
      root: node("Root", vec![], vec![]),
      animations: vec![HalaImportAnimation {
        name: "walk".to_owned(),
        duration: 20.0,
        ticks_per_second: 10.0,
        channels: vec![
          HalaImportNodeChannel {
            node_name: "Root".to_owned(),
            position_keys: vec![
              vec_key(0.0, Vec3::new(1.0, 2.0, 3.0)),
              vec_key(10.0, Vec3::new(1.00001, 2.0, 3.0)),
              vec_key(20.0, Vec3::new(1.0, 1.99999, 3.0)),
            ],
            rotation_keys: vec![
              HalaImportKey { time: 0.0, value: Quat::IDENTITY },
              HalaImportKey { time: 10.0, value: Quat::from_rotation_y(1.0) },
              HalaImportKey { time: 20.0, value: Quat::from_rotation_y(2.0) },
            ],
            scaling_keys: vec![vec_key(0.0, Vec3::ONE)],
          },
          HalaImportNodeChannel {
            node_name: "Still".to_owned(),
            scaling_keys: vec![vec_key(0.0, Vec3::ONE), vec_key(20.0, Vec3::ONE)],
            ..Default::default()
          },
        ],
        ..Default::default()
      }],
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();

    let animation = &scene.animations[0];
    assert_eq!(animation.name, "walk");
    assert_eq!(animation.ticks_per_second, 10.0);
    assert_eq!(animation.node_animations.len(), 1);
    let track = &animation.node_animations[0];
    assert!(track.positions.is_empty());
    assert!(track.scales.is_empty());
    assert_eq!(track.rotations.len(), 3);
    assert_eq!(track.rotations[2].time, 20.0);
  }

  #[test]
  fn test_animation_names_and_morph_weights() {
    let morph_channel = HalaImportMorphChannel {
      name: "Face".to_owned(),
      keys: vec![
        HalaImportKey { time: 0.0, value: vec![0.0, 0.5, 1.0] },
        HalaImportKey { time: 5.0, value: vec![1.0, 0.5, 0.0] },
      ],
    };
    let import_scene = HalaImportScene {
      root: node("Root", vec![], vec![]),
      animations: vec![
        HalaImportAnimation { morph_channels: vec![morph_channel], ..Default::default() },
        HalaImportAnimation { name: "empty".to_owned(), ..Default::default() },
        HalaImportAnimation {
          channels: vec![HalaImportNodeChannel { node_name: "Root".to_owned(), ..Default::default() }],
          ..Default::default()
        },
      ],
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();

    assert_eq!(scene.animations.len(), 2);
    assert_eq!(scene.animations[0].name, "autogenerated-name#1");
    assert_eq!(scene.animations[1].name, "autogenerated-name#2");
    assert_eq!(scene.animations[0].ticks_per_second, 1000.0);

    let tracks = &scene.animations[0].node_animations;
    assert_eq!(tracks.len(), 3);
    assert!(tracks.iter().all(|track| track.node_name == "Face" && track.weights.len() == 2));
    assert_eq!(tracks[2].weights[0].value[0], 1.0);
    assert_eq!(tracks[2].weights[1].value[0], 0.0);
    assert!(scene.has_animations());
    assert!(!scene.animations[1].has_animations());
  }

  #[test]
  fn test_out_of_range_faces_are_skipped() {
    let mut mesh = triangle_mesh("mesh", 3);
    mesh.faces = vec![vec![0, 1, 70000], vec![0, 1, 2]];
    let import_scene = HalaImportScene {
      root: node("Root", vec![0], vec![]),
      meshes: vec![mesh],
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();
    assert_eq!(scene.meshes[0].indices, vec![0, 1, 2]);
  }

  #[test]
  fn test_skin_without_weights_is_dropped() {
    let mut import_scene = skinned_scene();
    for bone in import_scene.meshes[0].bones.iter_mut() {
      bone.weights.clear();
    }
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();
    let mesh = &scene.meshes[0];
    assert!(!mesh.is_skinned());
    assert!(mesh.joints0.is_empty());
    assert!(mesh.weights0.is_empty());
    assert!(scene.skeleton_roots.is_empty());

    let mut dli = Vec::new();
    let mut bin = Vec::new();
    HalaSceneSaver::convert(&scene, "skin.bin", &mut dli, &mut bin, &HalaExportOptions::default(), None).unwrap();
    let document: serde_json::Value = serde_json::from_slice(&dli).unwrap();
    let mesh = &document["meshes"][0];
    assert_eq!(mesh["attributes"], 1 | 2 | 8 | 16);
    assert!(mesh.get("joints0").is_none());
    assert!(mesh.get("skeleton").is_none());
  }

  #[test]
  fn test_meshes_of_one_armature_share_skeleton() {
    let mut import_scene = skinned_scene();
    // The first bone of the second mesh is the head, the first one of the other mesh the spine.
    let mut hat = triangle_mesh("hat", 3);
    hat.bones = vec![HalaImportBone {
      name: "Head".to_owned(),
      offset_matrix: Mat4::IDENTITY,
      weights: vec![weight(0, 1.0), weight(1, 1.0), weight(2, 1.0)],
    }];
    import_scene.meshes.push(hat);
    import_scene.root.children.push(node("Hat", vec![1], vec![]));

    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();
    assert_eq!(scene.skeleton_roots, vec![2]);
    assert_eq!(scene.meshes[0].skeleton, Some(2));
    assert_eq!(scene.meshes[1].skeleton, Some(2));
    assert_eq!(scene.meshes[1].joints0[0], Vec4::new(2.0, 0.0, 0.0, 0.0));

    let mut dli = Vec::new();
    let mut bin = Vec::new();
    HalaSceneSaver::convert(&scene, "skin.bin", &mut dli, &mut bin, &HalaExportOptions::default(), None).unwrap();
    let document: serde_json::Value = serde_json::from_slice(&dli).unwrap();
    assert_eq!(document["skeletons"], serde_json::json!([{ "node": "Hip" }]));
    assert_eq!(document["meshes"][0]["skeleton"], 0);
    assert_eq!(document["meshes"][1]["skeleton"], 0);
    assert_eq!(document["meshes"][1]["attributes"], 1 | 2 | 8 | 16 | 64 | 128);
  }

  #[test]
  fn test_deep_hierarchy() {
    const DEPTH: usize = 200_000;
    let mut chain = node("Leaf", vec![], vec![]);
    for i in (0..DEPTH).rev() {
      chain = node(&format!("Joint{}", i), vec![], vec![chain]);
    }
    let import_scene = HalaImportScene {
      root: chain,
      lights: vec![HalaImportLight { name: "Leaf".to_owned(), diffuse_color: Vec3::ONE }],
      ..Default::default()
    };
    let scene = HalaSceneExtractor::extract(&import_scene).unwrap();

    assert_eq!(scene.nodes.len(), DEPTH + 1);
    assert_eq!(scene.nodes[DEPTH].name, "Leaf");
    assert_eq!(scene.nodes[DEPTH].parent, Some(DEPTH as u32 - 1));
    assert_eq!(scene.lights.len(), 1);
    // Dropping the nested import nodes would recurse once per level.
    std::mem::forget(import_scene);
  }
}
