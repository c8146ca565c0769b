use crate::scene::cpu::HalaScene;
use crate::scene::cpu::mesh::{
  JOINT_SENTINEL,
  MAX_WEIGHTS_PER_VERTEX,
};

/// Reduce the skeleton root candidates to the topmost ones and point every
/// node of each skeleton at its root.
/// A candidate is dropped if any of its ancestors is also a candidate.
/// param scene: The scene.
/// param candidates: The candidate node indices, sorted ascending.
/// return: The skeleton roots, sorted ascending.
pub fn consolidate_skeletons(scene: &mut HalaScene, candidates: &[u32]) -> Vec<u32> {
  let roots = candidates.iter()
    .copied()
    .filter(|&candidate| {
      let mut ancestor = scene.nodes[candidate as usize].parent;
      while let Some(idx) = ancestor {
        if candidates.binary_search(&idx).is_ok() {
          return false;
        }
        ancestor = scene.nodes[idx as usize].parent;
      }
      true
    })
    .collect::<Vec<_>>();

  for &root in roots.iter() {
    scene.visit_mut(root, |node| {
      node.skeleton = Some(root);
    });
  }

  roots
}

/// Rewrite the joint indices of all skinned meshes from scene node indices to
/// positions in the depth first joint order of their skeleton.
/// Must run after the skeletons have been consolidated.
/// param scene: The scene.
pub fn convert_scene_based_indices_to_skeleton_based(scene: &mut HalaScene) {
  let num_of_nodes = scene.nodes.len();
  for mesh_index in 0..scene.meshes.len() {
    let Some(first_bone) = scene.meshes[mesh_index].skeleton else {
      continue;
    };

    // The first bone seen is not necessarily the root.
    let root = scene.nodes[first_bone as usize].skeleton.unwrap_or(first_bone);
    scene.meshes[mesh_index].skeleton = Some(root);

    let joints = scene.get_joints(root);
    let mut joint_ids = vec![None; num_of_nodes];
    for (joint_id, &node_index) in joints.iter().enumerate() {
      joint_ids[node_index as usize] = Some(joint_id as u32);
    }

    let mesh = &mut scene.meshes[mesh_index];
    for (vertex, (joints, weights)) in mesh.joints0.iter_mut().zip(mesh.weights0.iter()).enumerate() {
      for slot in 0..MAX_WEIGHTS_PER_VERTEX {
        if joints[slot] == JOINT_SENTINEL {
          break;
        }
        // Unused slot.
        if weights[slot] == 0.0 {
          continue;
        }
        let node_index = joints[slot] as usize;
        joints[slot] = match joint_ids.get(node_index).copied().flatten() {
          Some(joint_id) => joint_id as f32,
          None => {
            log::warn!("Vertex {} references node {} which is not a joint of skeleton {}.", vertex, node_index, root);
            0.0
          },
        };
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::Vec4;
  use crate::scene::HalaMatrix;
  use crate::scene::cpu::node::HalaNode;
  use crate::scene::cpu::mesh::HalaMesh;

  // root(0) -> hip(1) -> spine(2) -> head(3)
  //                   -> leg(4)
  fn build_skeleton() -> HalaScene {
    let mut scene = HalaScene::default();
    let root = scene.add_node(HalaNode::new("root", None, HalaMatrix::IDENTITY));
    let hip = scene.add_node(HalaNode::new("hip", Some(root), HalaMatrix::IDENTITY));
    let spine = scene.add_node(HalaNode::new("spine", Some(hip), HalaMatrix::IDENTITY));
    scene.add_node(HalaNode::new("head", Some(spine), HalaMatrix::IDENTITY));
    scene.add_node(HalaNode::new("leg", Some(hip), HalaMatrix::IDENTITY));
    for idx in 1..5 {
      scene.nodes[idx].inverse_bind_pose = Some(HalaMatrix::IDENTITY);
    }
    scene
  }

  #[test]
  fn test_consolidate_keeps_topmost() {
    let mut scene = build_skeleton();
    for idx in [2u32, 3, 4] {
      scene.nodes[idx as usize].skeleton = Some(idx);
    }
    scene.nodes[1].skeleton = Some(1);
    let roots = consolidate_skeletons(&mut scene, &[1, 2, 3, 4]);
    assert_eq!(roots, vec![1]);
    for idx in 1..5 {
      assert_eq!(scene.nodes[idx].skeleton, Some(1));
    }
    assert_eq!(scene.nodes[0].skeleton, None);
    assert!(scene.nodes[1].is_skeleton_root());
  }

  #[test]
  fn test_consolidate_is_idempotent() {
    let mut scene = build_skeleton();
    let roots = consolidate_skeletons(&mut scene, &[2, 4]);
    assert_eq!(roots, vec![2, 4]);
    let before = scene.nodes.iter().map(|node| node.skeleton).collect::<Vec<_>>();
    let again = consolidate_skeletons(&mut scene, &roots);
    assert_eq!(again, roots);
    let after = scene.nodes.iter().map(|node| node.skeleton).collect::<Vec<_>>();
    assert_eq!(before, after);
  }

  #[test]
  fn test_rebase_round_trip() {
    let mut scene = build_skeleton();
    consolidate_skeletons(&mut scene, &[1, 3]);
    let original = vec![
      Vec4::new(3.0, 4.0, 0.0, 0.0),
      Vec4::new(1.0, 2.0, 3.0, 4.0),
      Vec4::new(2.0, JOINT_SENTINEL, 0.0, 0.0),
    ];
    scene.meshes.push(HalaMesh {
      joints0: original.clone(),
      weights0: vec![
        Vec4::new(0.5, 0.5, 0.0, 0.0),
        Vec4::new(0.25, 0.25, 0.25, 0.25),
        Vec4::new(1.0, 0.0, 0.0, 0.0),
      ],
      // The first bone seen was the head.
      skeleton: Some(3),
      ..Default::default()
    });

    convert_scene_based_indices_to_skeleton_based(&mut scene);

    let mesh = &scene.meshes[0];
    assert_eq!(mesh.skeleton, Some(1));
    let joints = scene.get_joints(1);
    assert_eq!(joints, vec![1, 2, 3, 4]);
    for (rebased, (before, weights)) in mesh.joints0.iter().zip(original.iter().zip(mesh.weights0.iter())) {
      for slot in 0..4 {
        if before[slot] == JOINT_SENTINEL {
          assert_eq!(rebased[slot], JOINT_SENTINEL);
          break;
        }
        if weights[slot] > 0.0 {
          assert_eq!(joints[rebased[slot] as usize], before[slot] as u32);
        }
      }
    }
    assert_eq!(mesh.joints0[0], Vec4::new(2.0, 3.0, 0.0, 0.0));
  }
}
