use std::path::Path;

use crate::error::HalaExporterError;
use super::node::HalaNode;
use super::mesh::HalaMesh;
use super::light::HalaLight;
use super::camera::HalaCamera;
use super::animation::HalaAnimation;
use super::super::loader::{
  HalaGltfLoader,
  HalaSceneExtractor,
};

/// A scene owns all nodes and meshes; every cross reference is a node index.
#[derive(Debug, Default)]
pub struct HalaScene {
  pub nodes: Vec<HalaNode>,
  pub meshes: Vec<HalaMesh>,
  /// Indices of the skeleton root nodes.
  pub skeleton_roots: Vec<u32>,
  pub cameras: Vec<HalaCamera>,
  pub lights: Vec<HalaLight>,
  pub animations: Vec<HalaAnimation>,
}

/// The implementation of the scene.
impl HalaScene {
  /// Create a new scene from a glTF file.
  /// param path: The path to the glTF file.
  /// return: The scene.
  pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, HalaExporterError> {
    // Check the file extension.
    let path = path.as_ref();
    let extension = path.extension()
      .ok_or(HalaExporterError::new(&format!("Get file \"{:?}\" extension failed.", path), None))?;
    let import_scene = match extension.to_str() {
      // glTF file.
      Some("gltf") | Some("glb") => HalaGltfLoader::load(path),
      // Unsupported file.
      _ => Err(HalaExporterError::new(&format!("Unsupported file \"{:?}\".", path), None)),
    }?;
    let scene = HalaSceneExtractor::extract(&import_scene)?;

    log::debug!("A HalaScene created with {} nodes and {} meshes.", scene.nodes.len(), scene.meshes.len());
    Ok(scene)
  }

  /// Add a node to the scene and link it to its parent.
  /// param node: The node.
  /// return: The index assigned to the node.
  pub fn add_node(&mut self, mut node: HalaNode) -> u32 {
    let index = self.nodes.len() as u32;
    node.index = index;
    if let Some(parent) = node.parent {
      self.nodes[parent as usize].children.push(index);
    }
    self.nodes.push(node);
    index
  }

  /// Find the first node with the given name.
  /// param name: The name.
  /// return: The node index.
  pub fn find_node_named(&self, name: &str) -> Option<u32> {
    self.nodes.iter().find(|node| node.name == name).map(|node| node.index)
  }

  /// Find the position of a skeleton root in the skeleton list.
  /// param root: The skeleton root node index.
  /// return: The skeleton id.
  pub fn find_skeleton_id(&self, root: u32) -> Option<u32> {
    self.skeleton_roots.iter().position(|&idx| idx == root).map(|pos| pos as u32)
  }

  /// Check if any animation has key frames.
  /// return: True if any animation has key frames.
  pub fn has_animations(&self) -> bool {
    self.animations.iter().any(|animation| animation.has_animations())
  }

  /// Visit the subtree depth first, parents before children.
  /// param root: The root of the subtree.
  /// param visitor: Called for each node.
  pub fn visit<F>(&self, root: u32, visitor: F)
  where
    F: FnMut(&HalaNode),
  {
    self.visit_until(root, visitor, |_| false);
  }

  /// Visit the subtree depth first, not descending below nodes which satisfy the stop predicate.
  /// param root: The root of the subtree.
  /// param visitor: Called for each node.
  /// param stop: Whether the children of the node should be skipped.
  pub fn visit_until<F, P>(&self, root: u32, mut visitor: F, stop: P)
  where
    F: FnMut(&HalaNode),
    P: Fn(&HalaNode) -> bool,
  {
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
      let node = &self.nodes[idx as usize];
      visitor(node);
      if !stop(node) {
        stack.extend(node.children.iter().rev().copied());
      }
    }
  }

  /// Visit the subtree depth first with mutable access to each node.
  /// param root: The root of the subtree.
  /// param visitor: Called for each node.
  pub fn visit_mut<F>(&mut self, root: u32, mut visitor: F)
  where
    F: FnMut(&mut HalaNode),
  {
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
      let node = &mut self.nodes[idx as usize];
      visitor(node);
      stack.extend(node.children.iter().rev().copied());
    }
  }

  /// Get the joints of the skeleton in depth first order.
  /// param root: The skeleton root.
  /// return: The joint node indices.
  pub fn get_joints(&self, root: u32) -> Vec<u32> {
    let mut joints = Vec::new();
    self.visit(root, |node| {
      if node.is_joint() {
        joints.push(node.index);
      }
    });
    joints
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::scene::matrix::HalaMatrix;

  fn build_tree() -> HalaScene {
    // root
    // +- a
    // |  +- a0
    // |  +- a1
    // +- b
    //    +- b0
    let mut scene = HalaScene::default();
    let root = scene.add_node(HalaNode::new("root", None, HalaMatrix::IDENTITY));
    let a = scene.add_node(HalaNode::new("a", Some(root), HalaMatrix::IDENTITY));
    scene.add_node(HalaNode::new("a0", Some(a), HalaMatrix::IDENTITY));
    scene.add_node(HalaNode::new("a1", Some(a), HalaMatrix::IDENTITY));
    let b = scene.add_node(HalaNode::new("b", Some(root), HalaMatrix::IDENTITY));
    scene.add_node(HalaNode::new("b0", Some(b), HalaMatrix::IDENTITY));
    scene
  }

  #[test]
  fn test_add_node_links_children() {
    let scene = build_tree();
    assert_eq!(scene.nodes[0].children, vec![1, 4]);
    assert_eq!(scene.nodes[1].children, vec![2, 3]);
    assert_eq!(scene.nodes[5].parent, Some(4));
    assert!(scene.nodes.iter().enumerate().all(|(i, node)| node.index == i as u32));
  }

  #[test]
  fn test_visit_is_pre_order() {
    let scene = build_tree();
    let mut names = Vec::new();
    scene.visit(0, |node| names.push(node.name.clone()));
    assert_eq!(names, vec!["root", "a", "a0", "a1", "b", "b0"]);
  }

  #[test]
  fn test_visit_until_skips_subtree() {
    let scene = build_tree();
    let mut names = Vec::new();
    scene.visit_until(0, |node| names.push(node.name.clone()), |node| node.name == "a");
    assert_eq!(names, vec!["root", "a", "b", "b0"]);
  }

  #[test]
  fn test_get_joints_depth_first() {
    let mut scene = build_tree();
    for idx in [5usize, 2, 1] {
      scene.nodes[idx].inverse_bind_pose = Some(HalaMatrix::IDENTITY);
    }
    assert_eq!(scene.get_joints(0), vec![1, 2, 5]);
    assert_eq!(scene.get_joints(0), scene.get_joints(0));
    assert_eq!(scene.get_joints(4), vec![5]);
  }

  #[test]
  fn test_find_node_named_returns_first() {
    let mut scene = build_tree();
    scene.add_node(HalaNode::new("a", None, HalaMatrix::IDENTITY));
    assert_eq!(scene.find_node_named("a"), Some(1));
    assert_eq!(scene.find_node_named("missing"), None);
  }
}
