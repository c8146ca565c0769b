/// The interpolation mode of a key frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HalaInterpolation(u8);
impl HalaInterpolation {
  pub const LINEAR: Self = Self(1);

  pub fn to_u8(&self) -> u8 {
    self.0
  }
}

/// A key frame. Quaternions use all four values, vectors three and weights one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalaKeyFrame {
  pub time: f32,
  pub value: [f32; 4],
  pub interpolation: HalaInterpolation,
}

impl HalaKeyFrame {
  pub fn new(time: f32, value: [f32; 4]) -> Self {
    Self {
      time,
      value,
      interpolation: HalaInterpolation::LINEAR,
    }
  }
}

/// The animated properties of one node.
#[derive(Clone, Debug, Default)]
pub struct HalaNodeAnimation {
  pub node_name: String,
  pub rotations: Vec<HalaKeyFrame>,
  pub positions: Vec<HalaKeyFrame>,
  pub scales: Vec<HalaKeyFrame>,
  pub weights: Vec<HalaKeyFrame>,
}

impl HalaNodeAnimation {
  pub fn new(node_name: &str) -> Self {
    Self {
      node_name: node_name.to_owned(),
      ..Default::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.rotations.is_empty() && self.positions.is_empty() && self.scales.is_empty() && self.weights.is_empty()
  }
}

/// An animation clip.
#[derive(Clone, Debug)]
pub struct HalaAnimation {
  pub name: String,
  /// The duration in ticks.
  pub duration: f32,
  pub ticks_per_second: f32,
  pub node_animations: Vec<HalaNodeAnimation>,
}

impl HalaAnimation {
  /// Check if any node animation has key frames.
  /// return: True if the animation has key frames.
  pub fn has_animations(&self) -> bool {
    self.node_animations.iter().any(|node_animation| !node_animation.is_empty())
  }

  /// Get the duration in seconds.
  /// return: The duration in seconds.
  pub fn duration_in_seconds(&self) -> f32 {
    self.duration / self.ticks_per_second
  }

  /// Get the position of the key frame within the animation.
  /// An animation without duration keeps all its key frames at the start.
  /// param key_frame: The key frame.
  /// return: The progress from 0 to 1.
  pub fn progress(&self, key_frame: &HalaKeyFrame) -> f32 {
    if self.duration <= 0.0 {
      0.0
    } else {
      key_frame.time / self.duration
    }
  }
}
