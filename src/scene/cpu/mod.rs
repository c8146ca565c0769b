pub mod node;
pub mod mesh;
pub mod light;
pub mod camera;
pub mod animation;
pub mod scene;

pub use scene::HalaScene;
