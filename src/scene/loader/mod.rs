pub mod import_scene;
pub mod gltf_loader;
pub mod skeleton;
pub mod extractor;

pub use import_scene::HalaImportScene;
pub use gltf_loader::HalaGltfLoader;
pub use extractor::HalaSceneExtractor;
