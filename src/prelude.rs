pub use crate::error::HalaExporterError;
pub use crate::scene::HalaMatrix;
pub use crate::scene::cpu::HalaScene;
pub use crate::scene::loader::{
  HalaImportScene,
  HalaGltfLoader,
  HalaSceneExtractor,
};
pub use crate::exporter::{
  HalaExportOptions,
  HalaSceneSaver,
  HalaAnimationRecorder,
  HalaFileRecorder,
  HalaMapRecorder,
};
