pub mod json_writer;
pub mod recorder;
pub mod options;
pub mod scene_saver;

pub use json_writer::HalaJsonWriter;
pub use recorder::{
  HalaAnimationRecorder,
  HalaFileRecorder,
  HalaMapRecorder,
};
pub use options::HalaExportOptions;
pub use scene_saver::HalaSceneSaver;
