use std::collections::BTreeMap;
use std::fs::File;
use std::io::{
  BufWriter,
  Write,
};
use std::path::{
  Path,
  PathBuf,
};

use crate::error::HalaExporterError;

/// Records a sequence of named binary streams, one at a time.
pub trait HalaAnimationRecorder {
  /// Start recording the stream with the given name.
  /// param name: The name of the stream.
  /// return: The result.
  fn begin(&mut self, name: &str) -> Result<(), HalaExporterError>;

  /// Get the sink of the stream being recorded.
  /// return: The sink.
  fn stream(&mut self) -> Result<&mut dyn Write, HalaExporterError>;

  /// Finish recording the current stream.
  /// return: The result.
  fn end(&mut self) -> Result<(), HalaExporterError>;
}

/// Records every stream to a file of the same name in a directory.
pub struct HalaFileRecorder {
  directory: PathBuf,
  current: Option<BufWriter<File>>,
}

impl HalaFileRecorder {
  /// Create a new file recorder.
  /// param directory: The directory of the files. An empty path is the working directory.
  /// return: The recorder.
  pub fn new<P: AsRef<Path>>(directory: P) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      current: None,
    }
  }
}

impl HalaAnimationRecorder for HalaFileRecorder {
  fn begin(&mut self, name: &str) -> Result<(), HalaExporterError> {
    if self.current.is_some() {
      return Err(HalaExporterError::new(&format!("Begin recording \"{}\" before the previous file ended.", name), None));
    }
    let path = self.directory.join(name);
    log::debug!("Recording animation file \"{:?}\".", path);
    let file = File::create(&path)
      .map_err(|err| HalaExporterError::new(&format!("Create file \"{:?}\" failed.", path), Some(Box::new(err))))?;
    self.current = Some(BufWriter::new(file));
    Ok(())
  }

  fn stream(&mut self) -> Result<&mut dyn Write, HalaExporterError> {
    match self.current.as_mut() {
      Some(writer) => Ok(writer as &mut dyn Write),
      None => Err(HalaExporterError::new("No animation file is being recorded.", None)),
    }
  }

  fn end(&mut self) -> Result<(), HalaExporterError> {
    let mut writer = self.current.take()
      .ok_or(HalaExporterError::new("End recording while no animation file is being recorded.", None))?;
    writer.flush()?;
    Ok(())
  }
}

/// Records every stream into a map from its name to its bytes.
/// A stream replaces an earlier one of the same name.
pub struct HalaMapRecorder<'a> {
  contents: &'a mut BTreeMap<String, Vec<u8>>,
  current: Option<(String, Vec<u8>)>,
}

impl<'a> HalaMapRecorder<'a> {
  /// Create a new map recorder.
  /// param contents: The map receiving the streams.
  /// return: The recorder.
  pub fn new(contents: &'a mut BTreeMap<String, Vec<u8>>) -> Self {
    Self {
      contents,
      current: None,
    }
  }
}

impl HalaAnimationRecorder for HalaMapRecorder<'_> {
  fn begin(&mut self, name: &str) -> Result<(), HalaExporterError> {
    if self.current.is_some() {
      return Err(HalaExporterError::new(&format!("Begin recording \"{}\" before the previous stream ended.", name), None));
    }
    self.current = Some((name.to_owned(), Vec::new()));
    Ok(())
  }

  fn stream(&mut self) -> Result<&mut dyn Write, HalaExporterError> {
    match self.current.as_mut() {
      Some((_, buffer)) => Ok(buffer as &mut dyn Write),
      None => Err(HalaExporterError::new("No animation stream is being recorded.", None)),
    }
  }

  fn end(&mut self) -> Result<(), HalaExporterError> {
    let (name, buffer) = self.current.take()
      .ok_or(HalaExporterError::new("End recording while no animation stream is being recorded.", None))?;
    self.contents.insert(name, buffer);
    Ok(())
  }
}
