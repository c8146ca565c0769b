use std::io::Write;

use crate::error::HalaExporterError;

/// The kind of an open scope; the value is its closing character.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum _ScopeType {
  Array = b']' as isize,
  Object = b'}' as isize,
}

#[derive(Clone, Copy, Debug)]
struct _Scope {
  scope_type: _ScopeType,
  is_one_liner: bool,
  needs_comma: bool,
}

/// A scalar value of the document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HalaJsonValue<'a> {
  Null,
  String(&'a str),
  Int(i64),
  UInt(u64),
  Double(f64),
  Bool(bool),
}

impl<'a> From<&'a str> for HalaJsonValue<'a> {
  fn from(value: &'a str) -> Self {
    Self::String(value)
  }
}

impl From<i32> for HalaJsonValue<'_> {
  fn from(value: i32) -> Self {
    Self::Int(value as i64)
  }
}

impl From<u32> for HalaJsonValue<'_> {
  fn from(value: u32) -> Self {
    Self::UInt(value as u64)
  }
}

impl From<f32> for HalaJsonValue<'_> {
  fn from(value: f32) -> Self {
    Self::Double(value as f64)
  }
}

impl From<f64> for HalaJsonValue<'_> {
  fn from(value: f64) -> Self {
    Self::Double(value)
  }
}

impl From<bool> for HalaJsonValue<'_> {
  fn from(value: bool) -> Self {
    Self::Bool(value)
  }
}

/// Writes a JSON document straight into a stream, taking care of line breaks,
/// indentation and commas.
///
/// Every object or array is either written on one line, `[ 1, 2 ]`, or with one
/// child per line, chosen when it is opened. The choice only affects its
/// immediate children.
///
/// Names must be given inside objects and omitted inside arrays and at the
/// document root.
pub struct HalaJsonWriter<W: Write> {
  stream: W,
  scopes: Vec<_Scope>,
  indentation: String,
}

/// The implementation of the JSON writer.
impl<W: Write> HalaJsonWriter<W> {
  /// Create a new writer. Nothing is written yet.
  /// param stream: The output stream.
  /// param indentation: The string written once per nesting level.
  /// return: The writer.
  pub fn new(stream: W, indentation: &str) -> Self {
    Self {
      stream,
      scopes: Vec::new(),
      indentation: indentation.to_owned(),
    }
  }

  /// Open an object scope.
  /// param name: The key, required iff the parent scope is an object.
  /// param one_liner: Whether the children are written on one line.
  /// return: The result.
  pub fn write_object(&mut self, name: Option<&str>, one_liner: bool) -> Result<(), HalaExporterError> {
    self.open_scope(_ScopeType::Object, name, one_liner)
  }

  /// Open an array scope.
  /// param name: The key, required iff the parent scope is an object.
  /// param one_liner: Whether the children are written on one line.
  /// return: The result.
  pub fn write_array(&mut self, name: Option<&str>, one_liner: bool) -> Result<(), HalaExporterError> {
    self.open_scope(_ScopeType::Array, name, one_liner)
  }

  /// Write a scalar value.
  /// param name: The key, required iff the parent scope is an object.
  /// param value: The value.
  /// return: The result.
  pub fn write_value<'a, V: Into<HalaJsonValue<'a>>>(&mut self, name: Option<&str>, value: V) -> Result<(), HalaExporterError> {
    if self.scopes.is_empty() {
      return Err(HalaExporterError::new("Write a value without an open scope.", None));
    }
    self.write_preamble(name)?;
    self.mark_child();

    match value.into() {
      HalaJsonValue::Null => write!(self.stream, "null")?,
      HalaJsonValue::String(value) => Self::write_string(&mut self.stream, value)?,
      HalaJsonValue::Int(value) => write!(self.stream, "{}", value)?,
      HalaJsonValue::UInt(value) => write!(self.stream, "{}", value)?,
      HalaJsonValue::Double(value) => write!(self.stream, "{}", format_double(value))?,
      HalaJsonValue::Bool(value) => write!(self.stream, "{}", value)?,
    }
    Ok(())
  }

  /// Close the innermost open scope.
  /// return: The result.
  pub fn close_scope(&mut self) -> Result<(), HalaExporterError> {
    let scope = self.scopes.pop()
      .ok_or(HalaExporterError::new("Close a scope while none is open.", None))?;
    if scope.needs_comma {
      self.new_line(scope.is_one_liner)?;
    }
    self.indent(scope.is_one_liner)?;
    self.stream.write_all(&[scope.scope_type as u8])?;
    Ok(())
  }

  /// Write raw text after the document, e.g. the final line break.
  /// param text: The text.
  /// return: The result.
  pub fn write_raw(&mut self, text: &str) -> Result<(), HalaExporterError> {
    self.stream.write_all(text.as_bytes())?;
    Ok(())
  }

  fn open_scope(&mut self, scope_type: _ScopeType, name: Option<&str>, one_liner: bool) -> Result<(), HalaExporterError> {
    self.write_preamble(name)?;
    self.mark_child();
    self.scopes.push(_Scope {
      scope_type,
      is_one_liner: one_liner,
      needs_comma: false,
    });
    let opening = match scope_type {
      _ScopeType::Array => b'[',
      _ScopeType::Object => b'{',
    };
    self.stream.write_all(&[opening])?;
    self.new_line(one_liner)
  }

  fn mark_child(&mut self) {
    if let Some(scope) = self.scopes.last_mut() {
      scope.needs_comma = true;
    }
  }

  fn write_preamble(&mut self, name: Option<&str>) -> Result<(), HalaExporterError> {
    let parent = self.scopes.last().copied();
    match (parent.map(|scope| scope.scope_type), name) {
      (Some(_ScopeType::Object), None) => {
        return Err(HalaExporterError::new("A child of an object requires a name.", None));
      },
      (Some(_ScopeType::Array), Some(name)) | (None, Some(name)) => {
        return Err(HalaExporterError::new(&format!("Name \"{}\" is not allowed outside of an object.", name), None));
      },
      _ => {},
    }

    if let Some(parent) = parent {
      if parent.needs_comma {
        self.stream.write_all(b",")?;
        self.new_line(parent.is_one_liner)?;
      }
    }
    self.indent(parent.map_or(false, |scope| scope.is_one_liner))?;
    if let Some(name) = name {
      Self::write_string(&mut self.stream, name)?;
      self.stream.write_all(b": ")?;
    }
    Ok(())
  }

  fn indent(&mut self, one_liner: bool) -> Result<(), HalaExporterError> {
    if !one_liner {
      for _ in 0..self.scopes.len() {
        self.stream.write_all(self.indentation.as_bytes())?;
      }
    }
    Ok(())
  }

  fn new_line(&mut self, one_liner: bool) -> Result<(), HalaExporterError> {
    self.stream.write_all(if one_liner { b" " } else { b"\n" })?;
    Ok(())
  }

  fn write_string(stream: &mut W, value: &str) -> Result<(), HalaExporterError> {
    serde_json::to_writer(&mut *stream, value)
      .map_err(|err| HalaExporterError::new(&format!("Write string \"{}\" failed.", value), Some(Box::new(err))))
  }
}

/// Format the number with six significant digits, dropping trailing zeros, and
/// switching to scientific notation for exponents below -4 or from 6 on.
/// Non-finite numbers have no JSON form and become null.
/// param value: The number.
/// return: The text.
pub fn format_double(value: f64) -> String {
  const PRECISION: i32 = 6;

  if !value.is_finite() {
    return "null".to_owned();
  }
  if value == 0.0 {
    return if value.is_sign_negative() { "-0".to_owned() } else { "0".to_owned() };
  }

  // The exponent after rounding to the precision decides the notation.
  let scientific = format!("{:.*e}", (PRECISION - 1) as usize, value);
  let (mantissa, exponent) = match scientific.split_once('e') {
    Some((mantissa, exponent)) => (mantissa.to_owned(), exponent.parse::<i32>().unwrap_or(0)),
    None => (scientific.clone(), 0),
  };

  if exponent < -4 || exponent >= PRECISION {
    format!(
      "{}e{}{:02}",
      strip_trailing_zeros(&mantissa),
      if exponent < 0 { '-' } else { '+' },
      exponent.abs(),
    )
  } else {
    let fixed = format!("{:.*}", (PRECISION - 1 - exponent) as usize, value);
    strip_trailing_zeros(&fixed).to_owned()
  }
}

fn strip_trailing_zeros(text: &str) -> &str {
  if text.contains('.') {
    text.trim_end_matches('0').trim_end_matches('.')
  } else {
    text
  }
}
