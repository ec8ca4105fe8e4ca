//! Engine configuration.
//!
//! `EngineConfig` is the resolved form every component reads. It can be built in code or loaded
//! from a TOML document:
//!
//! ```toml
//! [engine]
//! dict_check = true
//! max_type_depth = 64
//! pointer_size = 8
//!
//! [debug]
//! verbose = 2
//! trace = ["shape", "dictionary"]
//! dump = ["dictionaries"]
//! ```

use std::{fmt, path::Path};

use serde::Deserialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpKind {
  Shapes,
  Instantiations,
  Dictionaries,
  Ir,
  Report,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugTrace {
  Shape,
  Analyze,
  Instantiate,
  Dictionary,
  Closure,
  Driver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  pub debug: bool,
  pub debug_trace: Vec<DebugTrace>,
  pub quiet: bool,
  pub verbose: u8,
  pub dump: Vec<DumpKind>,
  /// Emit a run-time check at the top of every instantiation that the dictionary matches its shapes.
  pub dict_check: bool,
  /// Deepest type argument a dictionary may be built for.
  pub max_type_depth: usize,
  /// Target pointer size in bytes (4 or 8).
  pub pointer_size: u64,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      debug: false,
      debug_trace: Vec::new(),
      quiet: false,
      verbose: 0,
      dump: Vec::new(),
      dict_check: false,
      max_type_depth: default_max_type_depth(),
      pointer_size: default_pointer_size(),
    }
  }
}

impl EngineConfig {
  /// Configuration with every log channel silenced.
  pub fn quiet() -> Self {
    Self {
      quiet: true,
      ..Self::default()
    }
  }

  pub fn wants_dump(
    &self,
    kind: DumpKind,
  ) -> bool {
    self.dump.contains(&kind)
  }

  pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
    let parsed: EngineToml = toml::from_str(text).map_err(|e| ConfigError::TomlParseError {
      message: e.to_string(),
    })?;
    parsed.resolve()
  }

  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
      path: path.display().to_string(),
      source,
    })?;
    Self::from_toml_str(&text)
  }
}

/// Root structure of an engine TOML file.
#[derive(Debug, Deserialize, Default)]
struct EngineToml {
  #[serde(default)]
  engine: EngineSection,

  #[serde(default)]
  debug: DebugSection,
}

/// The `[engine]` section.
#[derive(Debug, Deserialize)]
struct EngineSection {
  #[serde(default)]
  dict_check: bool,

  #[serde(default = "default_max_type_depth")]
  max_type_depth: usize,

  #[serde(default = "default_pointer_size")]
  pointer_size: u64,
}

impl Default for EngineSection {
  fn default() -> Self {
    Self {
      dict_check: false,
      max_type_depth: default_max_type_depth(),
      pointer_size: default_pointer_size(),
    }
  }
}

/// The `[debug]` section.
#[derive(Debug, Deserialize, Default)]
struct DebugSection {
  #[serde(default)]
  enabled: bool,

  #[serde(default)]
  quiet: bool,

  #[serde(default)]
  verbose: u8,

  #[serde(default)]
  trace: Vec<DebugTrace>,

  #[serde(default)]
  dump: Vec<DumpKind>,
}

fn default_max_type_depth() -> usize {
  64
}

fn default_pointer_size() -> u64 {
  8
}

impl EngineToml {
  fn resolve(self) -> Result<EngineConfig, ConfigError> {
    if self.engine.pointer_size != 4 && self.engine.pointer_size != 8 {
      return Err(ConfigError::InvalidPointerSize {
        value: self.engine.pointer_size,
      });
    }

    if self.engine.max_type_depth == 0 {
      return Err(ConfigError::InvalidTypeDepth);
    }

    Ok(EngineConfig {
      debug: self.debug.enabled,
      debug_trace: self.debug.trace,
      quiet: self.debug.quiet,
      verbose: self.debug.verbose,
      dump: self.debug.dump,
      dict_check: self.engine.dict_check,
      max_type_depth: self.engine.max_type_depth,
      pointer_size: self.engine.pointer_size,
    })
  }
}

#[derive(Debug)]
pub enum ConfigError {
  IoError { path: String, source: std::io::Error },

  TomlParseError { message: String },

  /// Only 4- and 8-byte pointers are supported.
  InvalidPointerSize { value: u64 },

  /// `max_type_depth` must be at least 1.
  InvalidTypeDepth,
}

impl fmt::Display for ConfigError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      ConfigError::IoError { path, source } => {
        write!(f, "failed to read '{}': {}", path, source)
      },
      ConfigError::TomlParseError { message } => {
        write!(f, "invalid engine configuration: {}", message)
      },
      ConfigError::InvalidPointerSize { value } => {
        write!(f, "pointer_size must be 4 or 8, got {}", value)
      },
      ConfigError::InvalidTypeDepth => {
        write!(f, "max_type_depth must be at least 1")
      },
    }
  }
}

impl std::error::Error for ConfigError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ConfigError::IoError { source, .. } => Some(source),
      _ => None,
    }
  }
}
