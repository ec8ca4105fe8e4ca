use std::{collections::HashMap, path::PathBuf};

use crate::{BytePosition, Id, Store};

pub type FileId = Id<SourceFile>;

impl FileId {
  /// Sentinel FileId for engine-synthesized code (instantiations, thunks).
  pub const SYNTHETIC: FileId = FileId::new(u32::MAX);
}

#[derive(Default, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SourceFile {
  pub path: PathBuf,
  pub text: String,
  pub line_starts: Vec<BytePosition>,
}

impl SourceFile {
  pub fn new(
    path: PathBuf,
    text: String,
  ) -> Self {
    let line_starts = compute_line_starts(&text);
    Self {
      path,
      text,
      line_starts,
    }
  }
}

impl std::fmt::Display for Id<SourceFile> {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    if *self == FileId::SYNTHETIC {
      return write!(f, "<synthetic>");
    }
    write!(f, "(file id: {})", self.index())
  }
}

#[derive(Default)]
pub struct SourceMap {
  files: Store<SourceFile>,
  by_path: HashMap<PathBuf, FileId>,
}

impl SourceMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_file<P: Into<PathBuf>>(
    &mut self,
    path: P,
    text: String,
  ) -> FileId {
    let path = path.into();
    if let Some(id) = self.by_path.get(&path) {
      return *id;
    }

    let id = self.files.alloc(SourceFile::new(path.clone(), text));
    self.by_path.insert(path, id);
    id
  }

  /// Returns `None` for synthetic or unknown files.
  pub fn get(
    &self,
    id: &FileId,
  ) -> Option<&SourceFile> {
    if *id == FileId::SYNTHETIC || id.index() as usize >= self.files.len() {
      return None;
    }
    Some(self.files.get(id))
  }

  /// 1-based line and column of `pos` within `file`.
  pub fn line_col(
    &self,
    file: &FileId,
    pos: BytePosition,
  ) -> (u32, u32) {
    let Some(file) = self.get(file) else {
      return (0, 0);
    };

    let line = match file.line_starts.binary_search(&pos) {
      Ok(line) => line,
      Err(next) => next.saturating_sub(1),
    };
    let start = file.line_starts.get(line).map(|p| p.0).unwrap_or(0);

    (line as u32 + 1, pos.0.saturating_sub(start) + 1)
  }
}

fn compute_line_starts(text: &str) -> Vec<BytePosition> {
  let mut starts = vec![BytePosition(0)];
  for (i, b) in text.bytes().enumerate() {
    if b == b'\n' {
      starts.push(BytePosition(i as u32 + 1));
    }
  }
  starts
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn line_col_is_one_based() {
    let mut sm = SourceMap::new();
    let file = sm.add_file("pair.src", "type Pair\nfunc Swap\n".to_string());

    assert_eq!(sm.line_col(&file, BytePosition(0)), (1, 1));
    assert_eq!(sm.line_col(&file, BytePosition(10)), (2, 1));
    assert_eq!(sm.line_col(&file, BytePosition(15)), (2, 6));
    assert_eq!(sm.line_col(&FileId::SYNTHETIC, BytePosition(3)), (0, 0));
  }
}
