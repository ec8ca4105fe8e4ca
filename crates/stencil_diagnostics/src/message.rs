use std::fmt;

use stencil_type::span::Span;

use super::diagnostic_report::{Diagnostic, Severity};

/// Invariant violations inside the engine. Every one of them aborts the run: the input was
/// type-checked upstream, so reaching one means a bug in the compiler, not in the program.
#[derive(Debug, Clone, PartialEq)]
pub enum InternalError {
  ShapeInDictionary {
    decl: String,
    ty: String,
    span: Span,
  },
  MissingTypeArguments {
    decl: String,
    span: Span,
  },
  TypeArgumentCount {
    decl: String,
    expected: usize,
    found: usize,
    span: Span,
  },
  NotGeneric {
    decl: String,
    span: Span,
  },
  NotConcrete {
    ty: String,
    span: Span,
  },
  TupleHasNoShape {
    ty: String,
    span: Span,
  },
  DictionarySlotOutOfRange {
    decl: String,
    slot: u32,
    start: u32,
    end: u32,
    span: Span,
  },
  UnrecordedDerivedType {
    decl: String,
    ty: String,
    span: Span,
  },
  MissingSubDictionary {
    decl: String,
    node: u32,
    span: Span,
  },
  MissingBody {
    decl: String,
    span: Span,
  },
  BodyImport {
    decl: String,
    message: String,
    span: Span,
  },
  MethodNotFound {
    owner: String,
    method: String,
    span: Span,
  },
  ConversionToNonInterface {
    from: String,
    to: String,
    span: Span,
  },
  TypeDepthExceeded {
    decl: String,
    ty: String,
    depth: usize,
    limit: usize,
    span: Span,
  },
  UnexpectedNode {
    decl: String,
    node: u32,
    kind: String,
    span: Span,
  },
}

impl fmt::Display for InternalError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      InternalError::ShapeInDictionary { decl, ty, .. } => {
        write!(f, "dictionary for '{}' requested with shape type '{}'", decl, ty)
      },
      InternalError::MissingTypeArguments { decl, .. } => {
        write!(f, "dictionary for '{}' requested without type arguments", decl)
      },
      InternalError::TypeArgumentCount {
        decl, expected, found, ..
      } => write!(
        f,
        "'{}' instantiated with {} type arguments, expected {}",
        decl, found, expected
      ),
      InternalError::NotGeneric { decl, .. } => {
        write!(f, "'{}' is not a generic declaration", decl)
      },
      InternalError::NotConcrete { ty, .. } => {
        write!(f, "cannot compute the shape of non-concrete type '{}'", ty)
      },
      InternalError::TupleHasNoShape { ty, .. } => {
        write!(f, "multi-value type '{}' has no shape", ty)
      },
      InternalError::DictionarySlotOutOfRange {
        decl, slot, start, end, ..
      } => write!(
        f,
        "dictionary read of slot {} in '{}' outside of [{}, {})",
        slot, decl, start, end
      ),
      InternalError::UnrecordedDerivedType { decl, ty, .. } => {
        write!(f, "type '{}' used in '{}' has no dictionary slot", ty, decl)
      },
      InternalError::MissingSubDictionary { decl, node, .. } => {
        write!(f, "no sub-dictionary entry for node {} in '{}'", node, decl)
      },
      InternalError::MissingBody { decl, .. } => {
        write!(f, "body of '{}' is not available", decl)
      },
      InternalError::BodyImport { decl, message, .. } => {
        write!(f, "failed to import body of '{}': {}", decl, message)
      },
      InternalError::MethodNotFound { owner, method, .. } => {
        write!(f, "type '{}' has no method '{}'", owner, method)
      },
      InternalError::ConversionToNonInterface { from, to, .. } => {
        write!(f, "conversion of '{}' to non-interface type '{}'", from, to)
      },
      InternalError::TypeDepthExceeded {
        decl, ty, depth, limit, ..
      } => write!(
        f,
        "type argument '{}' of '{}' nests {} levels deep (limit {})",
        ty, decl, depth, limit
      ),
      InternalError::UnexpectedNode { decl, node, kind, .. } => {
        write!(f, "unexpected {} node {} in '{}'", kind, node, decl)
      },
    }
  }
}

impl InternalError {
  pub fn primary_span(&self) -> Span {
    match self {
      InternalError::ShapeInDictionary { span, .. }
      | InternalError::MissingTypeArguments { span, .. }
      | InternalError::TypeArgumentCount { span, .. }
      | InternalError::NotGeneric { span, .. }
      | InternalError::NotConcrete { span, .. }
      | InternalError::TupleHasNoShape { span, .. }
      | InternalError::DictionarySlotOutOfRange { span, .. }
      | InternalError::UnrecordedDerivedType { span, .. }
      | InternalError::MissingSubDictionary { span, .. }
      | InternalError::MissingBody { span, .. }
      | InternalError::BodyImport { span, .. }
      | InternalError::MethodNotFound { span, .. }
      | InternalError::ConversionToNonInterface { span, .. }
      | InternalError::TypeDepthExceeded { span, .. }
      | InternalError::UnexpectedNode { span, .. } => span.clone(),
    }
  }

  pub fn code(&self) -> String {
    match self {
      InternalError::ShapeInDictionary { .. } => "ICE0001",
      InternalError::MissingTypeArguments { .. } => "ICE0002",
      InternalError::TypeArgumentCount { .. } => "ICE0003",
      InternalError::NotGeneric { .. } => "ICE0004",
      InternalError::NotConcrete { .. } => "ICE0005",
      InternalError::TupleHasNoShape { .. } => "ICE0006",
      InternalError::DictionarySlotOutOfRange { .. } => "ICE0007",
      InternalError::UnrecordedDerivedType { .. } => "ICE0008",
      InternalError::MissingSubDictionary { .. } => "ICE0009",
      InternalError::MissingBody { .. } => "ICE0010",
      InternalError::BodyImport { .. } => "ICE0011",
      InternalError::MethodNotFound { .. } => "ICE0012",
      InternalError::ConversionToNonInterface { .. } => "ICE0013",
      InternalError::TypeDepthExceeded { .. } => "ICE0014",
      InternalError::UnexpectedNode { .. } => "ICE0015",
    }
    .to_string()
  }

  pub fn report(&self) -> Diagnostic {
    Diagnostic::new(Severity::Error, self.to_string(), self.code(), self.primary_span())
      .with_note("internal compiler error in generic instantiation".to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn report_carries_code_and_message() {
    let diag = InternalError::ShapeInDictionary {
      decl: "Swap".to_string(),
      ty: "shape.i8".to_string(),
      span: Span::synthetic(),
    }
    .report();

    assert!(diag.is_error());
    assert_eq!(diag.error_code, "ICE0001");
    assert_eq!(diag.message, "dictionary for 'Swap' requested with shape type 'shape.i8'");
    assert_eq!(diag.notes.len(), 1);
  }
}
