use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperation {
  // Arithmetic
  Add,
  Sub,
  Mul,
  Div,
  Mod,

  // Logical
  And,
  Or,

  // Comparison
  Equal,
  NotEqual,
  LessThan,
  LessEqual,
  GreaterThan,
  GreaterEqual,
}

impl BinaryOperation {
  pub fn is_equality(&self) -> bool {
    matches!(self, BinaryOperation::Equal | BinaryOperation::NotEqual)
  }

  pub fn symbol(&self) -> &'static str {
    match self {
      BinaryOperation::Add => "+",
      BinaryOperation::Sub => "-",
      BinaryOperation::Mul => "*",
      BinaryOperation::Div => "/",
      BinaryOperation::Mod => "%",
      BinaryOperation::And => "&&",
      BinaryOperation::Or => "||",
      BinaryOperation::Equal => "==",
      BinaryOperation::NotEqual => "!=",
      BinaryOperation::LessThan => "<",
      BinaryOperation::LessEqual => "<=",
      BinaryOperation::GreaterThan => ">",
      BinaryOperation::GreaterEqual => ">=",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperation {
  Not,
  Neg,
}

impl UnaryOperation {
  pub fn symbol(&self) -> &'static str {
    match self {
      UnaryOperation::Not => "!",
      UnaryOperation::Neg => "-",
    }
  }
}

/// Builtins whose lowering needs the runtime type descriptor of their type operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinOp {
  /// `new(T)`: allocate a zeroed `T`.
  New,
  /// `make([]T, len, cap)`
  MakeSlice,
  /// `make(map[K]V, hint)`
  MakeMap,
  /// `append(s, xs...)`
  Append,
  Len,
  Cap,
}

impl BuiltinOp {
  pub fn needs_descriptor(&self) -> bool {
    matches!(
      self,
      BuiltinOp::New | BuiltinOp::MakeSlice | BuiltinOp::MakeMap | BuiltinOp::Append
    )
  }

  pub fn name(&self) -> &'static str {
    match self {
      BuiltinOp::New => "new",
      BuiltinOp::MakeSlice | BuiltinOp::MakeMap => "make",
      BuiltinOp::Append => "append",
      BuiltinOp::Len => "len",
      BuiltinOp::Cap => "cap",
    }
  }
}
