use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Literal value carried by an IR literal node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstValue {
  Int(i64),
  Uint(u64),
  Float(OrderedFloat<f64>),
  Bool(bool),
  Char(char),
  String(String),
  Nil,
}

impl std::fmt::Display for ConstValue {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    match self {
      ConstValue::Int(v) => write!(f, "{}", v),
      ConstValue::Uint(v) => write!(f, "{}", v),
      ConstValue::Float(v) => write!(f, "{}", v),
      ConstValue::Bool(v) => write!(f, "{}", v),
      ConstValue::Char(c) => write!(f, "'{}'", c),
      ConstValue::String(s) => write!(f, "{:?}", s),
      ConstValue::Nil => write!(f, "nil"),
    }
  }
}
