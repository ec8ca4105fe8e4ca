use std::collections::HashMap;

use crate::{
  Id, Store,
  definition::{DefinitionId, DefinitionKind, DefinitionStore},
  symbol::{SymbolId, SymbolTable},
};

pub type TypeId = Id<Type>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordField {
  pub name: SymbolId,
  pub type_id: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceMethod {
  pub name: SymbolId,
  /// Always a `Type::Function` without the receiver.
  pub signature: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
  I8,
  I16,
  I32,
  I64,
  Int,
  U8,
  U16,
  U32,
  U64,
  Uint,
  Uintptr,
  F32,
  F64,
  Boolean,
  Char,
  String,
  UnsafePointer,
  Void,

  Pointer(TypeId),
  Slice(TypeId),
  Array {
    element: TypeId,
    size: u64,
  },
  Map {
    key: TypeId,
    value: TypeId,
  },
  Function {
    params: Vec<TypeId>,
    results: Vec<TypeId>,
  },
  Interface {
    methods: Vec<InterfaceMethod>,
  },
  /// Anonymous record; named records are `Named` types whose underlying type is a record.
  Record {
    fields: Vec<RecordField>,
  },
  /// Multi-value result bundle. Never a first-class value type.
  Tuple(Vec<TypeId>),

  /// Named type, possibly instantiated with type arguments.
  Named {
    def: DefinitionId,
    args: Vec<TypeId>,
  },
  /// Reference to a type parameter definition.
  Param(DefinitionId),
  /// Canonical stand-in for every concrete type with the same machine representation.
  Shape {
    name: String,
    underlying: TypeId,
    /// Set when the shape was computed from a fully-instantiated generic named type.
    instantiated: bool,
  },
}

/// Binding of type parameters to types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
  bindings: HashMap<DefinitionId, TypeId>,
}

impl Substitution {
  pub fn new() -> Self {
    Self::default()
  }

  /// Binds `params[i]` to `args[i]`. Extra entries on either side are ignored.
  pub fn for_params(
    params: &[DefinitionId],
    args: &[TypeId],
  ) -> Self {
    Self {
      bindings: params.iter().copied().zip(args.iter().copied()).collect(),
    }
  }

  pub fn bind(
    &mut self,
    param: DefinitionId,
    ty: TypeId,
  ) {
    self.bindings.insert(param, ty);
  }

  pub fn get(
    &self,
    param: &DefinitionId,
  ) -> Option<TypeId> {
    self.bindings.get(param).copied()
  }

  pub fn is_empty(&self) -> bool {
    self.bindings.is_empty()
  }
}

/// Interner for types. Structurally equal types always get the same `TypeId`, so type
/// identity is id equality everywhere in the engine.
#[derive(Debug, Clone)]
pub struct TypeStore {
  types: Store<Type>,
  interned: HashMap<Type, TypeId>,
}

impl Default for TypeStore {
  fn default() -> Self {
    Self::new()
  }
}

impl TypeStore {
  pub fn new() -> Self {
    let mut store = Self {
      types: Store::new(),
      interned: HashMap::new(),
    };
    store.init_primitives();
    store
  }

  fn init_primitives(&mut self) {
    let primitives = [
      Type::I8,
      Type::I16,
      Type::I32,
      Type::I64,
      Type::Int,
      Type::U8,
      Type::U16,
      Type::U32,
      Type::U64,
      Type::Uint,
      Type::Uintptr,
      Type::F32,
      Type::F64,
      Type::Boolean,
      Type::Char,
      Type::String,
      Type::UnsafePointer,
      Type::Void,
    ];

    for ty in primitives {
      self.intern(ty);
    }
  }

  pub fn intern(
    &mut self,
    ty: Type,
  ) -> TypeId {
    if let Some(&id) = self.interned.get(&ty) {
      return id;
    }
    let id = self.types.alloc(ty.clone());
    self.interned.insert(ty, id);
    id
  }

  pub fn get(
    &self,
    id: &TypeId,
  ) -> &Type {
    self.types.get(id)
  }

  pub fn len(&self) -> usize {
    self.types.len()
  }

  pub fn is_empty(&self) -> bool {
    self.types.is_empty()
  }

  #[inline]
  fn primitive(
    &self,
    ty: Type,
  ) -> TypeId {
    self.interned[&ty]
  }

  pub fn i8(&self) -> TypeId {
    self.primitive(Type::I8)
  }

  pub fn i16(&self) -> TypeId {
    self.primitive(Type::I16)
  }

  pub fn i32(&self) -> TypeId {
    self.primitive(Type::I32)
  }

  pub fn i64(&self) -> TypeId {
    self.primitive(Type::I64)
  }

  pub fn int(&self) -> TypeId {
    self.primitive(Type::Int)
  }

  pub fn u8(&self) -> TypeId {
    self.primitive(Type::U8)
  }

  pub fn u16(&self) -> TypeId {
    self.primitive(Type::U16)
  }

  pub fn u32(&self) -> TypeId {
    self.primitive(Type::U32)
  }

  pub fn u64(&self) -> TypeId {
    self.primitive(Type::U64)
  }

  pub fn uint(&self) -> TypeId {
    self.primitive(Type::Uint)
  }

  pub fn uintptr(&self) -> TypeId {
    self.primitive(Type::Uintptr)
  }

  pub fn f32(&self) -> TypeId {
    self.primitive(Type::F32)
  }

  pub fn f64(&self) -> TypeId {
    self.primitive(Type::F64)
  }

  pub fn boolean(&self) -> TypeId {
    self.primitive(Type::Boolean)
  }

  pub fn char(&self) -> TypeId {
    self.primitive(Type::Char)
  }

  pub fn string(&self) -> TypeId {
    self.primitive(Type::String)
  }

  pub fn unsafe_pointer(&self) -> TypeId {
    self.primitive(Type::UnsafePointer)
  }

  pub fn void(&self) -> TypeId {
    self.primitive(Type::Void)
  }

  pub fn pointer(
    &mut self,
    inner: TypeId,
  ) -> TypeId {
    self.intern(Type::Pointer(inner))
  }

  pub fn slice(
    &mut self,
    element: TypeId,
  ) -> TypeId {
    self.intern(Type::Slice(element))
  }

  pub fn array(
    &mut self,
    element: TypeId,
    size: u64,
  ) -> TypeId {
    self.intern(Type::Array { element, size })
  }

  pub fn map(
    &mut self,
    key: TypeId,
    value: TypeId,
  ) -> TypeId {
    self.intern(Type::Map { key, value })
  }

  pub fn function(
    &mut self,
    params: Vec<TypeId>,
    results: Vec<TypeId>,
  ) -> TypeId {
    self.intern(Type::Function { params, results })
  }

  pub fn interface(
    &mut self,
    methods: Vec<InterfaceMethod>,
  ) -> TypeId {
    self.intern(Type::Interface { methods })
  }

  pub fn empty_interface(&mut self) -> TypeId {
    self.interface(Vec::new())
  }

  pub fn record(
    &mut self,
    fields: Vec<RecordField>,
  ) -> TypeId {
    self.intern(Type::Record { fields })
  }

  pub fn tuple(
    &mut self,
    elements: Vec<TypeId>,
  ) -> TypeId {
    self.intern(Type::Tuple(elements))
  }

  pub fn named(
    &mut self,
    def: DefinitionId,
    args: Vec<TypeId>,
  ) -> TypeId {
    self.intern(Type::Named { def, args })
  }

  pub fn param(
    &mut self,
    def: DefinitionId,
  ) -> TypeId {
    self.intern(Type::Param(def))
  }

  pub fn shape(
    &mut self,
    name: String,
    underlying: TypeId,
    instantiated: bool,
  ) -> TypeId {
    self.intern(Type::Shape {
      name,
      underlying,
      instantiated,
    })
  }

  /// Result type of a call: void, the single result, or a tuple bundle.
  pub fn results_type(
    &mut self,
    results: &[TypeId],
  ) -> TypeId {
    match results {
      [] => self.void(),
      [single] => *single,
      _ => self.tuple(results.to_vec()),
    }
  }

  pub fn is_param(
    &self,
    ty: &TypeId,
  ) -> bool {
    matches!(self.get(ty), Type::Param(_))
  }

  pub fn is_shape(
    &self,
    ty: &TypeId,
  ) -> bool {
    matches!(self.get(ty), Type::Shape { .. })
  }

  pub fn is_pointer(
    &self,
    ty: &TypeId,
  ) -> bool {
    matches!(self.get(ty), Type::Pointer(_))
  }

  pub fn is_tuple(
    &self,
    ty: &TypeId,
  ) -> bool {
    matches!(self.get(ty), Type::Tuple(_))
  }

  pub fn is_function(
    &self,
    ty: &TypeId,
  ) -> bool {
    matches!(self.get(ty), Type::Function { .. })
  }

  /// Named type with at least one type argument and nothing generic or shaped inside.
  pub fn is_fully_instantiated(
    &self,
    ty: &TypeId,
  ) -> bool {
    match self.get(ty) {
      Type::Named { args, .. } => !args.is_empty() && !self.has_type_param(ty) && !self.has_shape(ty),
      _ => false,
    }
  }

  pub fn pointer_target(
    &self,
    ty: &TypeId,
  ) -> Option<TypeId> {
    match self.get(ty) {
      Type::Pointer(inner) => Some(*inner),
      _ => None,
    }
  }

  /// Type parameter a value of type `ty` (or `*ty`) dispatches through, if any.
  pub fn receiver_param(
    &self,
    ty: &TypeId,
  ) -> Option<DefinitionId> {
    match self.get(ty) {
      Type::Param(def) => Some(*def),
      Type::Pointer(inner) => match self.get(inner) {
        Type::Param(def) => Some(*def),
        _ => None,
      },
      _ => None,
    }
  }

  pub fn function_signature(
    &self,
    ty: &TypeId,
  ) -> Option<(&[TypeId], &[TypeId])> {
    match self.get(ty) {
      Type::Function { params, results } => Some((params, results)),
      _ => None,
    }
  }

  pub fn has_type_param(
    &self,
    ty: &TypeId,
  ) -> bool {
    self.any_component(ty, &|t| matches!(t, Type::Param(_)))
  }

  pub fn has_shape(
    &self,
    ty: &TypeId,
  ) -> bool {
    self.any_component(ty, &|t| matches!(t, Type::Shape { .. }))
  }

  /// Walks the type structurally (not through named types' underlying types).
  fn any_component(
    &self,
    ty: &TypeId,
    pred: &dyn Fn(&Type) -> bool,
  ) -> bool {
    let t = self.get(ty);
    if pred(t) {
      return true;
    }

    match t {
      Type::Pointer(inner) | Type::Slice(inner) => self.any_component(inner, pred),
      Type::Array { element, .. } => self.any_component(element, pred),
      Type::Map { key, value } => self.any_component(key, pred) || self.any_component(value, pred),
      Type::Function { params, results } => params
        .iter()
        .chain(results.iter())
        .any(|t| self.any_component(t, pred)),
      Type::Interface { methods } => methods.iter().any(|m| self.any_component(&m.signature, pred)),
      Type::Record { fields } => fields.iter().any(|f| self.any_component(&f.type_id, pred)),
      Type::Tuple(elements) => elements.iter().any(|t| self.any_component(t, pred)),
      Type::Named { args, .. } => args.iter().any(|t| self.any_component(t, pred)),
      _ => false,
    }
  }

  /// Nesting depth of type constructors; primitives are depth 1.
  pub fn depth(
    &self,
    ty: &TypeId,
  ) -> usize {
    let children: Vec<TypeId> = match self.get(ty) {
      Type::Pointer(inner) | Type::Slice(inner) => vec![*inner],
      Type::Array { element, .. } => vec![*element],
      Type::Map { key, value } => vec![*key, *value],
      Type::Function { params, results } => params.iter().chain(results.iter()).copied().collect(),
      Type::Interface { methods } => methods.iter().map(|m| m.signature).collect(),
      Type::Record { fields } => fields.iter().map(|f| f.type_id).collect(),
      Type::Tuple(elements) => elements.clone(),
      Type::Named { args, .. } => args.clone(),
      _ => Vec::new(),
    };

    1 + children.iter().map(|c| self.depth(c)).max().unwrap_or(0)
  }

  /// Replaces type parameters bound in `subst`. Shapes and unbound parameters are left alone.
  pub fn substitute(
    &mut self,
    ty: TypeId,
    subst: &Substitution,
  ) -> TypeId {
    if subst.is_empty() || !self.has_type_param(&ty) {
      return ty;
    }

    match self.get(&ty).clone() {
      Type::Param(def) => subst.get(&def).unwrap_or(ty),
      Type::Pointer(inner) => {
        let inner = self.substitute(inner, subst);
        self.pointer(inner)
      },
      Type::Slice(element) => {
        let element = self.substitute(element, subst);
        self.slice(element)
      },
      Type::Array { element, size } => {
        let element = self.substitute(element, subst);
        self.array(element, size)
      },
      Type::Map { key, value } => {
        let key = self.substitute(key, subst);
        let value = self.substitute(value, subst);
        self.map(key, value)
      },
      Type::Function { params, results } => {
        let params = self.substitute_all(&params, subst);
        let results = self.substitute_all(&results, subst);
        self.function(params, results)
      },
      Type::Interface { methods } => {
        let methods = methods
          .into_iter()
          .map(|m| InterfaceMethod {
            name: m.name,
            signature: self.substitute(m.signature, subst),
          })
          .collect();
        self.interface(methods)
      },
      Type::Record { fields } => {
        let fields = fields
          .into_iter()
          .map(|f| RecordField {
            name: f.name,
            type_id: self.substitute(f.type_id, subst),
          })
          .collect();
        self.record(fields)
      },
      Type::Tuple(elements) => {
        let elements = self.substitute_all(&elements, subst);
        self.tuple(elements)
      },
      Type::Named { def, args } => {
        let args = self.substitute_all(&args, subst);
        self.named(def, args)
      },
      _ => ty,
    }
  }

  pub fn substitute_all(
    &mut self,
    types: &[TypeId],
    subst: &Substitution,
  ) -> Vec<TypeId> {
    types.iter().map(|t| self.substitute(*t, subst)).collect()
  }

  /// Underlying type: named types are expanded one level (with their arguments applied),
  /// shapes yield the representation they stand for.
  pub fn underlying(
    &mut self,
    ty: TypeId,
    defs: &DefinitionStore,
  ) -> TypeId {
    match self.get(&ty).clone() {
      Type::Named { def, args } => match &defs.get(&def).kind {
        DefinitionKind::TypeDecl(decl) => {
          let underlying = decl.underlying;
          let subst = Substitution::for_params(&decl.type_params, &args);
          let expanded = self.substitute(underlying, &subst);
          self.underlying(expanded, defs)
        },
        _ => ty,
      },
      Type::Shape { underlying, .. } => underlying,
      _ => ty,
    }
  }

  pub fn is_interface(
    &mut self,
    ty: TypeId,
    defs: &DefinitionStore,
  ) -> bool {
    let underlying = self.underlying(ty, defs);
    matches!(self.get(&underlying), Type::Interface { .. })
  }

  pub fn format(
    &self,
    ty: &TypeId,
    defs: &DefinitionStore,
    symbols: &SymbolTable,
  ) -> String {
    let list = |types: &[TypeId]| -> String {
      types
        .iter()
        .map(|t| self.format(t, defs, symbols))
        .collect::<Vec<_>>()
        .join(", ")
    };

    match self.get(ty) {
      Type::I8 => "int8".to_string(),
      Type::I16 => "int16".to_string(),
      Type::I32 => "int32".to_string(),
      Type::I64 => "int64".to_string(),
      Type::Int => "int".to_string(),
      Type::U8 => "uint8".to_string(),
      Type::U16 => "uint16".to_string(),
      Type::U32 => "uint32".to_string(),
      Type::U64 => "uint64".to_string(),
      Type::Uint => "uint".to_string(),
      Type::Uintptr => "uintptr".to_string(),
      Type::F32 => "float32".to_string(),
      Type::F64 => "float64".to_string(),
      Type::Boolean => "bool".to_string(),
      Type::Char => "rune".to_string(),
      Type::String => "string".to_string(),
      Type::UnsafePointer => "unsafe.Pointer".to_string(),
      Type::Void => "void".to_string(),
      Type::Pointer(inner) => format!("*{}", self.format(inner, defs, symbols)),
      Type::Slice(element) => format!("[]{}", self.format(element, defs, symbols)),
      Type::Array { element, size } => format!("[{}]{}", size, self.format(element, defs, symbols)),
      Type::Map { key, value } => format!(
        "map[{}]{}",
        self.format(key, defs, symbols),
        self.format(value, defs, symbols)
      ),
      Type::Function { params, results } => match results.as_slice() {
        [] => format!("func({})", list(params)),
        [single] => format!("func({}) {}", list(params), self.format(single, defs, symbols)),
        _ => format!("func({}) ({})", list(params), list(results)),
      },
      Type::Interface { methods } if methods.is_empty() => "interface {}".to_string(),
      Type::Interface { methods } => {
        let methods: Vec<String> = methods
          .iter()
          .map(|m| format!("{} {}", symbols.get(&m.name), self.format(&m.signature, defs, symbols)))
          .collect();
        format!("interface {{ {} }}", methods.join("; "))
      },
      Type::Record { fields } if fields.is_empty() => "struct {}".to_string(),
      Type::Record { fields } => {
        let fields: Vec<String> = fields
          .iter()
          .map(|f| format!("{} {}", symbols.get(&f.name), self.format(&f.type_id, defs, symbols)))
          .collect();
        format!("struct {{ {} }}", fields.join("; "))
      },
      Type::Tuple(elements) => format!("({})", list(elements)),
      Type::Named { def, args } => {
        let name = symbols.get(&defs.get(def).name);
        if args.is_empty() {
          name.to_string()
        } else {
          let args: Vec<String> = args.iter().map(|a| self.format(a, defs, symbols)).collect();
          format!("{}[{}]", name, args.join(","))
        }
      },
      Type::Param(def) => symbols.get(&defs.get(def).name).to_string(),
      Type::Shape { name, .. } => name.clone(),
    }
  }
}
