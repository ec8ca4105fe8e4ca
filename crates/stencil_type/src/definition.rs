use crate::{Id, Store, span::Span, symbol::SymbolId, types::TypeId};

pub type DefinitionId = Id<Definition>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
  pub kind: DefinitionKind,
  pub name: SymbolId,
  pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionKind {
  Function(FunctionDefinition),
  Parameter(ParameterDefinition),
  Variable(VariableDefinition),
  Global(GlobalDefinition),
  TypeParam(TypeParamDefinition),
  TypeDecl(TypeDeclDefinition),
  /// Reserved id whose content is filled in later (instantiations register before their body exists).
  Placeholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionOrigin {
  /// Declared in the source program.
  Source,
  /// Shape-instantiated copy of a generic declaration.
  Instantiation,
  /// Function literal, or a copy of one living inside an instantiation.
  Closure,
  /// Forwarding closure synthesized for a generic function value.
  Thunk,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionDefinition {
  pub type_params: Vec<DefinitionId>,
  /// Receiver parameter for methods.
  pub receiver: Option<DefinitionId>,
  /// Type declaration a method belongs to.
  pub owner_type: Option<DefinitionId>,
  pub params: Vec<DefinitionId>,
  pub results: Vec<TypeId>,
  pub origin: FunctionOrigin,
  /// Content-derived symbol the linker may merge across units.
  pub dupok: bool,
}

impl FunctionDefinition {
  pub fn is_generic(&self) -> bool {
    !self.type_params.is_empty()
  }

  pub fn is_method(&self) -> bool {
    self.receiver.is_some()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterDefinition {
  pub type_id: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableDefinition {
  pub type_id: TypeId,
  pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalDefinition {
  pub type_id: TypeId,
}

/// Definition of a type parameter (T, U, etc.)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeParamDefinition {
  /// Index in the owner's type parameter list
  pub index: u32,
  /// The function, method or type declaration that declares this type param
  pub owner: DefinitionId,
  /// Interface bound. May mention the owner's other type parameters.
  pub constraint: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDeclDefinition {
  pub type_params: Vec<DefinitionId>,
  pub underlying: TypeId,
  pub methods: Vec<DefinitionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DefinitionStore {
  definitions: Store<Definition>,
}

impl DefinitionStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn alloc(
    &mut self,
    def: Definition,
  ) -> DefinitionId {
    self.definitions.alloc(def)
  }

  pub fn get(
    &self,
    id: &DefinitionId,
  ) -> &Definition {
    self.definitions.get(id)
  }

  pub fn get_mut(
    &mut self,
    id: &DefinitionId,
  ) -> &mut Definition {
    self.definitions.get_mut(id)
  }

  pub fn len(&self) -> usize {
    self.definitions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.definitions.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (DefinitionId, &Definition)> {
    self.definitions.iter()
  }

  /// Value type of a parameter, local or global.
  pub fn type_of(
    &self,
    id: &DefinitionId,
  ) -> Option<TypeId> {
    match &self.get(id).kind {
      DefinitionKind::Parameter(p) => Some(p.type_id),
      DefinitionKind::Variable(v) => Some(v.type_id),
      DefinitionKind::Global(g) => Some(g.type_id),
      _ => None,
    }
  }

  pub fn function(
    &self,
    id: &DefinitionId,
  ) -> Option<&FunctionDefinition> {
    match &self.get(id).kind {
      DefinitionKind::Function(f) => Some(f),
      _ => None,
    }
  }

  pub fn type_decl(
    &self,
    id: &DefinitionId,
  ) -> Option<&TypeDeclDefinition> {
    match &self.get(id).kind {
      DefinitionKind::TypeDecl(t) => Some(t),
      _ => None,
    }
  }

  pub fn type_param(
    &self,
    id: &DefinitionId,
  ) -> Option<&TypeParamDefinition> {
    match &self.get(id).kind {
      DefinitionKind::TypeParam(t) => Some(t),
      _ => None,
    }
  }

  /// Parameters and locals are cloned per instantiation; globals and functions are shared.
  pub fn is_local(
    &self,
    id: &DefinitionId,
  ) -> bool {
    matches!(
      self.get(id).kind,
      DefinitionKind::Parameter(_) | DefinitionKind::Variable(_)
    )
  }

  /// Method named `name` declared on type declaration `owner`.
  pub fn find_method(
    &self,
    owner: &DefinitionId,
    name: &SymbolId,
  ) -> Option<DefinitionId> {
    self
      .type_decl(owner)?
      .methods
      .iter()
      .copied()
      .find(|m| self.get(m).name == *name)
  }

  /// Allocate a placeholder definition that will be filled in later.
  /// Used during instantiation to reserve an ID before the full definition is ready.
  pub fn alloc_placeholder(
    &mut self,
    name: SymbolId,
    span: Span,
  ) -> DefinitionId {
    self.definitions.alloc(Definition {
      kind: DefinitionKind::Placeholder,
      name,
      span,
    })
  }

  /// Update a placeholder definition with its real content.
  /// Panics if the definition is not a placeholder.
  pub fn update(
    &mut self,
    id: &DefinitionId,
    kind: DefinitionKind,
  ) {
    let def = self.definitions.get_mut(id);
    assert!(
      matches!(def.kind, DefinitionKind::Placeholder),
      "can only update placeholder definitions"
    );
    def.kind = kind;
  }
}
