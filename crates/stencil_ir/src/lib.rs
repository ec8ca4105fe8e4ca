use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stencil_type::{
  Id, Store, definition::DefinitionId, span::Span, symbol::SymbolId, types::TypeId, value::ConstValue,
};

pub mod display;
pub mod operation;
pub mod summary;

use operation::{BinaryOperation, BuiltinOp, UnaryOperation};

pub type NodeId = Id<Node>;

/// How a generic reference that is not immediately called is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefKind {
  /// `F[T]` as a value.
  Function,
  /// `x.M` where `x` has an instantiated generic type; the receiver is bound.
  MethodValue,
  /// `T.M`; the receiver becomes the first parameter.
  MethodExpr,
}

/// One captured value of a closure: `value` is evaluated once when the closure is created and
/// read through `var` inside the closure body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capture {
  pub value: NodeId,
  pub var: DefinitionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
  Literal(ConstValue),
  Variable(DefinitionId),
  FuncRef(DefinitionId),
  Binary {
    operation: BinaryOperation,
    left: NodeId,
    right: NodeId,
  },
  Unary {
    operation: UnaryOperation,
    operand: NodeId,
  },
  /// Direct call of a non-generic function.
  Call {
    callee: DefinitionId,
    args: Vec<NodeId>,
  },
  /// Call through a function value.
  CallValue {
    callee: NodeId,
    args: Vec<NodeId>,
  },
  /// Call of a generic function or of a method of a generic type. `receiver` is set for
  /// methods; `type_args` are the method's owner type arguments in that case.
  GenericCall {
    target: DefinitionId,
    type_args: Vec<TypeId>,
    receiver: Option<NodeId>,
    args: Vec<NodeId>,
  },
  /// Generic function, method value or method expression used as a value.
  GenericRef {
    target: DefinitionId,
    type_args: Vec<TypeId>,
    receiver: Option<NodeId>,
    kind: RefKind,
  },
  /// Dynamic dispatch through an interface value or a type-parameter bound.
  MethodCall {
    receiver: NodeId,
    method: SymbolId,
    args: Vec<NodeId>,
  },
  /// Box `value` into the interface type `target`.
  ConvertToInterface {
    value: NodeId,
    target: TypeId,
  },
  /// Interface value built from an explicit runtime type descriptor and data word.
  MakeInterface {
    descriptor: NodeId,
    data: NodeId,
  },
  TypeAssert {
    value: NodeId,
    target: TypeId,
    descriptor: Option<NodeId>,
  },
  Builtin {
    op: BuiltinOp,
    operand: TypeId,
    args: Vec<NodeId>,
    descriptor: Option<NodeId>,
  },
  FieldAccess {
    base: NodeId,
    field: u32,
  },
  Index {
    base: NodeId,
    index: NodeId,
  },
  Dereference(NodeId),
  AddressOf(NodeId),
  RecordLiteral {
    ty: TypeId,
    fields: Vec<NodeId>,
  },
  /// Closure value. The body of `func` lives in `IR::bodies`.
  Closure {
    func: DefinitionId,
    captures: Vec<Capture>,
  },
  /// Word `slot` of the dictionary `dict`, whose total length is `len`.
  DictionaryRead {
    dict: NodeId,
    slot: u32,
    len: u32,
  },
  /// Address of a static dictionary symbol.
  DictionaryAddr(SymbolId),
  /// Address of the runtime type descriptor of a concrete type.
  TypeDescriptor(TypeId),
  /// Faults at run time unless `descriptor` describes a type whose shape is `shape`.
  CheckDescriptor {
    descriptor: NodeId,
    shape: TypeId,
  },
  Let {
    var: DefinitionId,
    value: Option<NodeId>,
  },
  Assign {
    target: NodeId,
    value: NodeId,
  },
  Block {
    statements: Vec<NodeId>,
    expression: Option<NodeId>,
  },
  If {
    condition: NodeId,
    then_branch: NodeId,
    else_branch: Option<NodeId>,
  },
  Loop {
    condition: Option<NodeId>,
    body: NodeId,
  },
  Break,
  Continue,
  Return(Vec<NodeId>),
  ExpressionStatement(NodeId),
  Panic(NodeId),
}

impl NodeKind {
  /// Direct children in evaluation order. Closure bodies are not children.
  pub fn children(&self) -> Vec<NodeId> {
    match self {
      NodeKind::Literal(_)
      | NodeKind::Variable(_)
      | NodeKind::FuncRef(_)
      | NodeKind::DictionaryAddr(_)
      | NodeKind::TypeDescriptor(_)
      | NodeKind::Break
      | NodeKind::Continue => Vec::new(),
      NodeKind::Binary { left, right, .. } => vec![*left, *right],
      NodeKind::Unary { operand, .. } => vec![*operand],
      NodeKind::Call { args, .. } => args.clone(),
      NodeKind::CallValue { callee, args } => std::iter::once(*callee).chain(args.iter().copied()).collect(),
      NodeKind::GenericCall { receiver, args, .. } => receiver.iter().chain(args.iter()).copied().collect(),
      NodeKind::GenericRef { receiver, .. } => receiver.iter().copied().collect(),
      NodeKind::MethodCall { receiver, args, .. } => std::iter::once(*receiver).chain(args.iter().copied()).collect(),
      NodeKind::ConvertToInterface { value, .. } => vec![*value],
      NodeKind::MakeInterface { descriptor, data } => vec![*descriptor, *data],
      NodeKind::TypeAssert { value, descriptor, .. } => std::iter::once(*value).chain(descriptor.iter().copied()).collect(),
      NodeKind::Builtin { args, descriptor, .. } => descriptor.iter().chain(args.iter()).copied().collect(),
      NodeKind::FieldAccess { base, .. } => vec![*base],
      NodeKind::Index { base, index } => vec![*base, *index],
      NodeKind::Dereference(inner) | NodeKind::AddressOf(inner) => vec![*inner],
      NodeKind::RecordLiteral { fields, .. } => fields.clone(),
      NodeKind::Closure { captures, .. } => captures.iter().map(|c| c.value).collect(),
      NodeKind::DictionaryRead { dict, .. } => vec![*dict],
      NodeKind::CheckDescriptor { descriptor, .. } => vec![*descriptor],
      NodeKind::Let { value, .. } => value.iter().copied().collect(),
      NodeKind::Assign { target, value } => vec![*target, *value],
      NodeKind::Block { statements, expression } => statements.iter().chain(expression.iter()).copied().collect(),
      NodeKind::If {
        condition,
        then_branch,
        else_branch,
      } => [*condition, *then_branch].into_iter().chain(else_branch.iter().copied()).collect(),
      NodeKind::Loop { condition, body } => condition.iter().copied().chain(std::iter::once(*body)).collect(),
      NodeKind::Return(values) => values.clone(),
      NodeKind::ExpressionStatement(inner) | NodeKind::Panic(inner) => vec![*inner],
    }
  }

  /// Rewrites every child id in place.
  pub fn remap_ids(
    &mut self,
    f: &mut dyn FnMut(NodeId) -> NodeId,
  ) {
    let mut map = |id: &mut NodeId| *id = f(*id);

    match self {
      NodeKind::Literal(_)
      | NodeKind::Variable(_)
      | NodeKind::FuncRef(_)
      | NodeKind::DictionaryAddr(_)
      | NodeKind::TypeDescriptor(_)
      | NodeKind::Break
      | NodeKind::Continue => {},
      NodeKind::Binary { left, right, .. } => {
        map(left);
        map(right);
      },
      NodeKind::Unary { operand, .. } => map(operand),
      NodeKind::Call { args, .. } => args.iter_mut().for_each(map),
      NodeKind::CallValue { callee, args } => {
        map(callee);
        args.iter_mut().for_each(map);
      },
      NodeKind::GenericCall { receiver, args, .. } => {
        receiver.iter_mut().for_each(&mut map);
        args.iter_mut().for_each(map);
      },
      NodeKind::GenericRef { receiver, .. } => receiver.iter_mut().for_each(map),
      NodeKind::MethodCall { receiver, args, .. } => {
        map(receiver);
        args.iter_mut().for_each(map);
      },
      NodeKind::ConvertToInterface { value, .. } => map(value),
      NodeKind::MakeInterface { descriptor, data } => {
        map(descriptor);
        map(data);
      },
      NodeKind::TypeAssert { value, descriptor, .. } => {
        map(value);
        descriptor.iter_mut().for_each(map);
      },
      NodeKind::Builtin { args, descriptor, .. } => {
        descriptor.iter_mut().for_each(&mut map);
        args.iter_mut().for_each(map);
      },
      NodeKind::FieldAccess { base, .. } => map(base),
      NodeKind::Index { base, index } => {
        map(base);
        map(index);
      },
      NodeKind::Dereference(inner) | NodeKind::AddressOf(inner) => map(inner),
      NodeKind::RecordLiteral { fields, .. } => fields.iter_mut().for_each(map),
      NodeKind::Closure { captures, .. } => captures.iter_mut().for_each(|c| map(&mut c.value)),
      NodeKind::DictionaryRead { dict, .. } => map(dict),
      NodeKind::CheckDescriptor { descriptor, .. } => map(descriptor),
      NodeKind::Let { value, .. } => value.iter_mut().for_each(map),
      NodeKind::Assign { target, value } => {
        map(target);
        map(value);
      },
      NodeKind::Block { statements, expression } => {
        statements.iter_mut().for_each(&mut map);
        expression.iter_mut().for_each(map);
      },
      NodeKind::If {
        condition,
        then_branch,
        else_branch,
      } => {
        map(condition);
        map(then_branch);
        else_branch.iter_mut().for_each(map);
      },
      NodeKind::Loop { condition, body } => {
        condition.iter_mut().for_each(&mut map);
        map(body);
      },
      NodeKind::Return(values) => values.iter_mut().for_each(map),
      NodeKind::ExpressionStatement(inner) | NodeKind::Panic(inner) => map(inner),
    }
  }

  pub fn offset_ids(
    &mut self,
    offset: u32,
  ) {
    self.remap_ids(&mut |id| NodeId::new(id.index() + offset));
  }

  /// Short tag used in traces and diagnostics.
  pub fn tag(&self) -> &'static str {
    match self {
      NodeKind::Literal(_) => "Literal",
      NodeKind::Variable(_) => "Variable",
      NodeKind::FuncRef(_) => "FuncRef",
      NodeKind::Binary { .. } => "Binary",
      NodeKind::Unary { .. } => "Unary",
      NodeKind::Call { .. } => "Call",
      NodeKind::CallValue { .. } => "CallValue",
      NodeKind::GenericCall { .. } => "GenericCall",
      NodeKind::GenericRef { .. } => "GenericRef",
      NodeKind::MethodCall { .. } => "MethodCall",
      NodeKind::ConvertToInterface { .. } => "ConvertToInterface",
      NodeKind::MakeInterface { .. } => "MakeInterface",
      NodeKind::TypeAssert { .. } => "TypeAssert",
      NodeKind::Builtin { .. } => "Builtin",
      NodeKind::FieldAccess { .. } => "FieldAccess",
      NodeKind::Index { .. } => "Index",
      NodeKind::Dereference(_) => "Dereference",
      NodeKind::AddressOf(_) => "AddressOf",
      NodeKind::RecordLiteral { .. } => "RecordLiteral",
      NodeKind::Closure { .. } => "Closure",
      NodeKind::DictionaryRead { .. } => "DictionaryRead",
      NodeKind::DictionaryAddr(_) => "DictionaryAddr",
      NodeKind::TypeDescriptor(_) => "TypeDescriptor",
      NodeKind::CheckDescriptor { .. } => "CheckDescriptor",
      NodeKind::Let { .. } => "Let",
      NodeKind::Assign { .. } => "Assign",
      NodeKind::Block { .. } => "Block",
      NodeKind::If { .. } => "If",
      NodeKind::Loop { .. } => "Loop",
      NodeKind::Break => "Break",
      NodeKind::Continue => "Continue",
      NodeKind::Return(_) => "Return",
      NodeKind::ExpressionStatement(_) => "ExpressionStatement",
      NodeKind::Panic(_) => "Panic",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
  pub kind: NodeKind,
  pub span: Span,
  pub type_id: TypeId,
}

/// Typed IR of one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct IR {
  pub nodes: Store<Node>,
  /// Function (or closure) definition -> body root.
  pub bodies: HashMap<DefinitionId, NodeId>,
  /// Global definition -> initializer expression.
  pub global_inits: HashMap<DefinitionId, NodeId>,
  /// Top-level declarations in order. Grows while instantiations are produced.
  pub items: Vec<DefinitionId>,
}

impl IR {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn alloc(
    &mut self,
    node: Node,
  ) -> NodeId {
    self.nodes.alloc(node)
  }

  pub fn get(
    &self,
    id: &NodeId,
  ) -> &Node {
    self.nodes.get(id)
  }

  pub fn get_mut(
    &mut self,
    id: &NodeId,
  ) -> &mut Node {
    self.nodes.get_mut(id)
  }

  pub fn body(
    &self,
    def: &DefinitionId,
  ) -> Option<NodeId> {
    self.bodies.get(def).copied()
  }

  /// Every node reachable from `root`, parents before children, children in evaluation order.
  pub fn preorder(
    &self,
    root: NodeId,
  ) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
      out.push(id);
      let children = self.get(&id).kind.children();
      stack.extend(children.into_iter().rev());
    }

    out
  }

  /// Closure functions created directly inside the tree rooted at `root`.
  pub fn closures_in(
    &self,
    root: NodeId,
  ) -> Vec<DefinitionId> {
    self
      .preorder(root)
      .into_iter()
      .filter_map(|id| match &self.get(&id).kind {
        NodeKind::Closure { func, .. } => Some(*func),
        _ => None,
      })
      .collect()
  }
}
