#![allow(dead_code)]

use stencil_config::EngineConfig;
use stencil_engine::Session;
use stencil_ir::{
  IR, Node, NodeId, NodeKind, RefKind,
  operation::{BinaryOperation, BuiltinOp},
};
use stencil_type::{
  definition::{
    Definition, DefinitionId, DefinitionKind, DefinitionStore, FunctionDefinition, FunctionOrigin, ParameterDefinition,
    TypeDeclDefinition, TypeParamDefinition, VariableDefinition,
  },
  span::Span,
  symbol::{SymbolId, SymbolTable},
  types::{InterfaceMethod, RecordField, TypeId, TypeStore},
  value::ConstValue,
};

/// Hand-built compilation unit: type-checked declarations and bodies as the front end would
/// hand them to the engine.
pub struct Fixture {
  pub types: TypeStore,
  pub defs: DefinitionStore,
  pub symbols: SymbolTable,
  pub ir: IR,
}

/// `Pair[P] struct { a P; b P }` with `func (p Pair[T]) Swap() Pair[T]`.
pub struct PairDecl {
  pub decl: DefinitionId,
  pub swap: DefinitionId,
}

/// `Box[B] struct { value B }` with `func (b Box[T]) String() string`.
pub struct BoxDecl {
  pub decl: DefinitionId,
  pub string: DefinitionId,
}

impl Fixture {
  pub fn new() -> Self {
    Self {
      types: TypeStore::new(),
      defs: DefinitionStore::new(),
      symbols: SymbolTable::new(),
      ir: IR::new(),
    }
  }

  pub fn session(self) -> Session {
    self.session_with(EngineConfig::quiet())
  }

  pub fn session_with(
    self,
    config: EngineConfig,
  ) -> Session {
    Session::new(config, self.types, self.defs, self.symbols, self.ir)
  }

  pub fn sym(
    &mut self,
    name: &str,
  ) -> SymbolId {
    self.symbols.intern(name)
  }

  pub fn node(
    &mut self,
    kind: NodeKind,
    type_id: TypeId,
  ) -> NodeId {
    self.ir.alloc(Node {
      kind,
      span: Span::synthetic(),
      type_id,
    })
  }

  pub fn param(
    &mut self,
    name: &str,
    type_id: TypeId,
  ) -> DefinitionId {
    let name = self.sym(name);
    self.defs.alloc(Definition {
      kind: DefinitionKind::Parameter(ParameterDefinition { type_id }),
      name,
      span: Span::synthetic(),
    })
  }

  pub fn local(
    &mut self,
    name: &str,
    type_id: TypeId,
  ) -> DefinitionId {
    let name = self.sym(name);
    self.defs.alloc(Definition {
      kind: DefinitionKind::Variable(VariableDefinition { type_id, mutable: false }),
      name,
      span: Span::synthetic(),
    })
  }

  pub fn var(
    &mut self,
    def: DefinitionId,
  ) -> NodeId {
    let ty = self.defs.type_of(&def).expect("variable without a type");
    self.node(NodeKind::Variable(def), ty)
  }

  pub fn int(
    &mut self,
    value: i64,
  ) -> NodeId {
    let ty = self.types.int();
    self.node(NodeKind::Literal(ConstValue::Int(value)), ty)
  }

  pub fn ret(
    &mut self,
    values: Vec<NodeId>,
  ) -> NodeId {
    let void = self.types.void();
    self.node(NodeKind::Return(values), void)
  }

  pub fn block(
    &mut self,
    statements: Vec<NodeId>,
  ) -> NodeId {
    let void = self.types.void();
    self.node(
      NodeKind::Block {
        statements,
        expression: None,
      },
      void,
    )
  }

  pub fn let_(
    &mut self,
    var: DefinitionId,
    value: Option<NodeId>,
  ) -> NodeId {
    let void = self.types.void();
    self.node(NodeKind::Let { var, value }, void)
  }

  pub fn generic_call(
    &mut self,
    target: DefinitionId,
    type_args: Vec<TypeId>,
    args: Vec<NodeId>,
    result: TypeId,
  ) -> NodeId {
    self.node(
      NodeKind::GenericCall {
        target,
        type_args,
        receiver: None,
        args,
      },
      result,
    )
  }

  pub fn generic_ref(
    &mut self,
    target: DefinitionId,
    type_args: Vec<TypeId>,
    receiver: Option<NodeId>,
    kind: RefKind,
    value_type: TypeId,
  ) -> NodeId {
    self.node(
      NodeKind::GenericRef {
        target,
        type_args,
        receiver,
        kind,
      },
      value_type,
    )
  }

  pub fn declare(
    &mut self,
    name: &str,
  ) -> DefinitionId {
    let name = self.sym(name);
    self.defs.alloc_placeholder(name, Span::synthetic())
  }

  /// Type parameter `name` of `owner`, bounded by `constraint` (`any` when `None`).
  pub fn type_param(
    &mut self,
    owner: DefinitionId,
    index: u32,
    name: &str,
    constraint: Option<TypeId>,
  ) -> DefinitionId {
    let constraint = constraint.unwrap_or_else(|| self.types.empty_interface());
    let name = self.sym(name);
    self.defs.alloc(Definition {
      kind: DefinitionKind::TypeParam(TypeParamDefinition {
        index,
        owner,
        constraint,
      }),
      name,
      span: Span::synthetic(),
    })
  }

  /// Completes a declared function and lists it as a top-level item.
  pub fn define(
    &mut self,
    func: DefinitionId,
    definition: FunctionDefinition,
    body: Option<NodeId>,
  ) {
    self.defs.update(&func, DefinitionKind::Function(definition));
    if let Some(body) = body {
      self.ir.bodies.insert(func, body);
    }
    self.ir.items.push(func);
  }

  pub fn function(
    type_params: Vec<DefinitionId>,
    params: Vec<DefinitionId>,
    results: Vec<TypeId>,
  ) -> FunctionDefinition {
    FunctionDefinition {
      type_params,
      receiver: None,
      owner_type: None,
      params,
      results,
      origin: FunctionOrigin::Source,
      dupok: false,
    }
  }

  /// Non-generic named type.
  pub fn named_type(
    &mut self,
    name: &str,
    underlying: TypeId,
  ) -> TypeId {
    let decl = self.declare(name);
    self.defs.update(
      &decl,
      DefinitionKind::TypeDecl(TypeDeclDefinition {
        type_params: Vec::new(),
        underlying,
        methods: Vec::new(),
      }),
    );
    self.types.named(decl, Vec::new())
  }

  /// `type Stringer interface { String() string }`
  pub fn stringer(&mut self) -> TypeId {
    let string = self.types.string();
    let signature = self.types.function(Vec::new(), vec![string]);
    let method = self.sym("String");
    let iface = self.types.interface(vec![InterfaceMethod { name: method, signature }]);
    self.named_type("Stringer", iface)
  }

  /// `func Identity[T any](x T) T { return x }`
  pub fn identity(&mut self) -> DefinitionId {
    let func = self.declare("Identity");
    let t = self.type_param(func, 0, "T", None);
    let tt = self.types.param(t);
    let x = self.param("x", tt);

    let vx = self.var(x);
    let ret = self.ret(vec![vx]);
    let body = self.block(vec![ret]);

    self.define(func, Self::function(vec![t], vec![x], vec![tt]), Some(body));
    func
  }

  /// `func Outer[T any](x T) T { return Identity[T](x) }`
  pub fn outer(
    &mut self,
    identity: DefinitionId,
  ) -> DefinitionId {
    let func = self.declare("Outer");
    let t = self.type_param(func, 0, "T", None);
    let tt = self.types.param(t);
    let x = self.param("x", tt);

    let vx = self.var(x);
    let call = self.generic_call(identity, vec![tt], vec![vx], tt);
    let ret = self.ret(vec![call]);
    let body = self.block(vec![ret]);

    self.define(func, Self::function(vec![t], vec![x], vec![tt]), Some(body));
    func
  }

  /// `func Rec[T any](x T) T { return Rec[T](x) }`
  pub fn recursive(&mut self) -> DefinitionId {
    let func = self.declare("Rec");
    let t = self.type_param(func, 0, "T", None);
    let tt = self.types.param(t);
    let x = self.param("x", tt);

    let vx = self.var(x);
    let call = self.generic_call(func, vec![tt], vec![vx], tt);
    let ret = self.ret(vec![call]);
    let body = self.block(vec![ret]);

    self.define(func, Self::function(vec![t], vec![x], vec![tt]), Some(body));
    func
  }

  /// `func ToAny[T any](x T) any { return any(x) }`
  pub fn to_any(&mut self) -> DefinitionId {
    let func = self.declare("ToAny");
    let t = self.type_param(func, 0, "T", None);
    let tt = self.types.param(t);
    let x = self.param("x", tt);
    let any = self.types.empty_interface();

    let vx = self.var(x);
    let convert = self.node(NodeKind::ConvertToInterface { value: vx, target: any }, any);
    let ret = self.ret(vec![convert]);
    let body = self.block(vec![ret]);

    self.define(func, Self::function(vec![t], vec![x], vec![any]), Some(body));
    func
  }

  /// `func Single[T any](x T) []T { s := make([]T, 1); return s }`
  pub fn single(&mut self) -> DefinitionId {
    let func = self.declare("Single");
    let t = self.type_param(func, 0, "T", None);
    let tt = self.types.param(t);
    let slice = self.types.slice(tt);
    let x = self.param("x", tt);
    let s = self.local("s", slice);

    let one = self.int(1);
    let make = self.node(
      NodeKind::Builtin {
        op: BuiltinOp::MakeSlice,
        operand: slice,
        args: vec![one],
        descriptor: None,
      },
      slice,
    );
    let bind = self.let_(s, Some(make));
    let vs = self.var(s);
    let ret = self.ret(vec![vs]);
    let body = self.block(vec![bind, ret]);

    self.define(func, Self::function(vec![t], vec![x], vec![slice]), Some(body));
    func
  }

  /// `func Show[T Stringer](x T) string { return x.String() }`
  pub fn show(
    &mut self,
    stringer: TypeId,
  ) -> DefinitionId {
    let func = self.declare("Show");
    let t = self.type_param(func, 0, "T", Some(stringer));
    let tt = self.types.param(t);
    let x = self.param("x", tt);
    let string = self.types.string();
    let method = self.sym("String");

    let vx = self.var(x);
    let call = self.node(
      NodeKind::MethodCall {
        receiver: vx,
        method,
        args: Vec::new(),
      },
      string,
    );
    let ret = self.ret(vec![call]);
    let body = self.block(vec![ret]);

    self.define(func, Self::function(vec![t], vec![x], vec![string]), Some(body));
    func
  }

  /// `func MakeId[T any]() func(T) T { return Identity[T] }`
  pub fn make_id(
    &mut self,
    identity: DefinitionId,
  ) -> DefinitionId {
    let func = self.declare("MakeId");
    let t = self.type_param(func, 0, "T", None);
    let tt = self.types.param(t);
    let fn_ty = self.types.function(vec![tt], vec![tt]);

    let value = self.generic_ref(identity, vec![tt], None, RefKind::Function, fn_ty);
    let ret = self.ret(vec![value]);
    let body = self.block(vec![ret]);

    self.define(func, Self::function(vec![t], Vec::new(), vec![fn_ty]), Some(body));
    func
  }

  /// `func AnyId[T any]() any { return any(Identity[T]) }`
  pub fn any_id(
    &mut self,
    identity: DefinitionId,
  ) -> DefinitionId {
    let func = self.declare("AnyId");
    let t = self.type_param(func, 0, "T", None);
    let tt = self.types.param(t);
    let fn_ty = self.types.function(vec![tt], vec![tt]);
    let any = self.types.empty_interface();

    let value = self.generic_ref(identity, vec![tt], None, RefKind::Function, fn_ty);
    let convert = self.node(NodeKind::ConvertToInterface { value, target: any }, any);
    let ret = self.ret(vec![convert]);
    let body = self.block(vec![ret]);

    self.define(func, Self::function(vec![t], Vec::new(), vec![any]), Some(body));
    func
  }

  /// `func Same[T any](x T, y any) bool { return x == y }`
  pub fn same(&mut self) -> DefinitionId {
    let func = self.declare("Same");
    let t = self.type_param(func, 0, "T", None);
    let tt = self.types.param(t);
    let any = self.types.empty_interface();
    let boolean = self.types.boolean();
    let x = self.param("x", tt);
    let y = self.param("y", any);

    let vx = self.var(x);
    let vy = self.var(y);
    let eq = self.node(
      NodeKind::Binary {
        operation: BinaryOperation::Equal,
        left: vx,
        right: vy,
      },
      boolean,
    );
    let ret = self.ret(vec![eq]);
    let body = self.block(vec![ret]);

    self.define(func, Self::function(vec![t], vec![x, y], vec![boolean]), Some(body));
    func
  }

  /// `func IsIdentity[T any](y any) bool { return Identity[T] == y }`
  pub fn is_identity(
    &mut self,
    identity: DefinitionId,
  ) -> DefinitionId {
    let func = self.declare("IsIdentity");
    let t = self.type_param(func, 0, "T", None);
    let tt = self.types.param(t);
    let fn_ty = self.types.function(vec![tt], vec![tt]);
    let any = self.types.empty_interface();
    let boolean = self.types.boolean();
    let y = self.param("y", any);

    let value = self.generic_ref(identity, vec![tt], None, RefKind::Function, fn_ty);
    let vy = self.var(y);
    let eq = self.node(
      NodeKind::Binary {
        operation: BinaryOperation::Equal,
        left: value,
        right: vy,
      },
      boolean,
    );
    let ret = self.ret(vec![eq]);
    let body = self.block(vec![ret]);

    self.define(func, Self::function(vec![t], vec![y], vec![boolean]), Some(body));
    func
  }

  /// `func Cast[T any](v any) []T { return v.([]T) }`
  pub fn cast(&mut self) -> DefinitionId {
    let func = self.declare("Cast");
    let t = self.type_param(func, 0, "T", None);
    let tt = self.types.param(t);
    let slice = self.types.slice(tt);
    let any = self.types.empty_interface();
    let v = self.param("v", any);

    let vv = self.var(v);
    let assert = self.node(
      NodeKind::TypeAssert {
        value: vv,
        target: slice,
        descriptor: None,
      },
      slice,
    );
    let ret = self.ret(vec![assert]);
    let body = self.block(vec![ret]);

    self.define(func, Self::function(vec![t], vec![v], vec![slice]), Some(body));
    func
  }

  /// `func Apply[T any](x T) T { f := func(y T) T { return Identity[T](y) }; return f(x) }`
  pub fn apply(
    &mut self,
    identity: DefinitionId,
  ) -> DefinitionId {
    let func = self.declare("Apply");
    let t = self.type_param(func, 0, "T", None);
    let tt = self.types.param(t);
    let fn_ty = self.types.function(vec![tt], vec![tt]);
    let x = self.param("x", tt);
    let f = self.local("f", fn_ty);

    // The literal is not a top-level item: it only exists inside Apply's body.
    let literal = self.declare("Apply.func1");
    let y = self.param("y", tt);
    let vy = self.var(y);
    let inner = self.generic_call(identity, vec![tt], vec![vy], tt);
    let inner_ret = self.ret(vec![inner]);
    let inner_body = self.block(vec![inner_ret]);
    let mut definition = Self::function(Vec::new(), vec![y], vec![tt]);
    definition.origin = FunctionOrigin::Closure;
    self.defs.update(&literal, DefinitionKind::Function(definition));
    self.ir.bodies.insert(literal, inner_body);

    let closure = self.node(
      NodeKind::Closure {
        func: literal,
        captures: Vec::new(),
      },
      fn_ty,
    );
    let bind = self.let_(f, Some(closure));
    let callee = self.var(f);
    let vx = self.var(x);
    let call = self.node(NodeKind::CallValue { callee, args: vec![vx] }, tt);
    let ret = self.ret(vec![call]);
    let body = self.block(vec![bind, ret]);

    self.define(func, Self::function(vec![t], vec![x], vec![tt]), Some(body));
    func
  }

  pub fn pair(&mut self) -> PairDecl {
    let decl = self.declare("Pair");
    let p = self.type_param(decl, 0, "P", None);
    let pt = self.types.param(p);
    let a = self.sym("a");
    let b = self.sym("b");
    let underlying = self.types.record(vec![
      RecordField { name: a, type_id: pt },
      RecordField { name: b, type_id: pt },
    ]);

    let swap = self.declare("Swap");
    let t = self.type_param(swap, 0, "T", None);
    let tt = self.types.param(t);
    let pair_t = self.types.named(decl, vec![tt]);
    let recv = self.param("p", pair_t);

    let second_base = self.var(recv);
    let second = self.node(NodeKind::FieldAccess { base: second_base, field: 1 }, tt);
    let first_base = self.var(recv);
    let first = self.node(NodeKind::FieldAccess { base: first_base, field: 0 }, tt);
    let literal = self.node(
      NodeKind::RecordLiteral {
        ty: pair_t,
        fields: vec![second, first],
      },
      pair_t,
    );
    let ret = self.ret(vec![literal]);
    let body = self.block(vec![ret]);

    self.defs.update(
      &decl,
      DefinitionKind::TypeDecl(TypeDeclDefinition {
        type_params: vec![p],
        underlying,
        methods: vec![swap],
      }),
    );

    let mut definition = Self::function(vec![t], Vec::new(), vec![pair_t]);
    definition.receiver = Some(recv);
    definition.owner_type = Some(decl);
    self.define(swap, definition, Some(body));

    PairDecl { decl, swap }
  }

  pub fn boxed(&mut self) -> BoxDecl {
    let decl = self.declare("Box");
    let b = self.type_param(decl, 0, "B", None);
    let bt = self.types.param(b);
    let value = self.sym("value");
    let underlying = self.types.record(vec![RecordField { name: value, type_id: bt }]);

    let string = self.declare("String");
    let t = self.type_param(string, 0, "T", None);
    let tt = self.types.param(t);
    let box_t = self.types.named(decl, vec![tt]);
    let recv = self.param("b", box_t);
    let string_ty = self.types.string();

    let text = self.node(NodeKind::Literal(ConstValue::String("box".to_string())), string_ty);
    let ret = self.ret(vec![text]);
    let body = self.block(vec![ret]);

    self.defs.update(
      &decl,
      DefinitionKind::TypeDecl(TypeDeclDefinition {
        type_params: vec![b],
        underlying,
        methods: vec![string],
      }),
    );

    let mut definition = Self::function(vec![t], Vec::new(), vec![string_ty]);
    definition.receiver = Some(recv);
    definition.owner_type = Some(decl);
    self.define(string, definition, Some(body));

    BoxDecl { decl, string }
  }

  /// Non-generic `func main() { <statements> }`.
  pub fn main(
    &mut self,
    statements: Vec<NodeId>,
  ) -> DefinitionId {
    let func = self.declare("main");
    let body = self.block(statements);
    self.define(func, Self::function(Vec::new(), Vec::new(), Vec::new()), Some(body));
    func
  }
}

/// Every node reachable from `root` (closure bodies excluded) satisfying `pred`.
pub fn find_nodes(
  session: &Session,
  root: NodeId,
  pred: impl Fn(&NodeKind) -> bool,
) -> Vec<NodeId> {
  session
    .ir
    .preorder(root)
    .into_iter()
    .filter(|id| pred(&session.ir.get(id).kind))
    .collect()
}

pub fn body_of(
  session: &Session,
  func: &DefinitionId,
) -> NodeId {
  session.ir.body(func).expect("function has no body")
}

pub fn name_of(
  session: &Session,
  def: &DefinitionId,
) -> String {
  session.decl_name(def)
}
