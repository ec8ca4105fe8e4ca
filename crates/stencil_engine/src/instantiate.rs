//! Shape instantiation of generic declarations.
//!
//! An instantiation is an ordinary function whose body is the generic body with every type
//! parameter replaced by its shape. It takes the dictionary as an extra first parameter and reads
//! everything that depends on the exact type arguments from it.

use std::{collections::HashMap, rc::Rc};

use stencil_config::DebugTrace;
use stencil_diagnostics::message::InternalError;
use stencil_ir::{Capture, NodeId, NodeKind};
use stencil_log::{log_trc, trace_dbg};
use stencil_type::{
  Id,
  definition::{Definition, DefinitionId, DefinitionKind, FunctionDefinition, FunctionOrigin, ParameterDefinition, VariableDefinition},
  span::Span,
  symbol::SymbolId,
  types::{Substitution, TypeId},
};

use crate::{
  analyze::{BodyInfo, SiteKind},
  naming,
  session::{DictContext, EngineResult, Session},
};

pub type InstId = Id<Instantiation>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstKey {
  pub decl: DefinitionId,
  pub shapes: Vec<TypeId>,
  pub is_method: bool,
}

/// What a compiled dictionary read in an instantiation stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSource {
  /// Descriptor of this generic type (a type parameter or a derived type).
  Type(TypeId),
  /// Sub-dictionary for the site with this ordinal.
  SubDictionary(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRead {
  pub slot: u32,
  pub source: SlotSource,
}

#[derive(Debug, Clone)]
pub struct Instantiation {
  pub key: InstKey,
  pub func: DefinitionId,
  pub symbol: SymbolId,
  pub dict_param: DefinitionId,
  pub info: Rc<BodyInfo>,
  pub start_sub_dict: u32,
  pub dict_len: u32,
  /// Node (in this instantiation's body or its closures) -> sub-dictionary slot it needs.
  pub dict_entries: HashMap<NodeId, u32>,
  /// Every dictionary slot the body reads, in the order the reads were emitted.
  pub reads: Vec<SlotRead>,
  /// False while the body is still being built.
  pub complete: bool,
}

/// Per-instantiation rewriting state.
struct Subster {
  inst: InstId,
  decl: DefinitionId,
  info: Rc<BodyInfo>,
  shape_subst: Substitution,
  vars: HashMap<DefinitionId, DefinitionId>,
  /// Innermost function's dictionary variable last.
  dict_vars: Vec<DefinitionId>,
  dict_entries: HashMap<NodeId, u32>,
  reads: Vec<SlotRead>,
}

impl Subster {
  fn current_dict(&self) -> DefinitionId {
    self.dict_vars[self.dict_vars.len() - 1]
  }
}

impl Session {
  /// Instantiation of `decl` for the shapes of `args`, built on first request.
  pub fn instantiate(
    &mut self,
    decl: DefinitionId,
    args: &[TypeId],
    is_method: bool,
  ) -> EngineResult<InstId> {
    let func = match self.defs.function(&decl) {
      Some(func) => func.clone(),
      None => {
        return Err(
          InternalError::NotGeneric {
            decl: self.decl_name(&decl),
            span: self.span_of(&decl),
          }
          .report(),
        );
      },
    };

    if func.type_params.len() != args.len() {
      return Err(
        InternalError::TypeArgumentCount {
          decl: self.decl_name(&decl),
          expected: func.type_params.len(),
          found: args.len(),
          span: self.span_of(&decl),
        }
        .report(),
      );
    }

    let shapes = args
      .iter()
      .map(|arg| self.shape_of(*arg))
      .collect::<EngineResult<Vec<_>>>()?;

    let key = InstKey {
      decl,
      shapes: shapes.clone(),
      is_method,
    };
    if let Some(&inst) = self.inst_cache.get(&key) {
      log_trc!(&self.config, "reusing {}", self.symbols.get(&self.instantiations.get(&inst).symbol));
      return Ok(inst);
    }

    let info = self.analyze(decl)?;
    let root = self.ensure_body(decl)?;
    let span = self.span_of(&decl);

    let symbol = naming::instantiation_name(self, decl, &shapes, is_method);
    let func_id = self.defs.alloc_placeholder(symbol, span.clone());
    let uintptr = self.types.uintptr();
    let dict_param = self.new_param(".dict", uintptr, span.clone());

    // Registered before the body is rewritten so recursive references find it.
    let inst = self.instantiations.alloc(Instantiation {
      key: key.clone(),
      func: func_id,
      symbol,
      dict_param,
      info: info.clone(),
      start_sub_dict: info.start_sub_dict(),
      dict_len: info.dict_len(),
      dict_entries: HashMap::new(),
      reads: Vec::new(),
      complete: false,
    });
    self.inst_cache.insert(key, inst);
    self.dict_contexts.insert(func_id, DictContext { inst, dict_var: dict_param });

    trace_dbg!(
      &self.config,
      DebugTrace::Instantiate,
      "{} (dictionary length {})",
      self.symbols.get(&symbol),
      info.dict_len()
    );

    let mut cx = Subster {
      inst,
      decl,
      info: info.clone(),
      shape_subst: Substitution::for_params(&func.type_params, &shapes),
      vars: HashMap::new(),
      dict_vars: vec![dict_param],
      dict_entries: HashMap::new(),
      reads: Vec::new(),
    };

    let mut params = vec![dict_param];
    for param in func.receiver.iter().chain(func.params.iter()) {
      let cloned = self.map_local(&mut cx, *param);
      params.push(cloned);
    }
    let results = self.types.substitute_all(&func.results, &cx.shape_subst);

    let mut body = self.subst_node(&mut cx, root)?;
    if self.config.dict_check {
      body = self.prepend_dict_check(&mut cx, body, &shapes, span.clone())?;
    }

    self.defs.update(
      &func_id,
      DefinitionKind::Function(FunctionDefinition {
        type_params: Vec::new(),
        receiver: None,
        owner_type: None,
        params,
        results,
        origin: FunctionOrigin::Instantiation,
        dupok: true,
      }),
    );
    self.ir.bodies.insert(func_id, body);
    self.ir.items.push(func_id);

    let entry = self.instantiations.get_mut(&inst);
    entry.dict_entries = cx.dict_entries;
    entry.reads = cx.reads;
    entry.complete = true;

    Ok(inst)
  }

  /// Already-built instantiation for `decl` at `args`' shapes, without building one.
  pub fn find_instantiation(
    &mut self,
    decl: DefinitionId,
    args: &[TypeId],
    is_method: bool,
  ) -> EngineResult<Option<InstId>> {
    let shapes = args
      .iter()
      .map(|arg| self.shape_of(*arg))
      .collect::<EngineResult<Vec<_>>>()?;
    let key = InstKey {
      decl,
      shapes,
      is_method,
    };
    Ok(self.inst_cache.get(&key).copied())
  }

  fn subst_type(
    &mut self,
    cx: &Subster,
    ty: TypeId,
  ) -> TypeId {
    let substituted = self.types.substitute(ty, &cx.shape_subst);
    self.note_type(substituted);
    substituted
  }

  /// Parameters and locals get one copy per instantiation, retyped with shapes.
  fn map_local(
    &mut self,
    cx: &mut Subster,
    def: DefinitionId,
  ) -> DefinitionId {
    if !self.defs.is_local(&def) {
      return def;
    }

    if let Some(&mapped) = cx.vars.get(&def) {
      return mapped;
    }

    let original = self.defs.get(&def).clone();
    let kind = match original.kind {
      DefinitionKind::Parameter(p) => DefinitionKind::Parameter(ParameterDefinition {
        type_id: self.subst_type(cx, p.type_id),
      }),
      DefinitionKind::Variable(v) => DefinitionKind::Variable(VariableDefinition {
        type_id: self.subst_type(cx, v.type_id),
        mutable: v.mutable,
      }),
      other => other,
    };

    let mapped = self.defs.alloc(Definition {
      kind,
      name: original.name,
      span: original.span,
    });
    cx.vars.insert(def, mapped);
    mapped
  }

  fn subst_nodes(
    &mut self,
    cx: &mut Subster,
    ids: &[NodeId],
  ) -> EngineResult<Vec<NodeId>> {
    ids.iter().map(|id| self.subst_node(cx, *id)).collect()
  }

  fn subst_opt(
    &mut self,
    cx: &mut Subster,
    id: Option<NodeId>,
  ) -> EngineResult<Option<NodeId>> {
    id.map(|id| self.subst_node(cx, id)).transpose()
  }

  fn subst_node(
    &mut self,
    cx: &mut Subster,
    id: NodeId,
  ) -> EngineResult<NodeId> {
    let node = self.ir.get(&id).clone();
    let span = node.span.clone();
    let ty = self.subst_type(cx, node.type_id);

    let kind = match node.kind {
      NodeKind::Literal(value) => NodeKind::Literal(value),
      NodeKind::Variable(def) => NodeKind::Variable(self.map_local(cx, def)),
      NodeKind::FuncRef(def) => NodeKind::FuncRef(def),
      NodeKind::Binary { operation, left, right } => {
        let mut new_left = self.subst_node(cx, left)?;
        let mut new_right = self.subst_node(cx, right)?;
        if operation.is_equality() {
          let left_ty = self.ir.get(&left).type_id;
          let right_ty = self.ir.get(&right).type_id;
          new_left = self.box_for_comparison(cx, new_left, left_ty, right_ty, &span)?;
          new_right = self.box_for_comparison(cx, new_right, right_ty, left_ty, &span)?;
        }
        NodeKind::Binary {
          operation,
          left: new_left,
          right: new_right,
        }
      },
      NodeKind::Unary { operation, operand } => NodeKind::Unary {
        operation,
        operand: self.subst_node(cx, operand)?,
      },
      NodeKind::Call { callee, args } => NodeKind::Call {
        callee,
        args: self.subst_nodes(cx, &args)?,
      },
      NodeKind::CallValue { callee, args } => NodeKind::CallValue {
        callee: self.subst_node(cx, callee)?,
        args: self.subst_nodes(cx, &args)?,
      },
      NodeKind::GenericCall {
        target,
        type_args,
        receiver,
        args,
      } => NodeKind::GenericCall {
        target,
        type_args: type_args.iter().map(|t| self.subst_type(cx, *t)).collect(),
        receiver: self.subst_opt(cx, receiver)?,
        args: self.subst_nodes(cx, &args)?,
      },
      NodeKind::GenericRef {
        target,
        type_args,
        receiver,
        kind,
      } => NodeKind::GenericRef {
        target,
        type_args: type_args.iter().map(|t| self.subst_type(cx, *t)).collect(),
        receiver: self.subst_opt(cx, receiver)?,
        kind,
      },
      NodeKind::MethodCall { receiver, method, args } => {
        let receiver_ty = self.ir.get(&receiver).type_id;
        let mut new_receiver = self.subst_node(cx, receiver)?;
        let new_args = self.subst_nodes(cx, &args)?;

        if let Some(param) = self.types.receiver_param(&receiver_ty) {
          let param_ty = self.types.param(param);
          let bound = match self.defs.type_param(&param) {
            Some(tp) => tp.constraint,
            None => return Err(self.unexpected_node(&cx.decl, &id)),
          };
          let bound = self.subst_type(cx, bound);

          if self.types.is_pointer(&receiver_ty) {
            let value_ty = self.subst_type(cx, param_ty);
            new_receiver = self.new_node(NodeKind::Dereference(new_receiver), value_ty, span.clone());
          }
          new_receiver = self.convert_using_dictionary(cx, new_receiver, param_ty, bound, &span)?;
        }

        NodeKind::MethodCall {
          receiver: new_receiver,
          method,
          args: new_args,
        }
      },
      NodeKind::ConvertToInterface { value, target } => {
        let value_ty = self.ir.get(&value).type_id;
        let new_value = self.subst_node(cx, value)?;
        let new_target = self.subst_type(cx, target);
        return self.convert_using_dictionary(cx, new_value, value_ty, new_target, &span);
      },
      NodeKind::MakeInterface { descriptor, data } => NodeKind::MakeInterface {
        descriptor: self.subst_node(cx, descriptor)?,
        data: self.subst_node(cx, data)?,
      },
      NodeKind::TypeAssert { value, target, .. } => {
        let new_value = self.subst_node(cx, value)?;
        let descriptor = if self.types.has_type_param(&target) {
          Some(self.type_descriptor_for(cx, target, &span)?)
        } else {
          None
        };
        NodeKind::TypeAssert {
          value: new_value,
          target: self.subst_type(cx, target),
          descriptor,
        }
      },
      NodeKind::Builtin { op, operand, args, .. } => {
        let new_args = self.subst_nodes(cx, &args)?;
        let descriptor = if op.needs_descriptor() && self.types.has_type_param(&operand) {
          Some(self.type_descriptor_for(cx, operand, &span)?)
        } else {
          None
        };
        NodeKind::Builtin {
          op,
          operand: self.subst_type(cx, operand),
          args: new_args,
          descriptor,
        }
      },
      NodeKind::FieldAccess { base, field } => NodeKind::FieldAccess {
        base: self.subst_node(cx, base)?,
        field,
      },
      NodeKind::Index { base, index } => NodeKind::Index {
        base: self.subst_node(cx, base)?,
        index: self.subst_node(cx, index)?,
      },
      NodeKind::Dereference(inner) => NodeKind::Dereference(self.subst_node(cx, inner)?),
      NodeKind::AddressOf(inner) => NodeKind::AddressOf(self.subst_node(cx, inner)?),
      NodeKind::RecordLiteral { ty: record, fields } => NodeKind::RecordLiteral {
        ty: self.subst_type(cx, record),
        fields: self.subst_nodes(cx, &fields)?,
      },
      NodeKind::Closure { func, captures } => self.clone_closure(cx, func, &captures, &span)?,
      NodeKind::DictionaryRead { dict, slot, len } => NodeKind::DictionaryRead {
        dict: self.subst_node(cx, dict)?,
        slot,
        len,
      },
      NodeKind::DictionaryAddr(symbol) => NodeKind::DictionaryAddr(symbol),
      NodeKind::TypeDescriptor(described) => NodeKind::TypeDescriptor(self.subst_type(cx, described)),
      NodeKind::CheckDescriptor { descriptor, shape } => NodeKind::CheckDescriptor {
        descriptor: self.subst_node(cx, descriptor)?,
        shape,
      },
      NodeKind::Let { var, value } => NodeKind::Let {
        var: self.map_local(cx, var),
        value: self.subst_opt(cx, value)?,
      },
      NodeKind::Assign { target, value } => NodeKind::Assign {
        target: self.subst_node(cx, target)?,
        value: self.subst_node(cx, value)?,
      },
      NodeKind::Block { statements, expression } => NodeKind::Block {
        statements: self.subst_nodes(cx, &statements)?,
        expression: self.subst_opt(cx, expression)?,
      },
      NodeKind::If {
        condition,
        then_branch,
        else_branch,
      } => NodeKind::If {
        condition: self.subst_node(cx, condition)?,
        then_branch: self.subst_node(cx, then_branch)?,
        else_branch: self.subst_opt(cx, else_branch)?,
      },
      NodeKind::Loop { condition, body } => NodeKind::Loop {
        condition: self.subst_opt(cx, condition)?,
        body: self.subst_node(cx, body)?,
      },
      NodeKind::Break => NodeKind::Break,
      NodeKind::Continue => NodeKind::Continue,
      NodeKind::Return(values) => NodeKind::Return(self.subst_nodes(cx, &values)?),
      NodeKind::ExpressionStatement(inner) => NodeKind::ExpressionStatement(self.subst_node(cx, inner)?),
      NodeKind::Panic(inner) => NodeKind::Panic(self.subst_node(cx, inner)?),
    };

    let new_id = self.new_node(kind, ty, span);

    if let Some(ordinal) = cx.info.site_ordinal(id) {
      let slot = cx.info.start_sub_dict() + ordinal;
      cx.dict_entries.insert(new_id, slot);
      // Bound-method sites box through the descriptor and never read their slot.
      if cx.info.sub_dict_sites[ordinal as usize].kind != SiteKind::BoundMethod {
        cx.reads.push(SlotRead {
          slot,
          source: SlotSource::SubDictionary(ordinal),
        });
      }
    }

    Ok(new_id)
  }

  /// Copy of a closure living inside the instantiation. It captures the enclosing dictionary
  /// and reads the same layout through it.
  fn clone_closure(
    &mut self,
    cx: &mut Subster,
    func: DefinitionId,
    captures: &[Capture],
    span: &Span,
  ) -> EngineResult<NodeKind> {
    let Some(closure) = self.defs.function(&func).cloned() else {
      return Err(
        InternalError::MissingBody {
          decl: self.decl_name(&func),
          span: span.clone(),
        }
        .report(),
      );
    };
    let Some(root) = self.ir.body(&func) else {
      return Err(
        InternalError::MissingBody {
          decl: self.decl_name(&func),
          span: span.clone(),
        }
        .report(),
      );
    };

    let mut new_captures = Vec::with_capacity(captures.len() + 1);
    for capture in captures {
      new_captures.push(Capture {
        value: self.subst_node(cx, capture.value)?,
        var: self.map_local(cx, capture.var),
      });
    }

    let uintptr = self.types.uintptr();
    let outer_dict = self.new_node(NodeKind::Variable(cx.current_dict()), uintptr, span.clone());
    let dict_var = self.new_local(".dict", uintptr, span.clone());
    new_captures.push(Capture {
      value: outer_dict,
      var: dict_var,
    });

    let params = closure.params.iter().map(|p| self.map_local(cx, *p)).collect();
    let results = self.types.substitute_all(&closure.results, &cx.shape_subst);

    let owner = self.instantiations.get(&cx.inst).func;
    let name = naming::closure_name(self, owner);
    let new_func = self.defs.alloc(Definition {
      kind: DefinitionKind::Function(FunctionDefinition {
        type_params: Vec::new(),
        receiver: None,
        owner_type: None,
        params,
        results,
        origin: FunctionOrigin::Closure,
        dupok: false,
      }),
      name,
      span: span.clone(),
    });

    cx.dict_vars.push(dict_var);
    let body = self.subst_node(cx, root);
    cx.dict_vars.pop();
    let body = body?;

    self.ir.bodies.insert(new_func, body);
    self.dict_contexts.insert(new_func, DictContext { inst: cx.inst, dict_var });

    trace_dbg!(
      &self.config,
      DebugTrace::Closure,
      "cloned closure {} into {}",
      self.decl_name(&func),
      self.decl_name(&new_func)
    );

    Ok(NodeKind::Closure {
      func: new_func,
      captures: new_captures,
    })
  }

  /// Boxes `value` (already rewritten, originally of generic type `source`) into `target`.
  /// When the runtime type of `value` depends on the type arguments the descriptor comes from
  /// the dictionary, unless the argument's shape is an interface.
  fn convert_using_dictionary(
    &mut self,
    cx: &mut Subster,
    value: NodeId,
    source: TypeId,
    target: TypeId,
    span: &Span,
  ) -> EngineResult<NodeId> {
    if !self.types.is_interface(target, &self.defs) {
      return Err(
        InternalError::ConversionToNonInterface {
          from: self.type_name(&source),
          to: self.type_name(&target),
          span: span.clone(),
        }
        .report(),
      );
    }

    let shaped_source = self.types.substitute(source, &cx.shape_subst);
    let static_conversion =
      !self.types.has_type_param(&source) || self.types.is_interface(shaped_source, &self.defs);

    if static_conversion {
      return Ok(self.new_node(NodeKind::ConvertToInterface { value, target }, target, span.clone()));
    }

    let descriptor = self.type_descriptor_for(cx, source, span)?;
    Ok(self.new_node(NodeKind::MakeInterface { descriptor, data: value }, target, span.clone()))
  }

  /// In `a == b` where one side is an interface and the other has a parameter-dependent type,
  /// box the other side through the dictionary.
  fn box_for_comparison(
    &mut self,
    cx: &mut Subster,
    value: NodeId,
    value_ty: TypeId,
    other_ty: TypeId,
    span: &Span,
  ) -> EngineResult<NodeId> {
    if !self.types.has_type_param(&value_ty) || self.types.is_interface(value_ty, &self.defs) {
      return Ok(value);
    }

    if !self.types.is_interface(other_ty, &self.defs) {
      return Ok(value);
    }

    let target = self.subst_type(cx, other_ty);
    self.convert_using_dictionary(cx, value, value_ty, target, span)
  }

  fn type_descriptor_for(
    &mut self,
    cx: &mut Subster,
    ty: TypeId,
    span: &Span,
  ) -> EngineResult<NodeId> {
    let Some(slot) = cx.info.find_dict_type(ty) else {
      return Err(
        InternalError::UnrecordedDerivedType {
          decl: self.decl_name(&cx.decl),
          ty: self.type_name(&ty),
          span: span.clone(),
        }
        .report(),
      );
    };

    let read = self.dictionary_read(cx, slot, span)?;
    cx.reads.push(SlotRead {
      slot,
      source: SlotSource::Type(ty),
    });
    Ok(read)
  }

  fn dictionary_read(
    &mut self,
    cx: &Subster,
    slot: u32,
    span: &Span,
  ) -> EngineResult<NodeId> {
    let start = cx.info.start_sub_dict();
    if slot >= start {
      return Err(
        InternalError::DictionarySlotOutOfRange {
          decl: self.decl_name(&cx.decl),
          slot,
          start: 0,
          end: start,
          span: span.clone(),
        }
        .report(),
      );
    }

    let uintptr = self.types.uintptr();
    let dict = self.new_node(NodeKind::Variable(cx.current_dict()), uintptr, span.clone());
    Ok(self.new_node(
      NodeKind::DictionaryRead {
        dict,
        slot,
        len: cx.info.dict_len(),
      },
      uintptr,
      span.clone(),
    ))
  }

  /// Prologue asserting at run time that dictionary slot `i` describes a type of shape `shapes[i]`.
  fn prepend_dict_check(
    &mut self,
    cx: &mut Subster,
    body: NodeId,
    shapes: &[TypeId],
    span: Span,
  ) -> EngineResult<NodeId> {
    let void = self.types.void();
    let mut statements = Vec::with_capacity(shapes.len() + 1);

    for (i, shape) in shapes.iter().enumerate() {
      let descriptor = self.dictionary_read(cx, i as u32, &span)?;
      cx.reads.push(SlotRead {
        slot: i as u32,
        source: SlotSource::Type(cx.info.tparams[i]),
      });
      statements.push(self.new_node(
        NodeKind::CheckDescriptor {
          descriptor,
          shape: *shape,
        },
        void,
        span.clone(),
      ));
    }

    let body_node = self.ir.get(&body).clone();
    let kind = match body_node.kind {
      NodeKind::Block {
        statements: existing,
        expression,
      } => {
        statements.extend(existing);
        NodeKind::Block { statements, expression }
      },
      _ => {
        statements.push(body);
        NodeKind::Block {
          statements,
          expression: None,
        }
      },
    };

    Ok(self.new_node(kind, body_node.type_id, body_node.span))
  }
}
