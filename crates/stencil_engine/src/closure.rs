use stencil_config::DebugTrace;
use stencil_diagnostics::message::InternalError;
use stencil_ir::{Capture, NodeId, NodeKind, RefKind};
use stencil_log::trace_dbg;
use stencil_type::definition::{Definition, DefinitionId, DefinitionKind, FunctionDefinition, FunctionOrigin};

use crate::{
  naming,
  session::{DictContext, EngineResult, Session},
};

impl Session {
  /// Replaces the generic function value at `node` with a closure that forwards its arguments,
  /// together with the right dictionary, to the shape instantiation.
  ///
  /// The dictionary and the method-value receiver are evaluated once, when the closure is
  /// created, and captured.
  pub(crate) fn closure_for(
    &mut self,
    owner: DefinitionId,
    ctx: Option<DictContext>,
    node: NodeId,
  ) -> EngineResult<()> {
    let original = self.ir.get(&node).clone();
    let span = original.span.clone();
    let NodeKind::GenericRef {
      target,
      type_args,
      receiver,
      kind,
    } = original.kind
    else {
      return Err(self.unexpected_node(&owner, &node));
    };

    let is_method = self.is_method_decl(&target);
    let inst = self.instantiate(target, &type_args, is_method)?;
    let (dict_expr, from_parent) = self.dict_or_subdict(ctx, node, target, &type_args, is_method, &span)?;

    let inst_func = self.instantiations.get(&inst).func;
    let receiver_ty = self
      .defs
      .function(&target)
      .and_then(|f| f.receiver)
      .and_then(|r| self.defs.type_of(&r));
    let value_receiver = receiver_ty.is_some_and(|ty| !self.types.is_pointer(&ty));

    let Some((params, results)) = self
      .types
      .function_signature(&original.type_id)
      .map(|(p, r)| (p.to_vec(), r.to_vec()))
    else {
      return Err(
        InternalError::UnexpectedNode {
          decl: self.decl_name(&owner),
          node: node.index(),
          kind: "GenericRef of non-function type".to_string(),
          span,
        }
        .report(),
      );
    };

    let name = naming::closure_name(self, owner);
    let mut captures = Vec::new();

    let dict_arg = if from_parent {
      let uintptr = self.types.uintptr();
      let var_name = naming::temporary_name(self, owner, ".dict");
      let var = self.new_local(&var_name, uintptr, span.clone());
      captures.push(Capture { value: dict_expr, var });
      self.new_node(NodeKind::Variable(var), uintptr, span.clone())
    } else {
      dict_expr
    };

    let mut call_args = vec![dict_arg];

    if let (RefKind::MethodValue, Some(recv)) = (kind, receiver) {
      let mut recv_value = recv;
      let mut recv_ty = self.ir.get(&recv).type_id;
      if value_receiver {
        if let Some(target_ty) = self.types.pointer_target(&recv_ty) {
          recv_value = self.new_node(NodeKind::Dereference(recv), target_ty, span.clone());
          recv_ty = target_ty;
        }
      }

      let var_name = naming::temporary_name(self, owner, ".rcvr");
      let var = self.new_local(&var_name, recv_ty, span.clone());
      captures.push(Capture { value: recv_value, var });
      call_args.push(self.new_node(NodeKind::Variable(var), recv_ty, span.clone()));
    }

    let mut param_defs = Vec::with_capacity(params.len());
    for (i, param_ty) in params.iter().enumerate() {
      let param = self.new_param(&format!("a{}", i), *param_ty, span.clone());
      param_defs.push(param);

      let mut arg = self.new_node(NodeKind::Variable(param), *param_ty, span.clone());
      if i == 0 && kind == RefKind::MethodExpr && value_receiver {
        if let Some(target_ty) = self.types.pointer_target(param_ty) {
          arg = self.new_node(NodeKind::Dereference(arg), target_ty, span.clone());
        }
      }
      call_args.push(arg);
    }

    let result_ty = self.types.results_type(&results);
    let call = self.new_node(
      NodeKind::Call {
        callee: inst_func,
        args: call_args,
      },
      result_ty,
      span.clone(),
    );

    let void = self.types.void();
    let statement = if results.is_empty() {
      self.new_node(NodeKind::ExpressionStatement(call), void, span.clone())
    } else {
      self.new_node(NodeKind::Return(vec![call]), void, span.clone())
    };
    let body = self.new_node(
      NodeKind::Block {
        statements: vec![statement],
        expression: None,
      },
      void,
      span.clone(),
    );

    let func = self.defs.alloc(Definition {
      kind: DefinitionKind::Function(FunctionDefinition {
        type_params: Vec::new(),
        receiver: None,
        owner_type: None,
        params: param_defs,
        results,
        origin: FunctionOrigin::Thunk,
        dupok: false,
      }),
      name,
      span,
    });
    self.ir.bodies.insert(func, body);

    trace_dbg!(
      &self.config,
      DebugTrace::Closure,
      "{} forwards to {} ({} captures)",
      self.decl_name(&func),
      self.decl_name(&inst_func),
      captures.len()
    );

    self.ir.get_mut(&node).kind = NodeKind::Closure { func, captures };
    Ok(())
  }
}
