//! Work-list driver: rewrites every generic use in non-generic code until no new
//! instantiation, dictionary or instantiated type shows up.

use stencil_config::DebugTrace;
use stencil_diagnostics::message::InternalError;
use stencil_ir::{NodeId, NodeKind};
use stencil_log::{log_dbg, phase_log, phase_ok, phase_warn, trace_dbg};
use stencil_type::{
  definition::{DefinitionId, DefinitionKind},
  types::{Type, TypeId},
};

use crate::session::{DictContext, EngineResult, Session};

impl Session {
  /// Runs the engine over every declaration of the unit.
  ///
  /// `ir.items` grows while this runs: each instantiation is appended and later visited like
  /// any other function, so generic calls inside shared bodies are rewritten too.
  pub fn stencil(&mut self) -> EngineResult<()> {
    phase_log!(&self.config, "Stenciling {} declarations", self.ir.items.len());
    if self.config.dict_check {
      phase_warn!(&self.config, "dictionary self-check enabled");
    }

    self.instantiate_methods()?;

    let mut index = 0;
    while index < self.ir.items.len() {
      let item = self.ir.items[index];
      self.stencil_decl(item)?;
      self.instantiate_methods()?;
      index += 1;
    }

    self.emit_dumps();

    phase_ok!(
      &self.config,
      "{} instantiations, {} dictionaries, {} reachable types",
      self.instantiations.len(),
      self.dictionaries.len(),
      self.reachable.len()
    );

    Ok(())
  }

  fn stencil_decl(
    &mut self,
    item: DefinitionId,
  ) -> EngineResult<()> {
    match self.defs.get(&item).kind.clone() {
      DefinitionKind::Function(func) if func.is_generic() => {
        log_dbg!(&self.config, "skipping generic {}", self.decl_name(&item));
        Ok(())
      },
      DefinitionKind::Function(_) => {
        let Some(root) = self.ir.body(&item) else {
          return Ok(());
        };
        let ctx = self.dict_contexts.get(&item).copied();
        trace_dbg!(&self.config, DebugTrace::Driver, "rewriting {}", self.decl_name(&item));
        self.rewrite_generic_uses(item, ctx, root)
      },
      DefinitionKind::Global(_) => {
        let Some(init) = self.ir.global_inits.get(&item).copied() else {
          return Ok(());
        };
        trace_dbg!(&self.config, DebugTrace::Driver, "rewriting initializer of {}", self.decl_name(&item));
        self.rewrite_generic_uses(item, None, init)
      },
      _ => Ok(()),
    }
  }

  /// Children first: by the time a generic call is replaced its arguments are already rewritten.
  fn rewrite_generic_uses(
    &mut self,
    owner: DefinitionId,
    ctx: Option<DictContext>,
    id: NodeId,
  ) -> EngineResult<()> {
    let node = self.ir.get(&id).clone();

    for child in node.kind.children() {
      self.rewrite_generic_uses(owner, ctx, child)?;
    }

    self.note_type(node.type_id);

    match node.kind {
      NodeKind::GenericCall {
        target,
        type_args,
        receiver,
        args,
      } => {
        let is_method = self.is_method_decl(&target);
        let inst = self.instantiate(target, &type_args, is_method)?;
        let (dict, _) = self.dict_or_subdict(ctx, id, target, &type_args, is_method, &node.span)?;
        let callee = self.instantiations.get(&inst).func;

        let mut call_args = Vec::with_capacity(args.len() + 2);
        call_args.push(dict);
        call_args.extend(receiver);
        call_args.extend(args);

        self.ir.get_mut(&id).kind = NodeKind::Call {
          callee,
          args: call_args,
        };
      },
      NodeKind::GenericRef { .. } => self.closure_for(owner, ctx, id)?,
      NodeKind::Closure { func, .. } => {
        let Some(body) = self.ir.body(&func) else {
          return Err(
            InternalError::MissingBody {
              decl: self.decl_name(&func),
              span: node.span,
            }
            .report(),
          );
        };
        let inner = self.dict_contexts.get(&func).copied().or(ctx);
        self.rewrite_generic_uses(func, inner, body)?;
      },
      _ => {},
    }

    Ok(())
  }

  /// Queues every fully instantiated named type mentioned by `ty` for method instantiation.
  pub(crate) fn note_type(
    &mut self,
    ty: TypeId,
  ) {
    let mut stack = vec![ty];

    while let Some(current) = stack.pop() {
      match self.types.get(&current) {
        Type::Pointer(inner) | Type::Slice(inner) => stack.push(*inner),
        Type::Array { element, .. } => stack.push(*element),
        Type::Map { key, value } => stack.extend([*key, *value]),
        Type::Function { params, results } => stack.extend(params.iter().chain(results.iter())),
        Type::Interface { methods } => stack.extend(methods.iter().map(|m| m.signature)),
        Type::Record { fields } => stack.extend(fields.iter().map(|f| f.type_id)),
        Type::Tuple(elements) => stack.extend(elements.iter()),
        Type::Named { args, .. } => {
          stack.extend(args.iter());
          if self.types.is_fully_instantiated(&current) && self.seen_inst_types.insert(current) {
            self.inst_types.push_back(current);
          }
        },
        _ => {},
      }
    }
  }

  /// Instantiates (and builds dictionaries for) every method of every queued type.
  fn instantiate_methods(&mut self) -> EngineResult<()> {
    while let Some(ty) = self.inst_types.pop_front() {
      let Type::Named { def, args } = self.types.get(&ty).clone() else {
        continue;
      };
      let methods = self
        .defs
        .type_decl(&def)
        .map(|decl| decl.methods.clone())
        .unwrap_or_default();

      for method in methods {
        if !self.defs.function(&method).is_some_and(|f| f.is_generic()) {
          continue;
        }

        trace_dbg!(
          &self.config,
          DebugTrace::Driver,
          "method {} of {}",
          self.decl_name(&method),
          self.type_name(&ty)
        );
        self.instantiate(method, &args, true)?;
        self.dictionary_for(method, &args, true)?;
      }
    }

    Ok(())
  }
}
