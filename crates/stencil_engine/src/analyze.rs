use std::rc::Rc;

use stencil_config::DebugTrace;
use stencil_diagnostics::message::InternalError;
use stencil_ir::{NodeId, NodeKind};
use stencil_log::trace_dbg;
use stencil_type::{definition::DefinitionId, types::TypeId};

use crate::session::{EngineResult, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind {
  /// Call of a generic function or method with parameter-dependent type arguments.
  Call,
  /// Generic function value, method value or method expression.
  Value,
  /// Method call through a type parameter's bound. Needs a dictionary only when the concrete
  /// receiver is itself an instantiated generic type.
  BoundMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubDictSite {
  pub node: NodeId,
  pub kind: SiteKind,
}

/// What a generic declaration needs from its dictionary. Computed once per declaration; both the
/// instantiation's slot offsets and the dictionary's contents come from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyInfo {
  pub decl: DefinitionId,
  pub type_params: Vec<DefinitionId>,
  /// `Type::Param` of every type parameter, in declaration order.
  pub tparams: Vec<TypeId>,
  pub derived_types: Vec<TypeId>,
  pub sub_dict_sites: Vec<SubDictSite>,
}

impl BodyInfo {
  pub fn start_sub_dict(&self) -> u32 {
    (self.tparams.len() + self.derived_types.len()) as u32
  }

  pub fn dict_len(&self) -> u32 {
    self.start_sub_dict() + self.sub_dict_sites.len() as u32
  }

  /// Dictionary slot holding the descriptor of `ty`.
  pub fn find_dict_type(
    &self,
    ty: TypeId,
  ) -> Option<u32> {
    if let Some(i) = self.tparams.iter().position(|t| *t == ty) {
      return Some(i as u32);
    }

    self
      .derived_types
      .iter()
      .position(|t| *t == ty)
      .map(|i| (self.tparams.len() + i) as u32)
  }

  pub fn site_ordinal(
    &self,
    node: NodeId,
  ) -> Option<u32> {
    self.sub_dict_sites.iter().position(|s| s.node == node).map(|i| i as u32)
  }
}

impl Session {
  /// Scans a generic declaration for everything that depends on its type arguments.
  pub fn analyze(
    &mut self,
    decl: DefinitionId,
  ) -> EngineResult<Rc<BodyInfo>> {
    if let Some(info) = self.body_infos.get(&decl) {
      return Ok(info.clone());
    }

    let func = match self.defs.function(&decl) {
      Some(func) if func.is_generic() => func.clone(),
      _ => {
        return Err(
          InternalError::NotGeneric {
            decl: self.decl_name(&decl),
            span: self.span_of(&decl),
          }
          .report(),
        );
      },
    };

    let root = self.ensure_body(decl)?;

    let tparams = func.type_params.iter().map(|p| self.types.param(*p)).collect();
    let mut info = BodyInfo {
      decl,
      type_params: func.type_params.clone(),
      tparams,
      derived_types: Vec::new(),
      sub_dict_sites: Vec::new(),
    };

    for param in func.receiver.iter().chain(func.params.iter()) {
      if let Some(ty) = self.defs.type_of(param) {
        self.add_derived_type(&mut info, ty);
      }
    }
    for result in &func.results {
      self.add_derived_type(&mut info, *result);
    }

    self.visit_generic_body(&mut info, root)?;

    trace_dbg!(
      &self.config,
      DebugTrace::Analyze,
      "{}: {} type params, {} derived types, {} sub-dictionaries",
      self.decl_name(&decl),
      info.tparams.len(),
      info.derived_types.len(),
      info.sub_dict_sites.len()
    );

    let info = Rc::new(info);
    self.body_infos.insert(decl, info.clone());
    Ok(info)
  }

  fn visit_generic_body(
    &mut self,
    info: &mut BodyInfo,
    root: NodeId,
  ) -> EngineResult<()> {
    for id in self.ir.preorder(root) {
      let node = self.ir.get(&id).clone();

      // Function types only matter when a variable holds them.
      let is_value = matches!(node.kind, NodeKind::Variable(_));
      if is_value || !self.types.is_function(&node.type_id) {
        self.add_derived_type(info, node.type_id);
      }

      match &node.kind {
        NodeKind::Let { var, .. } => {
          if let Some(ty) = self.defs.type_of(var) {
            self.add_derived_type(info, ty);
          }
        },
        NodeKind::ConvertToInterface { value, target } => {
          // The source is boxed through its descriptor, whatever kind of type it is.
          let source = self.ir.get(value).type_id;
          self.add_derived_type(info, source);
          self.add_derived_type(info, *target);
        },
        NodeKind::TypeAssert { target, .. } => self.add_derived_type(info, *target),
        NodeKind::Binary { operation, left, right } if operation.is_equality() => {
          let left_ty = self.ir.get(left).type_id;
          let right_ty = self.ir.get(right).type_id;
          if self.types.is_interface(left_ty, &self.defs) || self.types.is_interface(right_ty, &self.defs) {
            self.add_derived_type(info, left_ty);
            self.add_derived_type(info, right_ty);
          }
        },
        NodeKind::Builtin { operand, .. } => self.add_derived_type(info, *operand),
        NodeKind::RecordLiteral { ty, .. } => self.add_derived_type(info, *ty),
        NodeKind::GenericCall { type_args, .. } => {
          if type_args.iter().any(|t| self.types.has_type_param(t)) {
            info.sub_dict_sites.push(SubDictSite {
              node: id,
              kind: SiteKind::Call,
            });
          }
        },
        NodeKind::GenericRef { type_args, .. } => {
          if type_args.iter().any(|t| self.types.has_type_param(t)) {
            info.sub_dict_sites.push(SubDictSite {
              node: id,
              kind: SiteKind::Value,
            });
          }
        },
        NodeKind::MethodCall { receiver, .. } => {
          let receiver_ty = self.ir.get(receiver).type_id;
          if self.types.receiver_param(&receiver_ty).is_some() {
            info.sub_dict_sites.push(SubDictSite {
              node: id,
              kind: SiteKind::BoundMethod,
            });
          }
        },
        NodeKind::Closure { func, .. } => {
          // Closures share the enclosing declaration's dictionary.
          if let Some(closure) = self.defs.function(func).cloned() {
            for param in &closure.params {
              if let Some(ty) = self.defs.type_of(param) {
                self.add_derived_type(info, ty);
              }
            }
          }
          let Some(body) = self.ir.body(func) else {
            return Err(
              InternalError::MissingBody {
                decl: self.decl_name(func),
                span: node.span.clone(),
              }
              .report(),
            );
          };
          self.visit_generic_body(info, body)?;
        },
        _ => {},
      }
    }

    Ok(())
  }

  fn add_derived_type(
    &self,
    info: &mut BodyInfo,
    ty: TypeId,
  ) {
    if !self.types.has_type_param(&ty) || self.types.is_param(&ty) || self.types.is_tuple(&ty) {
      return;
    }

    if !info.derived_types.contains(&ty) {
      info.derived_types.push(ty);
    }
  }
}
