//! Dictionaries: read-only blobs carrying everything a shape instantiation needs to know about
//! the exact type arguments it runs with.

use serde::Serialize;
use stencil_config::DebugTrace;
use stencil_diagnostics::message::InternalError;
use stencil_ir::{NodeId, NodeKind};
use stencil_log::{log_trc, trace_dbg};
use stencil_type::{
  Id,
  definition::DefinitionId,
  span::Span,
  symbol::SymbolId,
  types::{Substitution, Type, TypeId},
};

use crate::{
  analyze::SiteKind,
  naming,
  session::{DictContext, EngineResult, Session},
};

pub type DictionaryId = Id<Dictionary>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DictKey {
  pub decl: DefinitionId,
  pub args: Vec<TypeId>,
  pub is_method: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictEntry {
  /// Descriptor of a type argument.
  TypeArg(TypeId),
  /// Descriptor of a derived type, already substituted.
  Derived(TypeId),
  /// Sub-dictionary for a call site; `None` when the site turned out not to need one.
  SubDictionary(Option<DictionaryId>),
}

#[derive(Debug, Clone)]
pub struct Dictionary {
  pub key: DictKey,
  pub symbol: SymbolId,
  pub entries: Vec<DictEntry>,
  pub read_only: bool,
  pub dupok: bool,
  /// False while sub-dictionaries are still being resolved.
  pub complete: bool,
}

/// One emitted word of a dictionary blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DictWord {
  TypeDescriptor(String),
  Dictionary(String),
  Null,
}

impl std::fmt::Display for DictWord {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>,
  ) -> std::fmt::Result {
    match self {
      DictWord::TypeDescriptor(name) => write!(f, "{}", name),
      DictWord::Dictionary(name) => write!(f, "&{}", name),
      DictWord::Null => write!(f, "nil"),
    }
  }
}

impl Session {
  /// Dictionary of `decl` for the concrete `args`, built on first request.
  pub fn dictionary_for(
    &mut self,
    decl: DefinitionId,
    args: &[TypeId],
    is_method: bool,
  ) -> EngineResult<DictionaryId> {
    let span = self.span_of(&decl);

    if args.is_empty() {
      return Err(
        InternalError::MissingTypeArguments {
          decl: self.decl_name(&decl),
          span,
        }
        .report(),
      );
    }

    for arg in args {
      if self.types.has_shape(arg) || self.types.has_type_param(arg) {
        return Err(
          InternalError::ShapeInDictionary {
            decl: self.decl_name(&decl),
            ty: self.type_name(arg),
            span,
          }
          .report(),
        );
      }

      let depth = self.types.depth(arg);
      if depth > self.config.max_type_depth {
        return Err(
          InternalError::TypeDepthExceeded {
            decl: self.decl_name(&decl),
            ty: self.type_name(arg),
            depth,
            limit: self.config.max_type_depth,
            span,
          }
          .report(),
        );
      }
    }

    let key = DictKey {
      decl,
      args: args.to_vec(),
      is_method,
    };
    if let Some(&dict) = self.dict_cache.get(&key) {
      log_trc!(&self.config, "reusing {}", self.dictionary_symbol(&dict));
      return Ok(dict);
    }

    let type_params = self
      .defs
      .function(&decl)
      .map(|f| f.type_params.clone())
      .unwrap_or_default();
    if type_params.len() != args.len() {
      return Err(
        InternalError::TypeArgumentCount {
          decl: self.decl_name(&decl),
          expected: type_params.len(),
          found: args.len(),
          span,
        }
        .report(),
      );
    }

    let info = self.analyze(decl)?;
    let symbol = naming::dictionary_name(self, decl, args, is_method);

    // Registered before the sub-dictionaries so self-references resolve to this entry.
    let dict = self.dictionaries.alloc(Dictionary {
      key: key.clone(),
      symbol,
      entries: Vec::with_capacity(info.dict_len() as usize),
      read_only: true,
      dupok: true,
      complete: false,
    });
    self.dict_cache.insert(key, dict);

    trace_dbg!(
      &self.config,
      DebugTrace::Dictionary,
      "{} ({} words)",
      self.symbols.get(&symbol),
      info.dict_len()
    );

    let subst = Substitution::for_params(&type_params, args);
    let mut entries = Vec::with_capacity(info.dict_len() as usize);

    for arg in args {
      self.mark_reachable(*arg);
      entries.push(DictEntry::TypeArg(*arg));
    }

    for derived in &info.derived_types {
      let concrete = self.types.substitute(*derived, &subst);
      self.mark_reachable(concrete);
      entries.push(DictEntry::Derived(concrete));
    }

    for site in &info.sub_dict_sites {
      let sub = self.resolve_sub_dictionary(decl, site.node, site.kind, &subst)?;
      entries.push(DictEntry::SubDictionary(sub));
    }

    let entry = self.dictionaries.get_mut(&dict);
    entry.entries = entries;
    entry.complete = true;

    Ok(dict)
  }

  fn resolve_sub_dictionary(
    &mut self,
    decl: DefinitionId,
    node: NodeId,
    kind: SiteKind,
    subst: &Substitution,
  ) -> EngineResult<Option<DictionaryId>> {
    match self.ir.get(&node).kind.clone() {
      NodeKind::GenericCall { target, type_args, .. } | NodeKind::GenericRef { target, type_args, .. } => {
        let args = self.types.substitute_all(&type_args, subst);
        for arg in &args {
          self.note_type(*arg);
        }
        let is_method = self.is_method_decl(&target);
        Ok(Some(self.dictionary_for(target, &args, is_method)?))
      },
      NodeKind::MethodCall { receiver, method, .. } if kind == SiteKind::BoundMethod => {
        let receiver_ty = self.ir.get(&receiver).type_id;
        let concrete = self.types.substitute(receiver_ty, subst);
        let concrete = self.types.pointer_target(&concrete).unwrap_or(concrete);

        let Type::Named { def: owner, args } = self.types.get(&concrete).clone() else {
          return Ok(None);
        };
        if args.is_empty() {
          return Ok(None);
        }

        let Some(found) = self.defs.find_method(&owner, &method) else {
          return Err(
            InternalError::MethodNotFound {
              owner: self.type_name(&concrete),
              method: self.symbols.get(&method).to_string(),
              span: self.ir.get(&node).span.clone(),
            }
            .report(),
          );
        };

        Ok(Some(self.dictionary_for(found, &args, true)?))
      },
      _ => Err(self.unexpected_node(&decl, &node)),
    }
  }

  pub(crate) fn is_method_decl(
    &self,
    decl: &DefinitionId,
  ) -> bool {
    self.defs.function(decl).is_some_and(|f| f.is_method())
  }

  /// Dictionary argument for a generic use at `node`. Inside an instantiation (or one of its
  /// closures) a parameter-dependent use reads its sub-dictionary slot from the enclosing
  /// dictionary; a fully concrete use takes the static dictionary's address.
  ///
  /// Returns the dictionary expression and whether it came from the enclosing dictionary.
  pub(crate) fn dict_or_subdict(
    &mut self,
    ctx: Option<DictContext>,
    node: NodeId,
    target: DefinitionId,
    args: &[TypeId],
    is_method: bool,
    span: &Span,
  ) -> EngineResult<(NodeId, bool)> {
    let uintptr = self.types.uintptr();

    if let Some(ctx) = ctx {
      let inst = self.instantiations.get(&ctx.inst);
      if let Some(&slot) = inst.dict_entries.get(&node) {
        let (start, len) = (inst.start_sub_dict, inst.dict_len);
        if slot < start || slot >= len {
          return Err(
            InternalError::DictionarySlotOutOfRange {
              decl: self.decl_name(&inst.key.decl),
              slot,
              start,
              end: len,
              span: span.clone(),
            }
            .report(),
          );
        }

        let dict = self.new_node(NodeKind::Variable(ctx.dict_var), uintptr, span.clone());
        let read = self.new_node(NodeKind::DictionaryRead { dict, slot, len }, uintptr, span.clone());
        return Ok((read, true));
      }
    }

    if args.iter().any(|a| self.types.has_shape(a) || self.types.has_type_param(a)) {
      let owner = ctx
        .map(|c| self.instantiations.get(&c.inst).key.decl)
        .unwrap_or(target);
      return Err(
        InternalError::MissingSubDictionary {
          decl: self.decl_name(&owner),
          node: node.index(),
          span: span.clone(),
        }
        .report(),
      );
    }

    let dict = self.dictionary_for(target, args, is_method)?;
    let symbol = self.dictionaries.get(&dict).symbol;
    Ok((self.new_node(NodeKind::DictionaryAddr(symbol), uintptr, span.clone()), false))
  }

  /// Emitted words of a dictionary, in slot order.
  pub fn dictionary_words(
    &self,
    id: &DictionaryId,
  ) -> Vec<DictWord> {
    self
      .dictionaries
      .get(id)
      .entries
      .iter()
      .map(|entry| match entry {
        DictEntry::TypeArg(ty) | DictEntry::Derived(ty) => {
          DictWord::TypeDescriptor(naming::descriptor_symbol(self, ty))
        },
        DictEntry::SubDictionary(Some(sub)) => {
          let symbol = self.dictionaries.get(sub).symbol;
          DictWord::Dictionary(self.symbols.get(&symbol).to_string())
        },
        DictEntry::SubDictionary(None) => DictWord::Null,
      })
      .collect()
  }

  pub fn dictionary_symbol(
    &self,
    id: &DictionaryId,
  ) -> &str {
    self.symbols.get(&self.dictionaries.get(id).symbol)
  }

  fn mark_reachable(
    &mut self,
    ty: TypeId,
  ) {
    self.reachable.insert(ty);
    self.note_type(ty);
  }
}
