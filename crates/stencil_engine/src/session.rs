use std::{
  collections::{BTreeSet, HashMap, HashSet, VecDeque},
  rc::Rc,
};

use stencil_config::{DebugTrace, EngineConfig};
use stencil_diagnostics::{diagnostic_report::Diagnostic, message::InternalError};
use stencil_ir::{IR, Node, NodeId, NodeKind, summary::BodySummary};
use stencil_log::trace_dbg;
use stencil_type::{
  Store,
  definition::{Definition, DefinitionId, DefinitionKind, DefinitionStore, ParameterDefinition, VariableDefinition},
  span::Span,
  symbol::SymbolTable,
  types::{TypeId, TypeStore},
};

use crate::{
  analyze::BodyInfo,
  dictionary::{DictKey, Dictionary, DictionaryId},
  instantiate::{InstId, InstKey, Instantiation},
};

pub type EngineResult<T> = Result<T, Diagnostic>;

/// Supplier of bodies for declarations that are not resident in the IR.
pub trait BodySource {
  /// Serialized `BodySummary` of `decl`, if this source has one.
  fn fetch(
    &mut self,
    decl: DefinitionId,
  ) -> Option<String>;
}

/// In-memory `BodySource` over JSON summaries.
#[derive(Debug, Default)]
pub struct SummaryStore {
  summaries: HashMap<DefinitionId, String>,
}

impl SummaryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(
    &mut self,
    decl: DefinitionId,
    json: String,
  ) {
    self.summaries.insert(decl, json);
  }

  pub fn len(&self) -> usize {
    self.summaries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.summaries.is_empty()
  }
}

impl BodySource for SummaryStore {
  fn fetch(
    &mut self,
    decl: DefinitionId,
  ) -> Option<String> {
    self.summaries.remove(&decl)
  }
}

/// Dictionary visible to a function produced by the engine: the instantiation it belongs to and
/// the variable holding the dictionary pointer inside that function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictContext {
  pub inst: InstId,
  pub dict_var: DefinitionId,
}

/// All state of one stenciling run over a compilation unit.
///
/// Every cache is append-only and lives as long as the session.
pub struct Session {
  pub config: EngineConfig,
  pub types: TypeStore,
  pub defs: DefinitionStore,
  pub symbols: SymbolTable,
  pub ir: IR,

  pub(crate) body_source: Option<Box<dyn BodySource>>,
  pub(crate) shapes: HashMap<TypeId, TypeId>,
  /// Shape -> (name components, fields), reused when a shape is nested in another type.
  pub(crate) shape_parts: HashMap<TypeId, (String, Vec<TypeId>)>,
  pub(crate) body_infos: HashMap<DefinitionId, Rc<BodyInfo>>,
  pub(crate) instantiations: Store<Instantiation>,
  pub(crate) inst_cache: HashMap<InstKey, InstId>,
  pub(crate) dictionaries: Store<Dictionary>,
  pub(crate) dict_cache: HashMap<DictKey, DictionaryId>,
  pub(crate) dict_contexts: HashMap<DefinitionId, DictContext>,
  pub(crate) inst_types: VecDeque<TypeId>,
  pub(crate) seen_inst_types: HashSet<TypeId>,
  pub(crate) reachable: BTreeSet<TypeId>,
  pub(crate) closure_counters: HashMap<DefinitionId, u32>,
}

impl Session {
  pub fn new(
    config: EngineConfig,
    types: TypeStore,
    defs: DefinitionStore,
    symbols: SymbolTable,
    ir: IR,
  ) -> Self {
    Self {
      config,
      types,
      defs,
      symbols,
      ir,
      body_source: None,
      shapes: HashMap::new(),
      shape_parts: HashMap::new(),
      body_infos: HashMap::new(),
      instantiations: Store::new(),
      inst_cache: HashMap::new(),
      dictionaries: Store::new(),
      dict_cache: HashMap::new(),
      dict_contexts: HashMap::new(),
      inst_types: VecDeque::new(),
      seen_inst_types: HashSet::new(),
      reachable: BTreeSet::new(),
      closure_counters: HashMap::new(),
    }
  }

  pub fn with_body_source(
    mut self,
    source: Box<dyn BodySource>,
  ) -> Self {
    self.body_source = Some(source);
    self
  }

  /// Root of `decl`'s body, importing it from the body source on first use.
  pub fn ensure_body(
    &mut self,
    decl: DefinitionId,
  ) -> EngineResult<NodeId> {
    if let Some(root) = self.ir.body(&decl) {
      return Ok(root);
    }

    let fetched = self.body_source.as_mut().and_then(|source| source.fetch(decl));
    let Some(text) = fetched else {
      return Err(
        InternalError::MissingBody {
          decl: self.decl_name(&decl),
          span: self.span_of(&decl),
        }
        .report(),
      );
    };

    let summary = BodySummary::from_json(&text).map_err(|e| {
      InternalError::BodyImport {
        decl: self.decl_name(&decl),
        message: e.to_string(),
        span: self.span_of(&decl),
      }
      .report()
    })?;

    if summary.func != decl {
      return Err(
        InternalError::BodyImport {
          decl: self.decl_name(&decl),
          message: format!("summary belongs to definition {}", summary.func.index()),
          span: self.span_of(&decl),
        }
        .report(),
      );
    }

    let count = summary.nodes.len();
    let root = self.ir.import_body(summary).map_err(|message| {
      InternalError::BodyImport {
        decl: self.decl_name(&decl),
        message,
        span: self.span_of(&decl),
      }
      .report()
    })?;
    trace_dbg!(
      &self.config,
      DebugTrace::Analyze,
      "imported body of {} ({} nodes)",
      self.decl_name(&decl),
      count
    );

    Ok(root)
  }

  pub fn instantiation(
    &self,
    id: &InstId,
  ) -> &Instantiation {
    self.instantiations.get(id)
  }

  pub fn instantiations(&self) -> impl Iterator<Item = (InstId, &Instantiation)> {
    self.instantiations.iter()
  }

  pub fn instantiation_count(&self) -> usize {
    self.instantiations.len()
  }

  pub fn dictionary(
    &self,
    id: &DictionaryId,
  ) -> &Dictionary {
    self.dictionaries.get(id)
  }

  pub fn dictionaries(&self) -> impl Iterator<Item = (DictionaryId, &Dictionary)> {
    self.dictionaries.iter()
  }

  pub fn dictionary_count(&self) -> usize {
    self.dictionaries.len()
  }

  pub fn body_info(
    &self,
    decl: &DefinitionId,
  ) -> Option<Rc<BodyInfo>> {
    self.body_infos.get(decl).cloned()
  }

  pub fn dict_context(
    &self,
    func: &DefinitionId,
  ) -> Option<DictContext> {
    self.dict_contexts.get(func).copied()
  }

  /// Types whose descriptors were referenced from a dictionary, in interning order.
  pub fn reachable_types(&self) -> Vec<TypeId> {
    self.reachable.iter().copied().collect()
  }

  pub fn decl_name(
    &self,
    decl: &DefinitionId,
  ) -> String {
    self.symbols.get(&self.defs.get(decl).name).to_string()
  }

  pub fn type_name(
    &self,
    ty: &TypeId,
  ) -> String {
    self.types.format(ty, &self.defs, &self.symbols)
  }

  pub(crate) fn span_of(
    &self,
    def: &DefinitionId,
  ) -> Span {
    self.defs.get(def).span.clone()
  }

  pub(crate) fn new_node(
    &mut self,
    kind: NodeKind,
    type_id: TypeId,
    span: Span,
  ) -> NodeId {
    self.ir.alloc(Node { kind, span, type_id })
  }

  pub(crate) fn new_param(
    &mut self,
    name: &str,
    type_id: TypeId,
    span: Span,
  ) -> DefinitionId {
    let name = self.symbols.intern(name);
    self.defs.alloc(Definition {
      kind: DefinitionKind::Parameter(ParameterDefinition { type_id }),
      name,
      span,
    })
  }

  pub(crate) fn new_local(
    &mut self,
    name: &str,
    type_id: TypeId,
    span: Span,
  ) -> DefinitionId {
    let name = self.symbols.intern(name);
    self.defs.alloc(Definition {
      kind: DefinitionKind::Variable(VariableDefinition { type_id, mutable: false }),
      name,
      span,
    })
  }

  pub(crate) fn unexpected_node(
    &self,
    decl: &DefinitionId,
    node: &NodeId,
  ) -> Diagnostic {
    let n = self.ir.get(node);
    InternalError::UnexpectedNode {
      decl: self.decl_name(decl),
      node: node.index(),
      kind: n.kind.tag().to_string(),
      span: n.span.clone(),
    }
    .report()
  }
}
