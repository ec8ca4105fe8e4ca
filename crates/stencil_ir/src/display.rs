use std::fmt::Write;

use stencil_type::{
  definition::{DefinitionId, DefinitionKind, DefinitionStore},
  symbol::SymbolTable,
  types::TypeStore,
};

use crate::{IR, NodeId, NodeKind, RefKind};

/// Text dump of IR bodies, one node per line, children indented below their parent.
pub struct IRPrinter<'a> {
  ir: &'a IR,
  types: &'a TypeStore,
  defs: &'a DefinitionStore,
  symbols: &'a SymbolTable,
  indent: usize,
  output: String,
}

impl<'a> IRPrinter<'a> {
  pub fn new(
    ir: &'a IR,
    types: &'a TypeStore,
    defs: &'a DefinitionStore,
    symbols: &'a SymbolTable,
  ) -> Self {
    Self {
      ir,
      types,
      defs,
      symbols,
      indent: 0,
      output: String::new(),
    }
  }

  pub fn print(mut self) -> String {
    writeln!(self.output, "=== IR ===").unwrap();

    for item in &self.ir.items {
      if let Some(root) = self.ir.body(item) {
        writeln!(self.output).unwrap();
        self.print_function(*item, root);
      } else if let Some(init) = self.ir.global_inits.get(item) {
        writeln!(self.output).unwrap();
        writeln!(self.output, "global {} =", self.def_name(item)).unwrap();
        self.indent = 1;
        self.print_node(*init);
        self.indent = 0;
      }
    }

    self.output
  }

  /// Prints a single function (and the closures created in it).
  pub fn print_one(
    mut self,
    func: DefinitionId,
  ) -> String {
    if let Some(root) = self.ir.body(&func) {
      self.print_function(func, root);
    }
    self.output
  }

  fn print_function(
    &mut self,
    func: DefinitionId,
    root: NodeId,
  ) {
    let header = self.signature(&func);
    writeln!(self.output, "{}", header).unwrap();

    self.indent = 1;
    self.print_node(root);
    self.indent = 0;

    for closure in self.ir.closures_in(root) {
      if let Some(closure_root) = self.ir.body(&closure) {
        self.print_function(closure, closure_root);
      }
    }
  }

  fn signature(
    &self,
    func: &DefinitionId,
  ) -> String {
    let name = self.def_name(func);
    let DefinitionKind::Function(fd) = &self.defs.get(func).kind else {
      return format!("fn {}", name);
    };

    let params: Vec<String> = fd
      .receiver
      .iter()
      .chain(fd.params.iter())
      .map(|p| format!("{} {}", self.def_name(p), self.def_type(p)))
      .collect();
    let results: Vec<String> = fd.results.iter().map(|r| self.type_name(r)).collect();

    match results.len() {
      0 => format!("fn {}({})", name, params.join(", ")),
      1 => format!("fn {}({}) {}", name, params.join(", "), results[0]),
      _ => format!("fn {}({}) ({})", name, params.join(", "), results.join(", ")),
    }
  }

  fn print_node(
    &mut self,
    id: NodeId,
  ) {
    let node = self.ir.get(&id);
    let detail = self.detail(&node.kind);
    let ty = self.type_name(&node.type_id);

    let pad = "  ".repeat(self.indent);
    if detail.is_empty() {
      writeln!(self.output, "{}{} : {}", pad, node.kind.tag(), ty).unwrap();
    } else {
      writeln!(self.output, "{}{} {} : {}", pad, node.kind.tag(), detail, ty).unwrap();
    }

    self.indent += 1;
    for child in node.kind.children() {
      self.print_node(child);
    }
    self.indent -= 1;
  }

  fn detail(
    &self,
    kind: &NodeKind,
  ) -> String {
    match kind {
      NodeKind::Literal(value) => value.to_string(),
      NodeKind::Variable(def) | NodeKind::FuncRef(def) => self.def_name(def),
      NodeKind::Binary { operation, .. } => operation.symbol().to_string(),
      NodeKind::Unary { operation, .. } => operation.symbol().to_string(),
      NodeKind::Call { callee, .. } => self.def_name(callee),
      NodeKind::GenericCall { target, type_args, .. } => format!("{}[{}]", self.def_name(target), self.type_list(type_args)),
      NodeKind::GenericRef { target, type_args, kind, .. } => {
        let kind = match kind {
          RefKind::Function => "func",
          RefKind::MethodValue => "method-value",
          RefKind::MethodExpr => "method-expr",
        };
        format!("{} {}[{}]", kind, self.def_name(target), self.type_list(type_args))
      },
      NodeKind::MethodCall { method, .. } => self.symbols.get(method).to_string(),
      NodeKind::ConvertToInterface { target, .. } | NodeKind::TypeAssert { target, .. } => self.type_name(target),
      NodeKind::Builtin { op, operand, .. } => format!("{} {}", op.name(), self.type_name(operand)),
      NodeKind::FieldAccess { field, .. } => format!(".{}", field),
      NodeKind::RecordLiteral { ty, .. } => self.type_name(ty),
      NodeKind::Closure { func, captures } => {
        let captured: Vec<String> = captures.iter().map(|c| self.def_name(&c.var)).collect();
        format!("{} captures [{}]", self.def_name(func), captured.join(", "))
      },
      NodeKind::DictionaryRead { slot, len, .. } => format!("[{}/{}]", slot, len),
      NodeKind::DictionaryAddr(symbol) => self.symbols.get(symbol).to_string(),
      NodeKind::TypeDescriptor(ty) => self.type_name(ty),
      NodeKind::CheckDescriptor { shape, .. } => self.type_name(shape),
      NodeKind::Let { var, .. } => format!("{} {}", self.def_name(var), self.def_type(var)),
      _ => String::new(),
    }
  }

  fn def_name(
    &self,
    def: &DefinitionId,
  ) -> String {
    self.symbols.get(&self.defs.get(def).name).to_string()
  }

  fn def_type(
    &self,
    def: &DefinitionId,
  ) -> String {
    self
      .defs
      .type_of(def)
      .map(|t| self.type_name(&t))
      .unwrap_or_else(|| "?".to_string())
  }

  fn type_name(
    &self,
    ty: &stencil_type::types::TypeId,
  ) -> String {
    self.types.format(ty, self.defs, self.symbols)
  }

  fn type_list(
    &self,
    types: &[stencil_type::types::TypeId],
  ) -> String {
    types.iter().map(|t| self.type_name(t)).collect::<Vec<_>>().join(",")
  }
}
