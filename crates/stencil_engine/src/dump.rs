use ascii_table::AsciiTable;
use stencil_config::DumpKind;
use stencil_ir::display::IRPrinter;
use stencil_log::phase_warn;

use crate::session::Session;

impl Session {
  /// Every shape computed so far, with the concrete types that map to it.
  pub fn dump_shapes(&self) -> String {
    let mut rows: Vec<Vec<String>> = self
      .shapes
      .iter()
      .map(|(ty, shape)| {
        let size = self.shape_parts.get(shape).map(|(_, fields)| fields.len()).unwrap_or(0);
        vec![self.type_name(ty), self.type_name(shape), size.to_string()]
      })
      .collect();
    rows.sort();

    let mut table = AsciiTable::default();
    table.column(0).set_header("Type");
    table.column(1).set_header("Shape");
    table.column(2).set_header("Fields");
    table.format(rows)
  }

  pub fn dump_instantiations(&self) -> String {
    let rows: Vec<Vec<String>> = self
      .instantiations()
      .map(|(_, inst)| {
        vec![
          self.symbols.get(&inst.symbol).to_string(),
          self.decl_name(&inst.key.decl),
          inst.start_sub_dict.to_string(),
          inst.dict_len.to_string(),
          inst.reads.len().to_string(),
        ]
      })
      .collect();

    let mut table = AsciiTable::default();
    table.column(0).set_header("Instantiation");
    table.column(1).set_header("Generic");
    table.column(2).set_header("Sub-dict start");
    table.column(3).set_header("Length");
    table.column(4).set_header("Reads");
    table.format(rows)
  }

  /// One row per dictionary word.
  pub fn dump_dictionaries(&self) -> String {
    let mut rows: Vec<Vec<String>> = Vec::new();

    for (id, dict) in self.dictionaries() {
      let name = self.symbols.get(&dict.symbol);
      for (slot, word) in self.dictionary_words(&id).iter().enumerate() {
        let owner = if slot == 0 { name.to_string() } else { String::new() };
        rows.push(vec![owner, slot.to_string(), word.to_string()]);
      }
    }

    let mut table = AsciiTable::default();
    table.column(0).set_header("Dictionary");
    table.column(1).set_header("Slot");
    table.column(2).set_header("Word");
    table.format(rows)
  }

  pub(crate) fn emit_dumps(&self) {
    for kind in &self.config.dump {
      match kind {
        DumpKind::Shapes => println!("{}", self.dump_shapes()),
        DumpKind::Instantiations => println!("{}", self.dump_instantiations()),
        DumpKind::Dictionaries => println!("{}", self.dump_dictionaries()),
        DumpKind::Ir => {
          let printer = IRPrinter::new(&self.ir, &self.types, &self.defs, &self.symbols);
          println!("{}", printer.print());
        },
        DumpKind::Report => match self.report_json() {
          Ok(json) => println!("{}", json),
          Err(e) => phase_warn!(&self.config, "could not serialize report: {}", e),
        },
      }
    }
  }
}
