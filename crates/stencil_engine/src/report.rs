use serde::Serialize;

use crate::{dictionary::DictWord, session::Session};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstantiationReport {
  pub symbol: String,
  pub generic: String,
  pub shapes: Vec<String>,
  pub is_method: bool,
  pub dict_len: u32,
  pub start_sub_dict: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DictionaryReport {
  pub symbol: String,
  pub generic: String,
  pub args: Vec<String>,
  pub words: Vec<DictWord>,
  pub read_only: bool,
  pub dupok: bool,
}

/// Everything a stenciling run produced, in creation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StencilReport {
  pub instantiations: Vec<InstantiationReport>,
  pub dictionaries: Vec<DictionaryReport>,
  pub reachable_types: Vec<String>,
}

impl Session {
  pub fn report(&self) -> StencilReport {
    let instantiations = self
      .instantiations()
      .map(|(_, inst)| InstantiationReport {
        symbol: self.symbols.get(&inst.symbol).to_string(),
        generic: self.decl_name(&inst.key.decl),
        shapes: inst.key.shapes.iter().map(|s| self.type_name(s)).collect(),
        is_method: inst.key.is_method,
        dict_len: inst.dict_len,
        start_sub_dict: inst.start_sub_dict,
      })
      .collect();

    let dictionaries = self
      .dictionaries()
      .map(|(id, dict)| DictionaryReport {
        symbol: self.symbols.get(&dict.symbol).to_string(),
        generic: self.decl_name(&dict.key.decl),
        args: dict.key.args.iter().map(|a| self.type_name(a)).collect(),
        words: self.dictionary_words(&id),
        read_only: dict.read_only,
        dupok: dict.dupok,
      })
      .collect();

    let reachable_types = self.reachable.iter().map(|t| self.type_name(t)).collect();

    StencilReport {
      instantiations,
      dictionaries,
      reachable_types,
    }
  }

  pub fn report_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&self.report())
  }
}
