//! Symbol names of everything the engine emits. Names are content-derived so that separately
//! compiled units produce the same symbol for the same instantiation or dictionary.

use stencil_type::{definition::DefinitionId, symbol::SymbolId, types::TypeId};

use crate::session::Session;

pub const INST_PREFIX: &str = ".inst.";
pub const DICT_PREFIX: &str = ".dict.";
pub const DESCRIPTOR_PREFIX: &str = "type:";

/// `F[a,b]` for functions, `Owner[a,b].M` for methods.
fn qualified(
  session: &mut Session,
  decl: DefinitionId,
  args: &[TypeId],
  is_method: bool,
) -> String {
  let name = session.decl_name(&decl);
  let owner = session.defs.function(&decl).and_then(|f| f.owner_type);

  match owner {
    Some(owner) if is_method => {
      let owner_ty = session.types.named(owner, args.to_vec());
      format!("{}.{}", session.type_name(&owner_ty), name)
    },
    _ => {
      let args: Vec<String> = args.iter().map(|a| session.type_name(a)).collect();
      format!("{}[{}]", name, args.join(","))
    },
  }
}

pub fn instantiation_name(
  session: &mut Session,
  decl: DefinitionId,
  shapes: &[TypeId],
  is_method: bool,
) -> SymbolId {
  let name = format!("{}{}", INST_PREFIX, qualified(session, decl, shapes, is_method));
  session.symbols.intern(&name)
}

pub fn dictionary_name(
  session: &mut Session,
  decl: DefinitionId,
  args: &[TypeId],
  is_method: bool,
) -> SymbolId {
  let name = format!("{}{}", DICT_PREFIX, qualified(session, decl, args, is_method));
  session.symbols.intern(&name)
}

pub fn descriptor_symbol(
  session: &Session,
  ty: &TypeId,
) -> String {
  format!("{}{}", DESCRIPTOR_PREFIX, session.type_name(ty))
}

/// Next `<outer>.func<N>` name for a closure synthesized inside `outer`.
pub fn closure_name(
  session: &mut Session,
  outer: DefinitionId,
) -> SymbolId {
  let counter = session.closure_counters.entry(outer).or_insert(0);
  *counter += 1;
  let n = *counter;
  let name = format!("{}.func{}", session.decl_name(&outer), n);
  session.symbols.intern(&name)
}

/// Name of a captured temporary, numbered within the same counter as closures.
pub fn temporary_name(
  session: &mut Session,
  outer: DefinitionId,
  base: &str,
) -> String {
  let counter = session.closure_counters.entry(outer).or_insert(0);
  format!("{}{}", base, *counter)
}
