mod common;

use common::{Fixture, body_of, find_nodes, name_of};
use stencil_engine::Session;
use stencil_ir::{NodeId, NodeKind, RefKind};
use stencil_type::definition::{DefinitionId, FunctionOrigin};

/// Body statements of a thunk: `{ return inst(args...) }` or `{ inst(args...) }`.
fn forwarded_call(
  session: &Session,
  thunk: &DefinitionId,
) -> (DefinitionId, Vec<NodeId>) {
  let root = body_of(session, thunk);
  let calls = find_nodes(session, root, |k| matches!(k, NodeKind::Call { .. }));
  assert_eq!(calls.len(), 1);
  match session.ir.get(&calls[0]).kind.clone() {
    NodeKind::Call { callee, args } => (callee, args),
    _ => unreachable!(),
  }
}

#[test]
fn concrete_function_value_uses_the_static_dictionary() {
  let mut fx = Fixture::new();
  let identity = fx.identity();
  let i64 = fx.types.i64();
  let fn_ty = fx.types.function(vec![i64], vec![i64]);
  let f = fx.local("f", fn_ty);
  let value = fx.generic_ref(identity, vec![i64], None, RefKind::Function, fn_ty);
  let bind = fx.let_(f, Some(value));
  fx.main(vec![bind]);
  let mut session = fx.session();

  session.stencil().unwrap();

  let NodeKind::Closure { func, captures } = session.ir.get(&value).kind.clone() else {
    panic!("generic reference was not replaced");
  };
  assert!(captures.is_empty());
  assert_eq!(name_of(&session, &func), "main.func1");

  let thunk = session.defs.function(&func).unwrap().clone();
  assert_eq!(thunk.origin, FunctionOrigin::Thunk);
  assert_eq!(thunk.params.len(), 1);
  assert_eq!(name_of(&session, &thunk.params[0]), "a0");

  let inst = session.find_instantiation(identity, &[i64], false).unwrap().unwrap();
  let (callee, args) = forwarded_call(&session, &func);
  assert_eq!(callee, session.instantiation(&inst).func);
  assert_eq!(args.len(), 2);

  let NodeKind::DictionaryAddr(symbol) = session.ir.get(&args[0]).kind.clone() else {
    panic!("first argument is not a dictionary address");
  };
  assert_eq!(session.symbols.get(&symbol), ".dict.Identity[int64]");
  assert_eq!(session.ir.get(&args[1]).kind, NodeKind::Variable(thunk.params[0]));
}

#[test]
fn method_value_captures_its_receiver() {
  let mut fx = Fixture::new();
  let pair = fx.pair();
  let i64 = fx.types.i64();
  let pair_int = fx.types.named(pair.decl, vec![i64]);
  let fn_ty = fx.types.function(vec![], vec![pair_int]);
  let p = fx.local("p", pair_int);
  let g = fx.local("g", fn_ty);

  let decl_p = fx.let_(p, None);
  let recv = fx.var(p);
  let value = fx.generic_ref(pair.swap, vec![i64], Some(recv), RefKind::MethodValue, fn_ty);
  let bind = fx.let_(g, Some(value));
  fx.main(vec![decl_p, bind]);
  let mut session = fx.session();

  session.stencil().unwrap();

  let NodeKind::Closure { func, captures } = session.ir.get(&value).kind.clone() else {
    panic!("method value was not replaced");
  };
  assert_eq!(captures.len(), 1);
  assert_eq!(captures[0].value, recv);
  assert_eq!(name_of(&session, &captures[0].var), ".rcvr1");

  let (_, args) = forwarded_call(&session, &func);
  assert_eq!(args.len(), 2);
  assert!(matches!(session.ir.get(&args[0]).kind, NodeKind::DictionaryAddr(_)));
  assert_eq!(session.ir.get(&args[1]).kind, NodeKind::Variable(captures[0].var));
}

#[test]
fn method_expression_dereferences_pointer_receiver() {
  let mut fx = Fixture::new();
  let pair = fx.pair();
  let i64 = fx.types.i64();
  let pair_int = fx.types.named(pair.decl, vec![i64]);
  let ptr = fx.types.pointer(pair_int);
  let fn_ty = fx.types.function(vec![ptr], vec![pair_int]);
  let h = fx.local("h", fn_ty);

  let value = fx.generic_ref(pair.swap, vec![i64], None, RefKind::MethodExpr, fn_ty);
  let bind = fx.let_(h, Some(value));
  fx.main(vec![bind]);
  let mut session = fx.session();

  session.stencil().unwrap();

  let NodeKind::Closure { func, captures } = session.ir.get(&value).kind.clone() else {
    panic!("method expression was not replaced");
  };
  assert!(captures.is_empty());

  let (_, args) = forwarded_call(&session, &func);
  assert_eq!(args.len(), 2);
  let deref = session.ir.get(&args[1]);
  assert!(matches!(deref.kind, NodeKind::Dereference(_)));
  assert_eq!(deref.type_id, pair_int);
}

#[test]
fn function_value_inside_instantiation_captures_sub_dictionary() {
  let mut fx = Fixture::new();
  let identity = fx.identity();
  let make_id = fx.make_id(identity);
  let i64 = fx.types.i64();
  let fn_ty = fx.types.function(vec![i64], vec![i64]);
  let f = fx.local("f", fn_ty);
  let call = fx.generic_call(make_id, vec![i64], Vec::new(), fn_ty);
  let bind = fx.let_(f, Some(call));
  fx.main(vec![bind]);
  let mut session = fx.session();

  session.stencil().unwrap();

  let inst = session.find_instantiation(make_id, &[i64], false).unwrap().unwrap();
  let inst = session.instantiation(&inst).clone();
  let root = body_of(&session, &inst.func);
  let closures = find_nodes(&session, root, |k| matches!(k, NodeKind::Closure { .. }));
  assert_eq!(closures.len(), 1);

  let NodeKind::Closure { func, captures } = session.ir.get(&closures[0]).kind.clone() else {
    unreachable!()
  };
  assert_eq!(name_of(&session, &func), ".inst.MakeId[shape.i8].func1");
  assert_eq!(captures.len(), 1);
  assert_eq!(name_of(&session, &captures[0].var), ".dict1");

  let NodeKind::DictionaryRead { dict, slot, len } = session.ir.get(&captures[0].value).kind.clone() else {
    panic!("captured dictionary is not a sub-dictionary read");
  };
  assert_eq!(slot, inst.start_sub_dict);
  assert_eq!(len, inst.dict_len);
  assert_eq!(session.ir.get(&dict).kind, NodeKind::Variable(inst.dict_param));

  // The thunk forwards the captured dictionary to the shared Identity body.
  let identity_inst = session.find_instantiation(identity, &[i64], false).unwrap().unwrap();
  let (callee, args) = forwarded_call(&session, &func);
  assert_eq!(callee, session.instantiation(&identity_inst).func);
  assert_eq!(session.ir.get(&args[0]).kind, NodeKind::Variable(captures[0].var));

  // And the slot it reads holds Identity's dictionary for the same argument.
  let outer = session.dictionary_for(make_id, &[i64], false).unwrap();
  let words = session.dictionary_words(&outer);
  assert_eq!(words[slot as usize].to_string(), "&.dict.Identity[int64]");
}

#[test]
fn closure_literal_in_generic_body_reads_through_its_own_dictionary() {
  let mut fx = Fixture::new();
  let identity = fx.identity();
  let apply = fx.apply(identity);
  let i64 = fx.types.i64();
  let x = fx.int(4);
  let call = fx.generic_call(apply, vec![i64], vec![x], i64);
  let stmt = fx.node(NodeKind::ExpressionStatement(call), i64);
  fx.main(vec![stmt]);
  let mut session = fx.session();

  session.stencil().unwrap();

  let inst = session.find_instantiation(apply, &[i64], false).unwrap().unwrap();
  let inst = session.instantiation(&inst).clone();
  assert_eq!((inst.start_sub_dict, inst.dict_len), (2, 3));

  let root = body_of(&session, &inst.func);
  let closures = find_nodes(&session, root, |k| matches!(k, NodeKind::Closure { .. }));
  assert_eq!(closures.len(), 1);
  let NodeKind::Closure { func, captures } = session.ir.get(&closures[0]).kind.clone() else {
    unreachable!()
  };
  assert_eq!(name_of(&session, &func), ".inst.Apply[shape.i8].func1");
  assert_eq!(session.defs.function(&func).unwrap().origin, FunctionOrigin::Closure);

  // The enclosing dictionary is captured as-is.
  assert_eq!(captures.len(), 1);
  assert_eq!(name_of(&session, &captures[0].var), ".dict");
  assert_eq!(session.ir.get(&captures[0].value).kind, NodeKind::Variable(inst.dict_param));

  // The call inside the literal reads its sub-dictionary through the captured variable.
  let inner_root = body_of(&session, &func);
  let calls = find_nodes(&session, inner_root, |k| matches!(k, NodeKind::Call { .. }));
  assert_eq!(calls.len(), 1);
  let NodeKind::Call { callee, args } = session.ir.get(&calls[0]).kind.clone() else {
    unreachable!()
  };
  assert_eq!(name_of(&session, &callee), ".inst.Identity[shape.i8]");
  let NodeKind::DictionaryRead { dict, slot, len } = session.ir.get(&args[0]).kind.clone() else {
    panic!("call inside the closure does not read a sub-dictionary");
  };
  assert_eq!((slot, len), (2, 3));
  assert_eq!(session.ir.get(&args[0]).type_id, session.types.uintptr());
  assert_eq!(session.ir.get(&dict).kind, NodeKind::Variable(captures[0].var));
  assert_ne!(captures[0].var, inst.dict_param);

  let outer = session.dictionary_for(apply, &[i64], false).unwrap();
  let words = session.dictionary_words(&outer);
  assert_eq!(words[2].to_string(), "&.dict.Identity[int64]");
}
