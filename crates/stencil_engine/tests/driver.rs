mod common;

use common::{Fixture, body_of, find_nodes, name_of};
use insta::assert_snapshot;
use stencil_engine::SummaryStore;
use stencil_ir::{NodeId, NodeKind};
use stencil_type::{
  definition::{Definition, DefinitionKind, GlobalDefinition},
  span::Span,
};

#[test]
fn generic_call_becomes_direct_call_with_dictionary() {
  let mut fx = Fixture::new();
  let identity = fx.identity();
  let i64 = fx.types.i64();
  let arg = fx.int(7);
  let call = fx.generic_call(identity, vec![i64], vec![arg], i64);
  let stmt = fx.node(NodeKind::ExpressionStatement(call), i64);
  fx.main(vec![stmt]);
  let mut session = fx.session();

  session.stencil().unwrap();

  let NodeKind::Call { callee, args } = session.ir.get(&call).kind.clone() else {
    panic!("generic call was not rewritten");
  };
  assert_eq!(name_of(&session, &callee), ".inst.Identity[shape.i8]");
  assert_eq!(args.len(), 2);
  assert!(matches!(session.ir.get(&args[0]).kind, NodeKind::DictionaryAddr(_)));
  assert_eq!(args[1], arg);
  assert!(session.ir.items.contains(&callee));
}

#[test]
fn shared_body_reads_its_sub_dictionary() {
  let mut fx = Fixture::new();
  let identity = fx.identity();
  let outer = fx.outer(identity);
  let i64 = fx.types.i64();
  let string = fx.types.string();
  let x = fx.int(1);
  let first = fx.generic_call(outer, vec![i64], vec![x], i64);
  let s = fx.node(
    NodeKind::Literal(stencil_type::value::ConstValue::String("s".to_string())),
    string,
  );
  let second = fx.generic_call(outer, vec![string], vec![s], string);
  let a = fx.node(NodeKind::ExpressionStatement(first), i64);
  let b = fx.node(NodeKind::ExpressionStatement(second), string);
  fx.main(vec![a, b]);
  let mut session = fx.session();

  session.stencil().unwrap();

  // Outer[int64], Outer[string], Identity[shape.i8], Identity[shape.pi8]
  assert_eq!(session.instantiation_count(), 4);

  let inst = session.find_instantiation(outer, &[i64], false).unwrap().unwrap();
  let inst = session.instantiation(&inst).clone();
  let root = body_of(&session, &inst.func);
  let calls = find_nodes(&session, root, |k| matches!(k, NodeKind::Call { .. }));
  assert_eq!(calls.len(), 1);
  assert!(find_nodes(&session, root, |k| matches!(k, NodeKind::GenericCall { .. })).is_empty());

  let NodeKind::Call { callee, args } = session.ir.get(&calls[0]).kind.clone() else {
    unreachable!()
  };
  assert_eq!(name_of(&session, &callee), ".inst.Identity[shape.i8]");
  let NodeKind::DictionaryRead { dict, slot, len } = session.ir.get(&args[0]).kind.clone() else {
    panic!("nested call does not read its dictionary from the parent");
  };
  assert_eq!((slot, len), (1, 2));
  assert_eq!(session.ir.get(&dict).kind, NodeKind::Variable(inst.dict_param));
}

#[test]
fn recursion_reaches_a_fixed_point() {
  let mut fx = Fixture::new();
  let rec = fx.recursive();
  let i64 = fx.types.i64();
  let x = fx.int(1);
  let call = fx.generic_call(rec, vec![i64], vec![x], i64);
  let stmt = fx.node(NodeKind::ExpressionStatement(call), i64);
  fx.main(vec![stmt]);
  let mut session = fx.session();

  session.stencil().unwrap();

  assert_eq!(session.instantiation_count(), 1);
  assert_eq!(session.dictionary_count(), 1);

  let inst = session.find_instantiation(rec, &[i64], false).unwrap().unwrap();
  let func = session.instantiation(&inst).func;
  let root = body_of(&session, &func);
  let calls = find_nodes(&session, root, |k| matches!(k, NodeKind::Call { .. }));
  let NodeKind::Call { callee, .. } = session.ir.get(&calls[0]).kind.clone() else {
    unreachable!()
  };
  assert_eq!(callee, func);
}

#[test]
fn methods_of_observed_types_are_instantiated() {
  let mut fx = Fixture::new();
  let pair = fx.pair();
  let string = fx.types.string();
  let pair_string = fx.types.named(pair.decl, vec![string]);
  let p = fx.local("p", pair_string);
  let decl_p = fx.let_(p, None);
  fx.main(vec![decl_p]);
  let mut session = fx.session();

  session.stencil().unwrap();

  assert!(session.find_instantiation(pair.swap, &[string], true).unwrap().is_some());
  let symbols: Vec<String> = session
    .dictionaries()
    .map(|(id, _)| session.dictionary_symbol(&id).to_string())
    .collect();
  assert_eq!(symbols, vec![".dict.Pair[string].Swap"]);
}

#[test]
fn global_initializers_are_rewritten() {
  let mut fx = Fixture::new();
  let identity = fx.identity();
  let i64 = fx.types.i64();
  let x = fx.int(3);
  let init = fx.generic_call(identity, vec![i64], vec![x], i64);
  let name = fx.sym("answer");
  let global = fx.defs.alloc(Definition {
    kind: DefinitionKind::Global(GlobalDefinition { type_id: i64 }),
    name,
    span: Span::synthetic(),
  });
  fx.ir.global_inits.insert(global, init);
  fx.ir.items.push(global);
  let mut session = fx.session();

  session.stencil().unwrap();

  assert!(matches!(session.ir.get(&init).kind, NodeKind::Call { .. }));
  assert_eq!(session.dictionary_count(), 1);
}

#[test]
fn imported_bodies_are_fetched_on_demand() {
  let mut fx = Fixture::new();
  let identity = fx.identity();
  let i64 = fx.types.i64();
  let x = fx.int(1);
  let call = fx.generic_call(identity, vec![i64], vec![x], i64);
  let stmt = fx.node(NodeKind::ExpressionStatement(call), i64);
  fx.main(vec![stmt]);

  let summary = fx.ir.export_body(&identity).unwrap();
  let mut store = SummaryStore::new();
  store.insert(identity, summary.to_json().unwrap());
  fx.ir.bodies.remove(&identity);

  let mut session = fx.session().with_body_source(Box::new(store));
  session.stencil().unwrap();

  assert!(session.ir.body(&identity).is_some());
  assert!(matches!(session.ir.get(&call).kind, NodeKind::Call { .. }));
}

#[test]
fn missing_body_aborts_the_run() {
  let mut fx = Fixture::new();
  let identity = fx.identity();
  let i64 = fx.types.i64();
  let x = fx.int(1);
  let call = fx.generic_call(identity, vec![i64], vec![x], i64);
  let stmt = fx.node(NodeKind::ExpressionStatement(call), i64);
  fx.main(vec![stmt]);
  fx.ir.bodies.remove(&identity);
  let mut session = fx.session();

  let err = session.stencil().unwrap_err();
  assert_eq!(err.error_code, "ICE0010");
  assert_eq!(err.message, "body of 'Identity' is not available");
}

#[test]
fn report_lists_everything_produced() {
  let mut fx = Fixture::new();
  let identity = fx.identity();
  let i64 = fx.types.i64();
  let x = fx.int(1);
  let call = fx.generic_call(identity, vec![i64], vec![x], i64);
  let stmt = fx.node(NodeKind::ExpressionStatement(call), i64);
  fx.main(vec![stmt]);
  let mut session = fx.session();

  session.stencil().unwrap();
  let report = session.report();

  assert_eq!(report.instantiations.len(), 1);
  assert_eq!(report.instantiations[0].symbol, ".inst.Identity[shape.i8]");
  assert_eq!(report.instantiations[0].shapes, vec!["shape.i8"]);
  assert_eq!(report.dictionaries[0].symbol, ".dict.Identity[int64]");
  assert_eq!(report.reachable_types, vec!["int64"]);

  let json = session.report_json().unwrap();
  assert!(json.contains("\"TypeDescriptor\": \"type:int64\""));

  assert!(session.dump_instantiations().contains(".inst.Identity[shape.i8]"));
  assert!(session.dump_dictionaries().contains(".dict.Identity[int64]"));
  assert!(session.dump_shapes().contains("shape.i8"));
}

#[test]
fn bound_method_dictionary_words() {
  let mut fx = Fixture::new();
  let stringer = fx.stringer();
  let show = fx.show(stringer);
  let boxed = fx.boxed();
  let i64 = fx.types.i64();
  let string = fx.types.string();
  let box_int = fx.types.named(boxed.decl, vec![i64]);
  let arg = fx.node(NodeKind::Literal(stencil_type::value::ConstValue::Int(0)), box_int);
  let call = fx.generic_call(show, vec![box_int], vec![arg], string);
  let stmt = fx.node(NodeKind::ExpressionStatement(call), string);
  fx.main(vec![stmt]);
  let mut session = fx.session();

  session.stencil().unwrap();

  let lines: Vec<String> = session
    .report()
    .dictionaries
    .iter()
    .map(|d| {
      let words: Vec<String> = d.words.iter().map(|w| w.to_string()).collect();
      format!("{} = {{{}}}", d.symbol, words.join(", "))
    })
    .collect();
  assert_snapshot!(
    lines.join(" | "),
    @".dict.Show[Box[int64]] = {type:Box[int64], &.dict.Box[int64].String} | .dict.Box[int64].String = {type:int64}"
  );
}

#[test]
fn corrupt_summary_is_rejected() {
  let mut fx = Fixture::new();
  let identity = fx.identity();
  let i64 = fx.types.i64();
  let x = fx.int(1);
  let call = fx.generic_call(identity, vec![i64], vec![x], i64);
  let stmt = fx.node(NodeKind::ExpressionStatement(call), i64);
  fx.main(vec![stmt]);

  let mut summary = fx.ir.export_body(&identity).unwrap();
  summary.root = NodeId::new(99);
  let mut store = SummaryStore::new();
  store.insert(identity, summary.to_json().unwrap());
  fx.ir.bodies.remove(&identity);

  let mut session = fx.session().with_body_source(Box::new(store));
  let err = session.stencil().unwrap_err();

  assert_eq!(err.error_code, "ICE0011");
  assert_eq!(
    err.message,
    "failed to import body of 'Identity': root refers to node 99 of 3"
  );
  assert!(session.ir.body(&identity).is_none());
}
