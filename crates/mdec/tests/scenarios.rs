//! End-to-end decompilation of the `ragUnk0` methods.

mod common;

use common::*;
use mdec::{SerializedExpr, SerializedNode, SerializedVariableKind, render};

#[test]
fn test_init_decompiles() {
    let session = session();
    let outcome = session.decompile_function(function_id(&session, "ragUnk0::Init"));
    let decompilation = outcome.decompilation().unwrap_or_else(|| panic!("{outcome:?}"));

    assert_eq!(decompilation.address, INIT);
    assert_eq!(decompilation.stats.instructions, INIT_LEN as usize);
    assert_eq!(decompilation.stats.frame_size, 48);
    assert_eq!(decompilation.owner.as_deref(), Some("ragUnk0"));
    assert_eq!(decompilation.return_type, "void");

    let names: Vec<_> = decompilation
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p.kind.clone()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("this", SerializedVariableKind::Receiver),
            ("arg0", SerializedVariableKind::Parameter),
            ("arg1", SerializedVariableKind::Parameter),
        ]
    );
    assert_eq!(decompilation.parameters[0].type_name.as_deref(), Some("ragUnk0*"));
}

#[test]
fn test_init_loop_runs_to_second_argument() {
    let session = session();
    let outcome = session.decompile_function(function_id(&session, "ragUnk0::Init"));
    let decompilation = outcome.decompilation().unwrap();

    let loops = loops(decompilation);
    assert_eq!(loops.len(), 1, "{}", render(decompilation));
    let SerializedNode::Loop {
        condition: Some(condition),
        ..
    } = &loops[0]
    else {
        panic!("loop without condition: {:?}", loops[0]);
    };
    assert!(references(condition, "arg1"), "{condition:?}");
    assert!(references(condition, "i"), "{condition:?}");
}

#[test]
fn test_init_calls_allocator() {
    let session = session();
    let outcome = session.decompile_function(function_id(&session, "ragUnk0::Init"));
    let decompilation = outcome.decompilation().unwrap();

    assert_eq!(decompilation.callees.len(), 1);
    assert_eq!(decompilation.callees[0].target, ALLOC);
    assert_eq!(decompilation.callees[0].name.as_deref(), Some("ragAlloc"));

    let call = all_exprs(decompilation).into_iter().find_map(|expr| match expr {
        SerializedExpr::Call { callee, args, .. } => Some((callee, args)),
        _ => None,
    });
    let (callee, args) = call.unwrap();
    assert_eq!(callee.as_deref(), Some("ragAlloc"));
    assert_eq!(args.len(), 1);
    assert!(references(&args[0], "arg1"));
}

#[test]
fn test_init_classifies_member_accesses() {
    let session = session();
    let outcome = session.decompile_function(function_id(&session, "ragUnk0::Init"));
    let decompilation = outcome.decompilation().unwrap();

    let fields: Vec<String> = all_exprs(decompilation)
        .into_iter()
        .filter_map(|expr| match expr {
            SerializedExpr::Field { name, .. } => Some(name),
            _ => None,
        })
        .collect();
    for name in ["links", "unk0", "unk1", "boneLinkIndices", "count"] {
        assert!(fields.iter().any(|f| f == name), "{name} missing from {fields:?}");
    }
    assert_eq!(decompilation.stats.unclassified_accesses.last(), Some(&0));

    let text = render(decompilation);
    assert!(text.starts_with("// 0x00282848..0x002828fc"), "{text}");
    assert!(text.contains("void ragUnk0::Init(int arg0, int arg1) {"), "{text}");
    assert!(text.contains("this->count = arg1;"), "{text}");
}

#[test]
fn test_destroy_resolves_both_calls() {
    let session = session();
    let outcome = session.decompile_function(function_id(&session, "ragUnk0::Destroy"));
    let decompilation = outcome.decompilation().unwrap_or_else(|| panic!("{outcome:?}"));

    assert_eq!(decompilation.address, DESTROY);
    assert_eq!(decompilation.stats.instructions, DESTROY_LEN as usize);
    let targets: Vec<_> = decompilation
        .callees
        .iter()
        .map(|c| (c.target, c.name.as_deref()))
        .collect();
    assert_eq!(
        targets,
        vec![(FREE, Some("ragFree")), (RELEASE, Some("ragRelease"))]
    );

    let callees: Vec<_> = all_exprs(decompilation)
        .into_iter()
        .filter_map(|expr| match expr {
            SerializedExpr::Call { callee, args, .. } => Some((callee, args)),
            _ => None,
        })
        .collect();
    assert_eq!(callees.len(), 2);
    assert_eq!(callees[0].0.as_deref(), Some("ragFree"));
    assert_eq!(callees[1].0.as_deref(), Some("ragRelease"));
    assert!(references(&callees[1].1[0], "this"));
}

#[test]
fn test_outcome_json_round_trips() {
    let session = session();
    let outcome = session.decompile_function(function_id(&session, "ragUnk0::Destroy"));
    let json = serde_json::to_string(&outcome).unwrap();
    let back: mdec::DecompileOutcome = serde_json::from_str(&json).unwrap();
    assert_eq!(back, outcome);
    assert!(json.contains("\"function\":\"ragUnk0::Destroy\""));
}
