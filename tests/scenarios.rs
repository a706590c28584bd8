//! End-to-end loads of small literal inputs.

mod common;

use tinyusdz::prelude::*;
use tinyusdz::value::Role;

fn path(s: &str) -> Path {
    Path::new(s).unwrap()
}

#[test]
fn trivial_usda() {
    let text = b"#usda 1.0\ndef Xform \"root\" { double3 xformOp:translate = (1, 2, 3) }\n";
    let stage = load_usda(text, "", &NullResolver, &LoadOptions::default()).unwrap();

    assert_eq!(stage.len(), 1);
    let roots: Vec<&str> = stage.root_prims().map(Prim::name).collect();
    assert_eq!(roots, ["root"]);

    let root = stage.find_prim_at_path(&path("/root")).unwrap();
    assert_eq!(root.type_name(), Some("Xform"));
    assert_eq!(root.properties().len(), 1);
    let attr = root.attribute("xformOp:translate").unwrap();
    assert_eq!(attr.type_name.to_string(), "double3");
    assert_eq!(
        root.get("xformOp:translate", SampleTime::Default).unwrap(),
        Value::Double3([1.0, 2.0, 3.0], Role::None)
    );
    assert!(stage.warnings().is_empty());
}

#[test]
fn references_compose_local_wins() {
    let resolver = MemoryResolver::new().with("base.usda", "#usda 1.0\ndef Xform \"A\" { float radius = 2.5 }\n");
    let main = b"#usda 1.0\n(defaultPrim = \"A\")\ndef Xform \"A\" ( references = @base.usda@</A> ) { float radius = 7.0 }\n";
    let stage = load_usda(main, "", &resolver, &LoadOptions::default()).unwrap();

    let a = stage.find_prim_at_path(&path("/A")).unwrap();
    assert_eq!(a.get("radius", SampleTime::Default).unwrap(), Value::Float(7.0));
    assert_eq!(a.references().len(), 1);
    assert!(stage.warnings().is_empty());
}

#[test]
fn references_compose_default_prim() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("base.usda"),
        "#usda 1.0\n(defaultPrim = \"A\")\ndef Xform \"A\" { float radius = 2.5\n float height = 4 }\n",
    )
    .unwrap();
    let main = dir.path().join("main.usda");
    std::fs::write(&main, "#usda 1.0\ndef Xform \"A\" ( references = @base.usda@ ) { float radius = 7.0 }\n").unwrap();

    let stage = load_file(&main, &LoadOptions::default()).unwrap();
    let a = stage.find_prim_at_path(&path("/A")).unwrap();
    assert_eq!(a.get("radius", SampleTime::Default).unwrap(), Value::Float(7.0));
    assert_eq!(a.get("height", SampleTime::Default).unwrap(), Value::Float(4.0));
}

#[test]
fn time_samples_sort_and_block() {
    let text = b"#usda 1.0\ndef \"P\" { float f.timeSamples = { 2.0: 20.0, 0.0: 0.0, 1.0: None } }\n";
    let stage = load_usda(text, "", &NullResolver, &LoadOptions::default()).unwrap();
    let p = stage.find_prim_at_path(&path("/P")).unwrap();

    let samples = p.attribute("f").unwrap().time_samples.as_ref().unwrap();
    let stored: Vec<(f64, Value)> = samples.iter().cloned().collect();
    assert_eq!(
        stored,
        vec![(0.0, Value::Float(0.0)), (1.0, Value::Block), (2.0, Value::Float(20.0))]
    );

    let at = |t: f64| p.get("f", SampleTime::Time(t)).unwrap();
    assert_eq!(at(0.5), Value::Float(0.0));
    assert_eq!(at(1.5), Value::Block);
    assert_eq!(at(-1.0), Value::Float(0.0));
    assert_eq!(at(99.0), Value::Float(20.0));
}

#[test]
fn list_op_prepend_then_delete() {
    let resolver = MemoryResolver::new()
        .with("a.usda", "#usda 1.0\n(defaultPrim = \"M\")\ndef \"M\" { int fromA = 1 }\n")
        .with("b.usda", "#usda 1.0\n(defaultPrim = \"M\")\ndef \"M\" { int fromB = 2 }\n");
    let text = br#"#usda 1.0
def "X" ( prepend references = [@a.usda@, @b.usda@]
          delete  references = [@a.usda@] ) { }
"#;
    let stage = load_usda(text, "", &resolver, &LoadOptions::default()).unwrap();
    let x = stage.find_prim_at_path(&path("/X")).unwrap();

    let assets: Vec<&str> = x.references().iter().map(|r| r.asset_path.as_str()).collect();
    assert_eq!(assets, ["b.usda"]);
    assert!(x.property("fromA").is_none());
    assert_eq!(x.get("fromB", SampleTime::Default).unwrap(), Value::Int(2));
}

#[test]
fn usdz_deflated_member_rejected() {
    let zip = common::build_zip(&[("scene.usda", b"#usda 1.0\n")], 8);
    let err = load(&zip, "", &NullResolver, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
    assert!(err.to_string().contains("USDZ members must be stored uncompressed"));
}

#[test]
fn reference_cycle_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("p.usda"),
        "#usda 1.0\n(defaultPrim = \"root\")\ndef \"root\" ( references = @q.usda@ ) { def \"fromP\" {} }\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("q.usda"),
        "#usda 1.0\n(defaultPrim = \"root\")\ndef \"root\" ( references = @p.usda@ ) { int q = 1 }\n",
    )
    .unwrap();

    let stage = load_file(dir.path().join("p.usda"), &LoadOptions::default()).unwrap();
    assert!(stage
        .warnings()
        .iter()
        .any(|w| w.kind == WarningKind::CompositionCycle));

    let root = stage.find_prim_at_path(&path("/root")).unwrap();
    let children: Vec<&str> = stage.children(root).map(Prim::name).collect();
    assert_eq!(children, ["fromP"]);
    assert_eq!(root.get("q", SampleTime::Default).unwrap(), Value::Int(1));
}

#[test]
fn unresolved_reference_is_a_warning() {
    let text = b"#usda 1.0\ndef \"X\" ( references = @missing.usda@ ) { int keep = 3 }\n";
    let stage = load_usda(text, "", &NullResolver, &LoadOptions::default()).unwrap();
    assert!(stage.warnings().iter().any(|w| w.kind == WarningKind::UnresolvedAsset));
    let x = stage.find_prim_at_path(&path("/X")).unwrap();
    assert_eq!(x.get("keep", SampleTime::Default).unwrap(), Value::Int(3));
}

#[test]
fn syntax_error_reports_location() {
    let text = b"#usda 1.0\ndef Xform \"root\" {\n    float x = 1 $\n}\n";
    let err = load_usda(text, "", &NullResolver, &LoadOptions::default()).unwrap_err();
    let syntax = err.as_syntax().expect("syntax error");
    assert_eq!(syntax.line, 3);
}

#[test]
fn in_memory_root_identifier_catches_first_cycle_edge() {
    let p = "#usda 1.0\n(defaultPrim = \"root\")\ndef \"root\" ( references = @q.usda@ ) { def \"fromP\" {} }\n";
    let resolver = MemoryResolver::new()
        .with("p.usda", p)
        .with("q.usda", "#usda 1.0\n(defaultPrim = \"root\")\ndef \"root\" ( references = @p.usda@ ) { int q = 1 }\n");
    let options = LoadOptions::default().with_identifier("p.usda");
    let stage = load_usda(p.as_bytes(), "", &resolver, &options).unwrap();

    let cycles: Vec<&str> = stage
        .warnings()
        .iter()
        .filter(|w| w.kind == WarningKind::CompositionCycle)
        .map(|w| w.message.as_str())
        .collect();
    assert!(!cycles.is_empty());
    assert!(cycles.iter().all(|m| m.contains("@p.usda@")), "{cycles:?}");

    let root = stage.find_prim_at_path(&path("/root")).unwrap();
    let children: Vec<&str> = stage.children(root).map(Prim::name).collect();
    assert_eq!(children, ["fromP"]);
    assert_eq!(root.get("q", SampleTime::Default).unwrap(), Value::Int(1));
}
