//! USDZ packages built with the fixture zip writer.

mod common;

use common::{build_zip, world_crate};
use tinyusdz::prelude::*;
use tinyusdz::usdz::UsdzArchive;

fn path(s: &str) -> Path {
    Path::new(s).unwrap()
}

fn package() -> Vec<u8> {
    let scene = b"#usda 1.0\n(defaultPrim = \"Set\")\ndef Xform \"Set\" {\n    def \"Prop\" ( references = @./geo/world.usdc@ ) {}\n    asset tex = @./tex/wood.png@\n}\n";
    let geo = world_crate();
    build_zip(
        &[
            ("scene.usda", scene.as_slice()),
            ("geo/world.usdc", geo.as_slice()),
            ("tex/wood.png", b"\x89PNG fake".as_slice()),
        ],
        0,
    )
}

#[test]
fn archive_members_are_aligned_slices() {
    let data = package();
    let archive = UsdzArchive::open(&data, &Limits::default()).unwrap();
    let names: Vec<&str> = archive.members().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["scene.usda", "geo/world.usdc", "tex/wood.png"]);
    assert!(archive.members().iter().all(|m| m.offset % 64 == 0));
    assert_eq!(archive.default_root().unwrap().name, "scene.usda");
    assert_eq!(archive.read("tex/wood.png").unwrap(), b"\x89PNG fake");
}

#[test]
fn package_references_resolve_inside_the_archive() {
    let data = package();
    let stage = load(&data, "", &NullResolver, &LoadOptions::default()).unwrap();
    assert!(stage.warnings().is_empty(), "{:?}", stage.warnings());

    let prop = stage.find_prim_at_path(&path("/Set/Prop")).unwrap();
    assert_eq!(prop.type_name(), Some("Xform"));
    assert_eq!(prop.get("size", SampleTime::Default).unwrap(), Value::Double(2.5));
    assert_eq!(stage.default_prim().unwrap().path(), &path("/Set"));
}

#[test]
fn package_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("set.usdz");
    std::fs::write(&file, package()).unwrap();
    let stage = load_file(&file, &LoadOptions::default()).unwrap();
    assert!(stage.find_prim_at_path(&path("/Set/Prop")).is_some());
}

#[test]
fn package_without_layers_is_rejected() {
    let data = build_zip(&[("readme.txt", b"hi".as_slice())], 0);
    assert!(matches!(
        load(&data, "", &NullResolver, &LoadOptions::default()),
        Err(Error::MissingRequired(_))
    ));
}
