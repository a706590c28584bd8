//! Crate files written by the fixture builder and read back.

mod common;

use common::{world_crate, CrateBuilder};
use tinyusdz::prelude::*;
use tinyusdz::usdc::{self, read_bootstrap, CrateFile, SpecType};
use tinyusdz::util::Warnings;
use tinyusdz::value::Role;

fn path(s: &str) -> Path {
    Path::new(s).unwrap()
}

fn read(data: &[u8]) -> Result<Layer> {
    usdc::read_layer(data, "test.usdc", Limits::default(), false, &mut Warnings::new())
}

#[test]
fn world_layer() {
    let data = world_crate();
    assert_eq!(read_bootstrap(&data).unwrap().0, [0, 8, 0]);

    let layer = read(&data).unwrap();
    assert_eq!(layer.metas().default_prim, Some(Token::new("World")));
    assert_eq!(layer.metas().up_axis, Some(Token::new("Z")));

    let world = layer.find_prim(&path("/World")).unwrap();
    assert_eq!(world.specifier, Specifier::Def);
    assert_eq!(world.type_name, Some(Token::new("Xform")));
    let names: Vec<&str> = world.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["size", "points"]);

    let size = world.properties[0].as_attribute().unwrap();
    assert_eq!(size.default, Some(Value::Double(2.5)));
    let points = world.properties[1].as_attribute().unwrap();
    assert_eq!(
        points.default,
        Some(Value::Float3Array(vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]], Role::Point))
    );
    assert_eq!(points.default.as_ref().unwrap().type_name(), "point3f[]");
}

#[test]
fn structural_tables() {
    let data = world_crate();
    let file = CrateFile::open(&data, Limits::default(), false).unwrap();
    let names: Vec<&str> = file.sections().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["TOKENS", "STRINGS", "FIELDS", "FIELDSETS", "PATHS", "SPECS"]);

    let paths: Vec<String> = file.paths().iter().map(ToString::to_string).collect();
    assert_eq!(paths, ["/", "/World", "/World.size", "/World.points"]);
    assert_eq!(file.specs().len(), 4);
    assert_eq!(file.specs()[0].spec_type, SpecType::PseudoRoot);
}

#[test]
fn parallel_and_serial_agree() {
    let data = world_crate();
    let serial = read(&data).unwrap();
    let parallel = usdc::read_layer(&data, "test.usdc", Limits::default(), true, &mut Warnings::new()).unwrap();
    assert!(serial == parallel);
}

#[test]
fn loads_through_the_stage_api() {
    let stage = load(&world_crate(), "", &NullResolver, &LoadOptions::default()).unwrap();
    assert_eq!(stage.default_prim().unwrap().path(), &path("/World"));
    assert_eq!(stage.up_axis(), Some(Token::new("Z")));
    let world = stage.find_prim_at_path(&path("/World")).unwrap();
    assert_eq!(world.get("size", SampleTime::Default).unwrap(), Value::Double(2.5));
}

fn packed_values_crate() -> Vec<u8> {
    let mut b = CrateBuilder::new();
    let def = b.specifier(0);
    b.spec("/", SpecType::PseudoRoot, &[]);
    b.spec("/P", SpecType::Prim, &[("specifier", def)]);

    let int_array = b.token_value("int[]");
    let ints = b.int_array_compressed(&[1, 2, 3, 1000, -70000, 5, 5, 5]);
    b.spec("/P.ids", SpecType::Attribute, &[("typeName", int_array), ("default", ints)]);

    let float_array = b.token_value("float[]");
    let widths = b.float_array_compressed(&[0.5, 0.25, 0.125]);
    b.spec("/P.widths", SpecType::Attribute, &[("typeName", float_array), ("default", widths)]);

    let color = b.token_value("color3f");
    let red = CrateBuilder::float3_inline([1, 0, 0]);
    b.spec("/P.tint", SpecType::Attribute, &[("typeName", color), ("default", red)]);

    let float = b.token_value("float");
    let one = b.float(1.0);
    let three = b.float(3.0);
    let samples = b.time_samples(&[(4.0, three), (0.0, one)]);
    b.spec("/P.speed", SpecType::Attribute, &[("typeName", float), ("timeSamples", samples)]);

    let string = b.token_value("string");
    let label = b.string_value("hello");
    let custom = CrateBuilder::inline(tinyusdz::usdc::CrateType::Bool, 1);
    b.spec(
        "/P.label",
        SpecType::Attribute,
        &[("typeName", string), ("default", label), ("custom", custom)],
    );
    b.build()
}

#[test]
fn packed_values() {
    let layer = read(&packed_values_crate()).unwrap();
    let p = layer.find_prim(&path("/P")).unwrap();
    let attr = |name: &str| {
        p.properties
            .iter()
            .find(|q| q.name == name)
            .and_then(|q| q.as_attribute())
            .unwrap()
    };

    assert_eq!(
        attr("ids").default,
        Some(Value::IntArray(vec![1, 2, 3, 1000, -70000, 5, 5, 5]))
    );
    assert_eq!(attr("widths").default, Some(Value::FloatArray(vec![0.5, 0.25, 0.125])));
    assert_eq!(attr("tint").default, Some(Value::Float3([1.0, 0.0, 0.0], Role::Color)));

    let speed = attr("speed").time_samples.as_ref().unwrap();
    assert_eq!(speed.times().collect::<Vec<_>>(), [0.0, 4.0]);
    assert_eq!(speed.eval(2.0, Interpolation::Linear), Some(Value::Float(2.0)));

    let label = p.properties.iter().find(|q| q.name == "label").unwrap();
    assert!(label.custom);
    assert_eq!(label.get(SampleTime::Default).unwrap(), Value::String("hello".into()));
}

#[test]
fn crate_references_usda() {
    let mut b = CrateBuilder::new();
    b.spec("/", SpecType::PseudoRoot, &[]);
    let def = b.specifier(0);
    let refs = b.prepended_references(&[("asset.usda", Some("/Asset"))]);
    b.spec("/Shot", SpecType::Prim, &[("specifier", def), ("references", refs)]);
    let data = b.build();

    let resolver =
        MemoryResolver::new().with("asset.usda", "#usda 1.0\ndef Mesh \"Asset\" { def \"Part\" {} int n = 4 }\n");
    let stage = load_usdc(&data, "", &resolver, &LoadOptions::default()).unwrap();
    let shot = stage.find_prim_at_path(&path("/Shot")).unwrap();
    assert_eq!(shot.type_name(), Some("Mesh"));
    assert_eq!(shot.get("n", SampleTime::Default).unwrap(), Value::Int(4));
    assert!(stage.find_prim_at_path(&path("/Shot/Part")).is_some());
    assert!(stage.warnings().is_empty());
}

#[test]
fn layer_dictionary_metadata() {
    let mut b = CrateBuilder::new();
    let author = b.string_value("someone");
    let dict = b.dictionary(&[("author", author)]);
    b.spec("/", SpecType::PseudoRoot, &[("customLayerData", dict)]);
    let layer = read(&b.build()).unwrap();
    assert_eq!(
        layer.metas().custom_layer_data.get("author"),
        Some(&Value::String("someone".into()))
    );
}

#[test]
fn rejects_old_and_future_versions() {
    let old = CrateBuilder::new().version([0, 3, 0]).build();
    assert!(matches!(read(&old), Err(Error::UnsupportedVersion(_))));
    let future = CrateBuilder::new().version([1, 0, 0]).build();
    assert!(matches!(read(&future), Err(Error::UnsupportedVersion(_))));
}

#[test]
fn truncated_file_is_an_error() {
    let data = world_crate();
    for cut in [4, 40, 120, data.len() - 8] {
        assert!(read(&data[..cut]).is_err(), "cut at {cut}");
    }
}

#[test]
fn file_size_limit() {
    let data = world_crate();
    let limits = Limits {
        max_file_size: 64,
        ..Limits::default()
    };
    let err = usdc::read_layer(&data, "big.usdc", limits, false, &mut Warnings::new()).unwrap_err();
    assert!(matches!(err, Error::ResourceLimit { what: "file size", .. }));
}
