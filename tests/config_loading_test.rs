//! Integration tests for loading setup documents
//!
//! Exercises the public loader API against `config/spectrometer.yml`, the
//! sample setup shipped with the crate.
//!
//! ## Test Coverage
//!
//! 1. **Sample document**: section sizes, global settings, connection lookup
//! 2. **Round trip**: writing and re-loading yields an equal document
//! 3. **Error taxonomy**: syntax, schema, reference and type failures carry
//!    the offending key path
//! 4. **Extension sections**: unknown top-level sections survive load and write
//! 5. **Key collisions**: keys that only differ in YAML type (`1` and `'1'`)
//!    are rejected instead of silently overwritten

use daq_config::{
    get_section, load, load_file, resolve_connection, to_yaml_string, ConfigError, ErrorKind,
    ModuleCategory, OptionValue,
};
use std::io::Write;
use std::path::PathBuf;

const SPECTROMETER: &str = include_str!("../config/spectrometer.yml");

#[test]
fn sample_document_has_two_modules_per_category() {
    let doc = load(SPECTROMETER).expect("sample document should load");

    assert_eq!(get_section(&doc, ModuleCategory::Gui).len(), 2);
    assert_eq!(get_section(&doc, ModuleCategory::Logic).len(), 2);
    assert_eq!(get_section(&doc, ModuleCategory::Hardware).len(), 2);
    assert_eq!(doc.len(), 6);

    let names: Vec<&str> = get_section(&doc, ModuleCategory::Logic)
        .iter()
        .map(|entry| entry.name.as_str())
        .collect();
    assert_eq!(names, ["spectrometer_logic", "plot_logic"]);
}

#[test]
fn sample_document_resolves_spectrometer_connection() {
    let doc = load(SPECTROMETER).unwrap();

    let target = resolve_connection(&doc, "spectrometer_logic", "spectrometer").unwrap();
    assert_eq!(target.name, "myspectrometer");
    assert_eq!(target.category, ModuleCategory::Hardware);
    assert_eq!(
        target.class_path,
        "spectrometer.spectrometer_dummy.SpectrometerDummy"
    );

    // Cross-category: a GUI connected to a logic module
    let logic = resolve_connection(&doc, "spectrometer_gui", "spectrometer_logic").unwrap();
    assert_eq!(logic.category, ModuleCategory::Logic);
}

#[test]
fn sample_document_global_settings() {
    let doc = load(SPECTROMETER).unwrap();
    let global = doc.global();

    assert_eq!(global.startup, ["spectrometer_gui"]);
    assert_eq!(global.namespace_server_port, 18861);
    assert_eq!(global.default_data_dir, Some(PathBuf::from("/home/lab/Data")));
    assert_eq!(global.stylesheet.as_deref(), Some("qdark.qss"));

    let server = global.remote_modules_server.as_ref().unwrap();
    assert_eq!(server.address, "localhost");
    assert_eq!(server.port, 12345);
}

#[test]
fn sample_document_extra_options_are_typed() {
    let doc = load(SPECTROMETER).unwrap();

    let gui = doc.module("spectrometer_gui").unwrap();
    let colors = gui.option("plot_colors").and_then(OptionValue::as_list).unwrap();
    assert_eq!(colors.len(), 3);
    assert_eq!(
        colors[0],
        OptionValue::List(vec![
            OptionValue::Integer(255),
            OptionValue::Integer(170),
            OptionValue::Integer(0),
        ])
    );

    let plot = doc.module("plot_logic").unwrap();
    assert_eq!(plot.option("default_plot_number"), Some(&OptionValue::Integer(3)));

    let motor = doc.module("mymotor").unwrap();
    assert!(motor.allow_remote);
    assert!(motor.option("allow_remote").is_none());
}

#[test]
fn written_document_reloads_equal() {
    let doc = load(SPECTROMETER).unwrap();
    let text = to_yaml_string(&doc).unwrap();
    let reloaded = load(&text).unwrap();
    assert_eq!(reloaded, doc);
}

#[test]
fn load_file_reads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SPECTROMETER.as_bytes()).unwrap();

    let doc = load_file(file.path()).unwrap();
    assert_eq!(doc, load(SPECTROMETER).unwrap());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_file(&dir.path().join("absent.yml")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn malformed_text_is_syntax_error() {
    let err = load("global:\n  startup: [spectrometer_gui\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
}

#[test]
fn missing_class_names_category_and_module() {
    let text = SPECTROMETER.replace(
        "        module.Class: 'plot_logic.PlotLogic'\n",
        "",
    );
    let err = load(&text).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(err.path(), Some("logic.plot_logic.module.Class"));

    let message = err.to_string();
    assert!(message.contains("plot_logic"), "{message}");
    assert!(message.contains("logic"), "{message}");
}

#[test]
fn unknown_connection_target_is_reference_error() {
    let text = SPECTROMETER.replace("spectrometer: myspectrometer", "spectrometer: nospectrometer");
    match load(&text).unwrap_err() {
        ConfigError::Reference {
            source_module,
            target,
            path,
        } => {
            assert_eq!(source_module, "spectrometer_logic");
            assert_eq!(target, "nospectrometer");
            assert_eq!(path, "logic.spectrometer_logic.connect.spectrometer");
        }
        other => panic!("expected reference error, got {other:?}"),
    }
}

#[test]
fn non_numeric_namespace_port_is_type_error() {
    let text = SPECTROMETER.replace(
        "namespace_server_port: 18861",
        "namespace_server_port: 'eighteen'",
    );
    let err = load(&text).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.path(), Some("global.namespace_server_port"));
}

#[test]
fn numeric_string_port_is_coerced() {
    let text = SPECTROMETER.replace(
        "namespace_server_port: 18861",
        "namespace_server_port: '18862'",
    );
    assert_eq!(load(&text).unwrap().global().namespace_server_port, 18862);
}

#[test]
fn name_shared_across_categories_is_schema_error() {
    let text = format!(
        "{SPECTROMETER}\n    plot_logic:\n        module.Class: 'dummy.Duplicate'\n"
    );
    let err = load(&text).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(err.path(), Some("hardware.plot_logic"));
}

#[test]
fn extension_sections_are_preserved() {
    let text = format!(
        "{SPECTROMETER}\nscripts:\n    warmup:\n        steps: [1, 2, 3]\n        note: 'keep me'\n"
    );
    let doc = load(&text).unwrap();

    let scripts = doc.extra_sections().get("scripts").unwrap();
    assert_eq!(scripts["warmup"]["note"].as_str(), Some("keep me"));
    assert_eq!(doc.len(), 6);

    let reloaded = load(&to_yaml_string(&doc).unwrap()).unwrap();
    assert_eq!(reloaded.extra_sections(), doc.extra_sections());
    assert_eq!(reloaded, doc);
}

#[test]
fn float_specials_survive_round_trip() {
    let text = SPECTROMETER.replace(
        "exposure_time: 0.1\n",
        "exposure_time: 0.1\n        gain: .nan\n        max_counts: .inf\n        floor: -.inf\n",
    );
    let doc = load(&text).unwrap();
    let spectrometer = doc.module("myspectrometer").unwrap();
    assert!(spectrometer
        .option("gain")
        .and_then(OptionValue::as_f64)
        .unwrap()
        .is_nan());
    assert_eq!(
        spectrometer.option("floor"),
        Some(&OptionValue::Float(f64::NEG_INFINITY))
    );

    let reloaded = load(&to_yaml_string(&doc).unwrap()).unwrap();
    assert_eq!(reloaded, doc);
}

#[test]
fn large_unsigned_option_is_passed_through() {
    let text = SPECTROMETER.replace(
        "exposure_time: 0.1\n",
        "exposure_time: 0.1\n        serial: 18446744073709551615\n",
    );
    let doc = load(&text).unwrap();
    let serial = doc.module("myspectrometer").unwrap().option("serial").unwrap();
    assert_eq!(serial.as_u64(), Some(u64::MAX));

    let reloaded = load(&to_yaml_string(&doc).unwrap()).unwrap();
    assert_eq!(reloaded, doc);
}

#[test]
fn extension_sections_with_same_key_text_are_rejected() {
    let err = load("1: first\n'1': second\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(err.path(), Some("1"));
}

#[test]
fn global_extra_keys_with_same_text_are_rejected() {
    let text = SPECTROMETER.replace(
        "namespace_server_port: 18861\n",
        "namespace_server_port: 18861\n    42: first\n    '42': second\n",
    );
    let err = load(&text).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(err.path(), Some("global.42"));
}

#[test]
fn module_option_keys_with_same_text_are_rejected() {
    let text = SPECTROMETER.replace(
        "exposure_time: 0.1\n",
        "exposure_time: 0.1\n        lut: {1: a, '1': b}\n",
    );
    let err = load(&text).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(err.path(), Some("hardware.myspectrometer.lut.1"));
}
