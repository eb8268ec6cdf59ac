use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use assert_cmd::cargo::cargo_bin;
use duct::cmd;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use unigen::bundle::Bundle;
use unigen::config::Config;

fn write_bundle(path: &Path, entries: &[(&str, &str)]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, body) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

const BINARY_PROPERTIES_JSON: &str = r#"{
    "isAlphabetic": {"0041": true, "0061": true, "4E00": true},
    "isWhiteSpace": {"0020": true, "0009": true}
}"#;

const GC_JSON: &str = r#"{"characters": {"0041": 1, "0061": 2, "0020": 27}}"#;

const SIMPLE_CASE_MAPPINGS_JSON: &str = r#"{
    "lowercase": {"0041": "0061", "10400": "10428"},
    "uppercase": {"0061": "0041", "AB70": "13A0"},
    "titlecase": {"0061": "0041"}
}"#;

const CASEFOLD_JSON: &str = r#"{
    "source": "const unichar uni_casefold_sequences[] = { UNICHAR_C(0x0073), UNICHAR_C(0x0073), };\n",
    "header": "extern const unichar uni_casefold_sequences[2];\n",
    "size": 8,
    "hasGreek": [837, 953],
    "caseFoldings": [[223, 1], [7838, 1]],
    "changesWhenCasefolded": [65, 223]
}"#;

const WB_JSON: &str = r#"{
    "source": "static const uint8_t uni_wb_machine[] = { 1u, 2u, };\n",
    "header": "",
    "size": 2,
    "states": 22,
    "wb": [[39, 5], [8205, 1]],
    "wbx": [[8205, 1]]
}"#;

const SEGMENTATION_JSON: &str = r#"{"header": "int uni_next_break(void);\n"}"#;

const CCC_JSON: &str = r#"{"ccc": {"0300": 230, "0316": 220}}"#;

const NORMALIZE_SPEED_JSON: &str = r#"{
    "mappings": [[192, 1], [224, 3]],
    "source": "const unichar uni_decompositions[] = { UNICHAR_C(0x0041), UNICHAR_C(0x0300), };\n",
    "header": "extern const unichar uni_decompositions[2];\n",
    "size": 2
}"#;

fn full_bundle(path: &Path) {
    write_bundle(
        path,
        &[
            ("binary_properties.json", BINARY_PROPERTIES_JSON),
            ("gc.json", GC_JSON),
            ("simple_case_mappings.json", SIMPLE_CASE_MAPPINGS_JSON),
            ("casefold.json", CASEFOLD_JSON),
            ("wb.json", WB_JSON),
            ("segmentation.json", SEGMENTATION_JSON),
            ("ccc.json", CCC_JSON),
            ("normalize_for_speed.json", NORMALIZE_SPEED_JSON),
        ],
    );
}

const CONFIG_JSON: &str = r#"{
    "version": "1.0",
    "endian": "little",
    "optimizeFor": "speed",
    "characterStorage": "uint32_t",
    "stackBufferSize": 64,
    "encodingForms": ["utf-8"],
    "characterProperties": [
        "Alphabetic",
        "White_Space",
        "General_Category",
        "Simple_Lowercase_Mapping"
    ],
    "algorithms": {
        "caseFolding": ["default"],
        "segmentation": ["word"]
    }
}"#;

#[test]
fn test_generates_all_three_artifacts() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let dir = temp_dir.path();
    full_bundle(&dir.join("unicode.bin"));
    fs::write(dir.join("features.json"), CONFIG_JSON).unwrap();

    let output = cmd!(
        cargo_bin("unigen"),
        "--config",
        dir.join("features.json"),
        "--bundle",
        dir.join("unicode.bin"),
        "--output",
        dir,
    )
    .read()
    .unwrap();
    assert!(output.contains("writing:"));

    let source = fs::read_to_string(dir.join("unidata.c")).unwrap();
    let header = fs::read_to_string(dir.join("unidata.h")).unwrap();
    let public_header = fs::read_to_string(dir.join("_api.h")).unwrap();

    // Public platform surface.
    assert!(public_header.contains("#define UNI_LITTLE_ENDIAN"));
    assert!(public_header.contains("#define UNI_STACK_BUFFER_SIZE 64"));
    assert!(public_header.contains("typedef uint32_t unichar;"));

    // Presence markers, one per requested or implied feature. Ingestion
    // markers come out in feature-name order; the segmentation driver's
    // marker lands last because it is emitted by the finish phase.
    let markers = [
        "UNI_FEATURE_ALPHABETIC",
        "UNI_FEATURE_BINARY_PROPERTIES",
        "UNI_FEATURE_CASEFOLD_DEFAULT",
        "UNI_FEATURE_ENCODING_UTF8",
        "UNI_FEATURE_GC",
        "UNI_FEATURE_SIMPLE_LOWERCASE_MAPPINGS",
        "UNI_FEATURE_WHITE_SPACE",
        "UNI_FEATURE_WB",
        "UNI_FEATURE_SEGMENTATION",
    ];
    let mut last = 0;
    for marker in markers {
        let at = public_header
            .find(&format!("#define {}\n", marker))
            .unwrap_or_else(|| panic!("missing marker {}", marker));
        assert!(at >= last, "marker {} out of order", marker);
        last = at;
        assert_eq!(public_header.matches(marker).count(), 1, "{}", marker);
    }

    // The private header carries the struct and the constants the
    // runtime compiles against.
    assert!(header.contains("#define UNICODE_VERSION_MAJOR 16"));
    assert!(header.contains("#define UNI_OPTIMIZE_FOR_SPEED"));
    assert!(header.contains("struct CodepointData {"));
    assert!(header.contains("const struct CodepointData *uni_codepoint_data(unichar cp);"));
    assert!(header.contains("#define MAX_BREAK_STATES 22"));
    assert!(header.contains("#define CASING_DIFF 8191"));

    // The source carries the tables: the main trie, the casing trie, and
    // the precomputed fragments passed through from the bundle.
    assert!(source.contains("const struct CodepointData *uni_codepoint_data(unichar cp)"));
    assert!(source.contains("const struct CharCaseData *uni_codepoint_casing(unichar cp)"));
    assert!(source.contains("uni_casefold_sequences"));
    assert!(source.contains("uni_wb_machine"));
    // The far-away uppercase target escaped into the overflow table...
    assert!(source.contains("UNICHAR_C(0x13A0)"));

    // Exactly one trailing newline, no blank lines anywhere.
    for artifact in [&source, &header, &public_header] {
        assert!(artifact.ends_with('\n'));
        assert!(!artifact.contains("\n\n"));
    }
}

#[test]
fn test_output_is_byte_identical_across_runs() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    full_bundle(&dir.join("unicode.bin"));
    fs::write(dir.join("features.json"), CONFIG_JSON).unwrap();

    let mut runs = Vec::new();
    for pass in ["a", "b"] {
        let out = dir.join(pass);
        fs::create_dir(&out).unwrap();
        cmd!(
            cargo_bin("unigen"),
            "--config",
            dir.join("features.json"),
            "--bundle",
            dir.join("unicode.bin"),
            "--output",
            &out,
        )
        .run()
        .unwrap();
        runs.push((
            fs::read(out.join("unidata.c")).unwrap(),
            fs::read(out.join("unidata.h")).unwrap(),
            fs::read(out.join("_api.h")).unwrap(),
        ));
    }
    assert_eq!(runs[0], runs[1]);
}

#[test]
fn test_missing_bundle_fails_with_diagnostic() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();

    let result = cmd!(
        cargo_bin("unigen"),
        "--bundle",
        dir.join("unicode.bin"),
        "--output",
        dir,
    )
    .stderr_capture()
    .unchecked()
    .run()
    .unwrap();
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("cannot open data bundle"));
}

#[test]
fn test_missing_entry_fails_and_names_it() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    // A bundle without gc.json while the config requests the
    // General_Category property.
    write_bundle(&dir.join("unicode.bin"), &[("ccc.json", CCC_JSON)]);
    fs::write(
        dir.join("features.json"),
        r#"{"version": "1.0", "characterProperties": ["General_Category"]}"#,
    )
    .unwrap();

    let result = cmd!(
        cargo_bin("unigen"),
        "--config",
        dir.join("features.json"),
        "--bundle",
        dir.join("unicode.bin"),
        "--output",
        dir,
    )
    .stderr_capture()
    .unchecked()
    .run()
    .unwrap();
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("gc.json"));
}

#[test]
fn test_case_folding_implies_canonical_decomposition() {
    // Requesting only canonical case folding must pull in canonical
    // decomposition through the dependency graph, and each implied
    // feature's marker must appear exactly once, in name order.
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write_bundle(
        &dir.join("unicode.bin"),
        &[
            ("casefold.json", CASEFOLD_JSON),
            ("ccc.json", CCC_JSON),
            ("normalize_for_speed.json", NORMALIZE_SPEED_JSON),
        ],
    );

    let config =
        Config::from_str(r#"{"version": "1.0", "algorithms": {"caseFolding": ["canonical"]}}"#)
            .unwrap();
    let mut bundle = Bundle::open(&dir.join("unicode.bin")).unwrap();
    let artifacts = unigen::generate(&config, &mut bundle).unwrap();

    let markers = [
        "UNI_FEATURE_CASEFOLD_CANONICAL",
        "UNI_FEATURE_CCC",
        "UNI_FEATURE_NFD",
        "UNI_FEATURE_CASEFOLD_DEFAULT",
        "UNI_FEATURE_ENCODING_UTF8",
    ];
    let mut last = 0;
    for marker in markers {
        let at = artifacts
            .public_header
            .find(&format!("#define {}\n", marker))
            .unwrap_or_else(|| panic!("missing marker {}", marker));
        assert!(at >= last, "marker {} out of order", marker);
        last = at;
        assert_eq!(artifacts.public_header.matches(marker).count(), 1);
    }
}
