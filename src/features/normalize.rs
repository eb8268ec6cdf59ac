use std::collections::BTreeMap;

use serde::Deserialize;

use crate::bundle::{codepoint_from_hex, Bundle};
use crate::codespace::{Codepoint, Codespace, StorageWidth};
use crate::config::{Config, OptimizeFor};
use crate::emit::Fragment;
use crate::error::Error;
use crate::features::{FLAGS_PROPERTY, IS_COMPOSABLE};

#[derive(Deserialize)]
struct DecompositionDoc {
    mappings: Vec<(Codepoint, u32)>,
    source: String,
    header: String,
    size: usize,
}

#[derive(Deserialize)]
struct CompositionDoc {
    #[serde(rename = "compositionMappings")]
    mappings: Vec<(Codepoint, u32, u32)>,
    #[serde(rename = "compositionSource")]
    source: String,
    #[serde(rename = "compositionHeader")]
    header: String,
    #[serde(rename = "compositionSize")]
    size: usize,
}

#[derive(Deserialize)]
struct QuickCheckDoc {
    #[serde(rename = "quickCheckNFC")]
    nfc: BTreeMap<String, u32>,
    #[serde(rename = "quickCheckNFD")]
    nfd: BTreeMap<String, u32>,
}

pub fn register_decomposition(space: &mut Codespace) {
    space.register("canonical_decomposition_mapping_offset", 0, StorageWidth::Uint16);
}

/// The decomposition sequences come in two precomputed variants: one
/// expanded for lookup speed, one delta-packed for size. The
/// configuration picks which variant lands in the output.
pub fn ingest_decomposition(
    bundle: &mut Bundle,
    space: &mut Codespace,
    config: &Config,
) -> Result<Fragment, Error> {
    let entry = match config.optimize {
        OptimizeFor::Speed => "normalize_for_speed.json",
        OptimizeFor::Size => "normalize_for_size.json",
    };
    let doc: DecompositionDoc = bundle.read_json(entry)?;

    // The speed variant stores whole codepoints, so its footprint scales
    // with the configured character storage type.
    let size = match config.optimize {
        OptimizeFor::Speed => doc.size * config.character_storage_bytes(),
        OptimizeFor::Size => doc.size,
    };

    let column = space.id("canonical_decomposition_mapping_offset");
    for &(cp, offset) in &doc.mappings {
        space.set(cp, column, offset);
    }

    Ok(Fragment {
        source: doc.source,
        header: doc.header,
        public_header: "#define UNI_FEATURE_NFD\n".to_string(),
        size,
    })
}

pub fn register_composition(space: &mut Codespace) {
    space.register("canonical_composition_mapping_offset", 0, StorageWidth::Uint16);
    space.register("canonical_composition_mapping_count", 0, StorageWidth::Uint8);
    space.register(FLAGS_PROPERTY, 0, StorageWidth::Uint8);
}

pub fn ingest_composition(bundle: &mut Bundle, space: &mut Codespace) -> Result<Fragment, Error> {
    let doc: CompositionDoc = bundle.read_json("composition.json")?;

    let offsets = space.id("canonical_composition_mapping_offset");
    let counts = space.id("canonical_composition_mapping_count");
    let flags = space.id(FLAGS_PROPERTY);

    // Each triplet names a starter, the offset of its pair list, and the
    // number of pairs it can begin.
    for &(first, offset, count) in &doc.mappings {
        space.set(first, offsets, offset);
        space.set(first, counts, count);
        space.set_bitwise(first, flags, IS_COMPOSABLE);
    }

    Ok(Fragment {
        source: doc.source,
        header: doc.header,
        public_header: "#define UNI_FEATURE_NFC\n".to_string(),
        size: doc.size,
    })
}

pub fn register_quick_check(space: &mut Codespace) {
    space.register("quick_check_flags", 0, StorageWidth::Uint8);
}

/// NFC quick-check values live in the column's high nibble, NFD in the
/// low one; both features OR into the shared column.
pub fn ingest_nfc_quick_check(bundle: &mut Bundle, space: &mut Codespace) -> Result<Fragment, Error> {
    let doc: QuickCheckDoc = bundle.read_json("quickcheck.json")?;
    let column = space.id("quick_check_flags");
    for (cp, value) in &doc.nfc {
        space.set_bitwise(codepoint_from_hex(cp, "quickcheck.json")?, column, value << 4);
    }
    Ok(Fragment::marker("UNI_FEATURE_NFC_QUICK_CHECK"))
}

pub fn ingest_nfd_quick_check(bundle: &mut Bundle, space: &mut Codespace) -> Result<Fragment, Error> {
    let doc: QuickCheckDoc = bundle.read_json("quickcheck.json")?;
    let column = space.id("quick_check_flags");
    for (cp, value) in &doc.nfd {
        space.set_bitwise(codepoint_from_hex(cp, "quickcheck.json")?, column, *value);
    }
    Ok(Fragment::marker("UNI_FEATURE_NFD_QUICK_CHECK"))
}
