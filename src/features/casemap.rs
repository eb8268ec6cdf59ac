use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::bundle::{codepoint_from_hex, Bundle};
use crate::codespace::{Codepoint, Codespace, StorageWidth};
use crate::emit::Fragment;
use crate::error::Error;
use crate::features::{Context, FLAGS_PROPERTY, IS_CHANGES_WHEN_CASEFOLDED, IS_NORMALIZATION_NEEDED};

const SIMPLE_MAPPINGS_ENTRY: &str = "simple_case_mappings.json";

#[derive(Deserialize)]
struct SpecialCasingDoc {
    source: String,
    header: String,
    size: usize,
    #[serde(rename = "characterFlags")]
    character_flags: BTreeMap<String, u32>,
}

#[derive(Deserialize)]
struct CaseFoldDoc {
    source: String,
    header: String,
    size: usize,
    #[serde(rename = "hasGreek")]
    has_greek: Vec<Codepoint>,
    #[serde(rename = "caseFoldings")]
    case_foldings: Vec<(Codepoint, u32)>,
    #[serde(rename = "changesWhenCasefolded")]
    changes_when_casefolded: Vec<Codepoint>,
}

/// Feeds one direction's mappings through the differential encoder into
/// the casing store. The column was registered in phase 1; the shared
/// overflow table and the casing trie are emitted by the table feature's
/// finish phase once all directions are in.
pub fn ingest_simple_mapping(
    bundle: &mut Bundle,
    ctx: &mut Context,
    key: &str,
    column_name: &str,
    marker: &str,
) -> Result<Fragment, Error> {
    let doc: Value = bundle.read_json(SIMPLE_MAPPINGS_ENTRY)?;
    let mappings = doc
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| format!("bundle entry '{}' has no '{}' map", SIMPLE_MAPPINGS_ENTRY, key))?;

    let column = ctx.casing.space.id(column_name);
    // Object order is arbitrary; collect to fix the encoding order so
    // overflow indices come out the same every run.
    let mut pairs: BTreeMap<Codepoint, Codepoint> = BTreeMap::new();
    for (cp, target) in mappings {
        let target = target.as_str().ok_or_else(|| {
            format!(
                "bundle entry '{}': '{}' mapping for {} is not a string",
                SIMPLE_MAPPINGS_ENTRY, key, cp
            )
        })?;
        pairs.insert(
            codepoint_from_hex(cp, SIMPLE_MAPPINGS_ENTRY)?,
            codepoint_from_hex(target, SIMPLE_MAPPINGS_ENTRY)?,
        );
    }
    for (source, target) in pairs {
        ctx.casing.encode(source, column, target)?;
    }

    Ok(Fragment::marker(marker))
}

pub fn register_special_casing(space: &mut Codespace) {
    space.register(FLAGS_PROPERTY, 0, StorageWidth::Uint8);
}

/// Full (multi-codepoint) case mappings arrive as precomputed table text;
/// only the per-character flag bits go through the codespace.
pub fn ingest_special_casing(bundle: &mut Bundle, space: &mut Codespace) -> Result<Fragment, Error> {
    let doc: SpecialCasingDoc = bundle.read_json("special_case_mappings.json")?;

    let flags = space.id(FLAGS_PROPERTY);
    for (cp, bits) in &doc.character_flags {
        space.set_bitwise(
            codepoint_from_hex(cp, "special_case_mappings.json")?,
            flags,
            *bits,
        );
    }

    Ok(Fragment {
        source: doc.source,
        header: doc.header,
        public_header: String::new(),
        size: doc.size,
    })
}

pub fn register_case_folding(space: &mut Codespace) {
    space.register("full_casefold_mapping_offset", 0, StorageWidth::Uint16);
    space.register(FLAGS_PROPERTY, 0, StorageWidth::Uint8);
}

pub fn ingest_case_folding(bundle: &mut Bundle, space: &mut Codespace) -> Result<Fragment, Error> {
    let doc: CaseFoldDoc = bundle.read_json("casefold.json")?;

    let flags = space.id(FLAGS_PROPERTY);
    let offsets = space.id("full_casefold_mapping_offset");

    // Folding Greek characters can denormalize the text; the runtime
    // re-normalizes only when it saw one.
    for &cp in &doc.has_greek {
        space.set_bitwise(cp, flags, IS_NORMALIZATION_NEEDED);
    }
    for &cp in &doc.changes_when_casefolded {
        space.set_bitwise(cp, flags, IS_CHANGES_WHEN_CASEFOLDED);
    }
    for &(cp, offset) in &doc.case_foldings {
        space.set(cp, offsets, offset);
    }

    let mut header = doc.header;
    header.push_str(&format!(
        "#define UNI_CHAR_NEEDS_NORMALIZATION {}u\n",
        IS_NORMALIZATION_NEEDED
    ));
    header.push_str(&format!(
        "#define UNI_CHAR_CHANGES_WHEN_CASEFOLDED {}u\n",
        IS_CHANGES_WHEN_CASEFOLDED
    ));

    Ok(Fragment {
        source: doc.source,
        header,
        public_header: "#define UNI_FEATURE_CASEFOLD_DEFAULT\n".to_string(),
        size: doc.size,
    })
}
