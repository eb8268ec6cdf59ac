use std::collections::BTreeMap;

use serde::Deserialize;

use crate::bundle::{codepoint_from_hex, Bundle};
use crate::codespace::{Codespace, StorageWidth};
use crate::emit::Fragment;
use crate::error::Error;

/// General_Category of unassigned codepoints (Cn) in the runtime's
/// category enumeration; the column defaults to it so unassigned ranges
/// collapse into the default record.
const UNASSIGNED_CATEGORY: u32 = 29;

#[derive(Deserialize)]
struct GeneralCategoryDoc {
    characters: BTreeMap<String, u32>,
}

#[derive(Deserialize)]
struct CombiningClassDoc {
    ccc: BTreeMap<String, u32>,
}

#[derive(Deserialize)]
struct NumericValueDoc {
    characters: BTreeMap<String, u32>,
    source: String,
    header: String,
    size: usize,
}

#[derive(Deserialize)]
struct CollationDoc {
    subtypes: BTreeMap<String, u32>,
    source: String,
    header: String,
    size: usize,
}

pub fn register_general_category(space: &mut Codespace) {
    space.register("general_category", UNASSIGNED_CATEGORY, StorageWidth::Uint8);
}

pub fn ingest_general_category(
    bundle: &mut Bundle,
    space: &mut Codespace,
) -> Result<Fragment, Error> {
    let doc: GeneralCategoryDoc = bundle.read_json("gc.json")?;
    let column = space.id("general_category");
    for (cp, value) in &doc.characters {
        space.set(codepoint_from_hex(cp, "gc.json")?, column, *value);
    }
    Ok(Fragment::marker("UNI_FEATURE_GC"))
}

pub fn register_ccc(space: &mut Codespace) {
    space.register("canonical_combining_class", 0, StorageWidth::Uint8);
}

pub fn ingest_ccc(bundle: &mut Bundle, space: &mut Codespace) -> Result<Fragment, Error> {
    let doc: CombiningClassDoc = bundle.read_json("ccc.json")?;
    let column = space.id("canonical_combining_class");
    for (cp, value) in &doc.ccc {
        space.set(codepoint_from_hex(cp, "ccc.json")?, column, *value);
    }
    Ok(Fragment::marker("UNI_FEATURE_CCC"))
}

pub fn register_numeric_value(space: &mut Codespace) {
    space.register("numeric_value_offset", 0, StorageWidth::Uint8);
}

/// Numeric values are decimal strings held in their own table; the
/// column stores each codepoint's index into it, with 0 meaning "no
/// numeric value". The table itself arrives precomputed in the document.
pub fn ingest_numeric_value(bundle: &mut Bundle, space: &mut Codespace) -> Result<Fragment, Error> {
    let doc: NumericValueDoc = bundle.read_json("nv.json")?;
    let column = space.id("numeric_value_offset");
    for (cp, index) in &doc.characters {
        space.set(codepoint_from_hex(cp, "nv.json")?, column, *index);
    }
    Ok(Fragment {
        source: doc.source,
        header: doc.header,
        public_header: "#define UNI_FEATURE_NUMERIC_VALUE\n".to_string(),
        size: doc.size,
    })
}

pub fn register_collation(space: &mut Codespace) {
    space.register("collation_subtype", 0, StorageWidth::Uint8);
}

/// The collation weight tables are precomputed; this only associates
/// each codepoint with its weight-lookup subtype.
pub fn ingest_collation(bundle: &mut Bundle, space: &mut Codespace) -> Result<Fragment, Error> {
    let doc: CollationDoc = bundle.read_json("collation.json")?;
    let column = space.id("collation_subtype");
    for (cp, subtype) in &doc.subtypes {
        space.set(codepoint_from_hex(cp, "collation.json")?, column, *subtype);
    }
    Ok(Fragment {
        source: doc.source,
        header: doc.header,
        public_header: "#define UNI_FEATURE_COLLATION\n".to_string(),
        size: doc.size,
    })
}
