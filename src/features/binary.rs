use std::collections::BTreeMap;

use serde::Deserialize;

use crate::bundle::{codepoint_from_hex, Bundle};
use crate::codespace::{Codespace, StorageWidth};
use crate::emit::Fragment;
use crate::error::Error;

/// Bit assignments for the shared `binary_properties` column. Each value
/// is `1 << property`, where `property` is the property's index in the
/// runtime's public binary-property enumeration, so the runtime can test
/// membership with a single shift and mask.
pub const BINARY_NONCHARACTER_CODE_POINT: u32 = 0x1;
pub const BINARY_ALPHABETIC: u32 = 0x2;
pub const BINARY_LOWERCASE: u32 = 0x4;
pub const BINARY_UPPERCASE: u32 = 0x8;
pub const BINARY_HEX_DIGIT: u32 = 0x10;
pub const BINARY_WHITE_SPACE: u32 = 0x20;
pub const BINARY_MATH: u32 = 0x40;
pub const BINARY_DASH: u32 = 0x80;
pub const BINARY_DIACRITIC: u32 = 0x100;
pub const BINARY_EXTENDER: u32 = 0x200;
pub const BINARY_IDEOGRAPHIC: u32 = 0x400;
pub const BINARY_QUOTATION_MARK: u32 = 0x800;
pub const BINARY_UNIFIED_IDEOGRAPH: u32 = 0x1000;
pub const BINARY_TERMINAL_PUNCTUATION: u32 = 0x2000;

const ENTRY: &str = "binary_properties.json";

#[derive(Deserialize)]
struct BinaryPropertiesDoc {
    #[serde(flatten)]
    properties: BTreeMap<String, BTreeMap<String, bool>>,
}

pub fn register(space: &mut Codespace) {
    space.register("binary_properties", 0, StorageWidth::Uint16);
}

/// ORs one property's bit into the shared column for every codepoint the
/// document lists under `key`.
pub fn ingest(
    bundle: &mut Bundle,
    space: &mut Codespace,
    key: &str,
    bit: u32,
    marker: &str,
) -> Result<Fragment, Error> {
    let doc: BinaryPropertiesDoc = bundle.read_json(ENTRY)?;
    let mappings = doc
        .properties
        .get(key)
        .ok_or_else(|| format!("bundle entry '{}' has no '{}' map", ENTRY, key))?;

    let column = space.id("binary_properties");
    for cp in mappings.keys() {
        space.set_bitwise(codepoint_from_hex(cp, ENTRY)?, column, bit);
    }

    Ok(Fragment::marker(marker))
}
