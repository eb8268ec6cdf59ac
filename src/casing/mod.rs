#[cfg(test)]
mod tests;

use std::collections::HashMap;

use crate::codespace::{Codepoint, Codespace, PropertyId, StorageWidth};
use crate::emit::{self, Fragment};
use crate::error::Error;
use crate::table::TwoStageTable;

/// Largest absolute codepoint delta representable in the narrow field.
/// Stored values are biased by this amount so the field is unsigned.
pub const CASING_DIFF: i64 = 0x1FFF;

/// Set on a stored value when the mapping escaped to the overflow table.
/// Biased deltas occupy [0, 2 * CASING_DIFF] and can never reach it.
pub const CASING_TABLE_BIT: u16 = 0x8000;

/// Bits of a stored value that address the overflow table.
pub const CASING_INDEX_MASK: u16 = 0x3FFF;

/// The three simple case-mapping columns and their shared overflow table.
///
/// Case mappings get their own codespace, separate from the main one,
/// because all three directions must be encoded jointly before the
/// overflow table and the casing trie can be emitted. Each column's
/// default is the biased zero delta, i.e. "maps to itself".
///
/// Most mappings sit within `CASING_DIFF` of their source and pack into
/// the narrow field directly. The rare distant ones store an index into
/// the overflow table of absolute target codepoints instead. The table is
/// deduplicated by target value, so the three directions sharing it can
/// only ever agree on what an index resolves to.
pub struct CaseMappings {
    pub space: Codespace,
    overflow: Vec<Codepoint>,
    overflow_index: HashMap<Codepoint, u16>,
}

impl Default for CaseMappings {
    fn default() -> CaseMappings {
        CaseMappings::new()
    }
}

impl CaseMappings {
    pub fn new() -> CaseMappings {
        CaseMappings {
            space: Codespace::new(),
            // Slot 0 is reserved so a stored zero index never aliases a
            // real mapping.
            overflow: vec![0],
            overflow_index: HashMap::new(),
        }
    }

    /// Registers one direction's column. Idempotent, like every property
    /// registration.
    pub fn register_column(&mut self, name: &str) -> PropertyId {
        self.space
            .register(name, CASING_DIFF as u32, StorageWidth::Uint16)
    }

    /// Encodes `source → target` into the given column: a biased delta
    /// when it fits, otherwise an overflow-table reference.
    pub fn encode(
        &mut self,
        source: Codepoint,
        column: PropertyId,
        target: Codepoint,
    ) -> Result<(), Error> {
        let diff = i64::from(source) - i64::from(target);
        if diff.abs() > CASING_DIFF {
            let index = self.overflow_slot(target)?;
            self.space
                .set(source, column, u32::from(CASING_TABLE_BIT | index));
        } else {
            self.space.set(source, column, (diff + CASING_DIFF) as u32);
        }
        Ok(())
    }

    /// Decodes a column's stored value back to the absolute target, the
    /// way the runtime does.
    pub fn decode(&self, source: Codepoint, value: u16) -> Codepoint {
        if value & CASING_TABLE_BIT == CASING_TABLE_BIT {
            self.overflow[(value & CASING_INDEX_MASK) as usize]
        } else {
            (i64::from(source) - (i64::from(value) - CASING_DIFF)) as Codepoint
        }
    }

    pub fn overflow(&self) -> &[Codepoint] {
        &self.overflow
    }

    fn overflow_slot(&mut self, target: Codepoint) -> Result<u16, Error> {
        if let Some(&index) = self.overflow_index.get(&target) {
            return Ok(index);
        }
        if self.overflow.len() > CASING_INDEX_MASK as usize {
            return Err(format!(
                "case mapping overflow table is full ({} entries); \
                 a wider index field is required to encode U+{:04X}",
                self.overflow.len(),
                target
            )
            .into());
        }
        let index = self.overflow.len() as u16;
        self.overflow.push(target);
        self.overflow_index.insert(target, index);
        Ok(index)
    }

    /// Emits the shared overflow array, the decoding macros, and the
    /// casing trie. Runs once, after all three directions have ingested
    /// their mappings.
    pub fn finish(mut self) -> Result<Fragment, Error> {
        let mut source = String::new();
        emit::write_unichar_array(&mut source, "uni_case_mappings", &self.overflow);
        let mut size = self.overflow.len() * 4;

        let mut header = String::new();
        header.push_str(&format!(
            "#define CASING_IN_TABLE(C) (((C) & (uint16_t){0}) == (uint16_t){0})\n",
            CASING_TABLE_BIT
        ));
        header.push_str(&format!(
            "#define GET_CASED_VALUE(C) ((C) & (uint16_t){})\n",
            CASING_INDEX_MASK
        ));
        header.push_str(&format!("#define CASING_DIFF {}\n", CASING_DIFF));
        header.push_str(&format!(
            "extern const unichar uni_case_mappings[{}];\n",
            self.overflow.len()
        ));

        if self.space.property_count() > 0 {
            self.space.finalize();
            let table = TwoStageTable::build(&self.space)?;
            let trie = table.emit(&self.space, "CharCaseData", "uni_codepoint_casing");
            source.push_str(&trie.source);
            header.push_str(&trie.header);
            size += trie.size;
        }

        Ok(Fragment {
            source,
            header,
            public_header: String::new(),
            size,
        })
    }
}
