
use std::collections::HashMap;
use std::fmt::Write;

use crate::codespace::{Codepoint, Codespace, Property, Record};
use crate::emit::{self, Fragment};
use crate::error::Error;

/// The number of codepoints covered by one stage1 bucket. A power of two
/// so the lookup splits a codepoint with a shift and a mask.
pub const BUCKET_SIZE: u32 = 128;

/// A two-stage lookup table over a finalized [`Codespace`], as
/// recommended by Chapter 5.1 of The Unicode Standard.
///
/// `stage1` maps a bucket number to an offset into `stage2`; `stage2`
/// maps a bucket-relative codepoint to an index into the deduplicated
/// record table. Identical 128-entry buckets share one `stage2` slice,
/// which is where most of the space savings comes from: the long
/// unassigned stretches of the codespace collapse to a single physical
/// bucket.
pub struct TwoStageTable {
    records: Vec<Record>,
    stage1: Vec<u16>,
    stage2: Vec<u16>,
    largest: Codepoint,
}

impl TwoStageTable {
    /// Builds the table from a finalized codespace. Record slot 0 is
    /// always the default record; it doubles as the result for any
    /// codepoint above the largest explicitly-assigned one.
    pub fn build(space: &Codespace) -> Result<TwoStageTable, Error> {
        let default = space.default_record().clone();

        // Codepoints above the largest non-default record are guaranteed
        // to resolve to the default and are excluded from tabulation.
        let mut largest: Codepoint = 0;
        for (cp, _) in space.rows() {
            if space.record(cp) != default {
                largest = largest.max(cp);
            }
        }

        let mut records = vec![default.clone()];
        let mut record_index: HashMap<Record, u16> = HashMap::new();
        record_index.insert(default, 0);

        let mut stage1: Vec<u16> = Vec::new();
        let mut stage2: Vec<u16> = Vec::new();
        let mut bucket_offsets: HashMap<Vec<u16>, u16> = HashMap::new();

        let mut bucket_start = 0;
        while bucket_start <= largest {
            let mut bucket: Vec<u16> = Vec::with_capacity(BUCKET_SIZE as usize);
            for cp in bucket_start..bucket_start + BUCKET_SIZE {
                let record = space.record(cp);
                let index = match record_index.get(&record) {
                    Some(&index) => index,
                    None => {
                        let index = u16::try_from(records.len()).map_err(|_| {
                            format!(
                                "record table exceeds {} entries; the stage2 index \
                                 width cannot address it",
                                u16::MAX
                            )
                        })?;
                        records.push(record.clone());
                        record_index.insert(record, index);
                        index
                    }
                };
                bucket.push(index);
            }

            match bucket_offsets.get(&bucket) {
                Some(&offset) => stage1.push(offset),
                None => {
                    let offset = u16::try_from(stage2.len()).map_err(|_| {
                        format!(
                            "stage2 table exceeds {} entries; the stage1 offset \
                             width cannot address it",
                            u16::MAX
                        )
                    })?;
                    stage1.push(offset);
                    stage2.extend_from_slice(&bucket);
                    bucket_offsets.insert(bucket, offset);
                }
            }

            bucket_start += BUCKET_SIZE;
        }

        Ok(TwoStageTable {
            records,
            stage1,
            stage2,
            largest,
        })
    }

    /// Resolves a codepoint exactly the way the emitted C function does.
    pub fn lookup(&self, cp: Codepoint) -> &Record {
        if cp > self.largest {
            return &self.records[0];
        }
        let offset = self.stage1[(cp >> BUCKET_SIZE.trailing_zeros()) as usize];
        let index = self.stage2[offset as usize + (cp & (BUCKET_SIZE - 1)) as usize];
        &self.records[index as usize]
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn stage1(&self) -> &[u16] {
        &self.stage1
    }

    pub fn stage2(&self) -> &[u16] {
        &self.stage2
    }

    pub fn largest(&self) -> Codepoint {
        self.largest
    }

    /// Emits the record table, both stage tables, and the O(1) lookup
    /// function as a C source fragment, plus the record struct and the
    /// function prototype as a header fragment.
    pub fn emit(&self, space: &Codespace, struct_name: &str, function_name: &str) -> Fragment {
        // Order struct fields by descending storage width so the struct
        // packs without padding; ties keep registration order.
        let mut properties: Vec<&Property> = space.properties().iter().collect();
        properties.sort_by(|a, b| b.width.cmp(&a.width));

        let mut size = 0;
        let mut source = String::new();
        let _ = writeln!(
            source,
            "const struct {} *{}(unichar cp)",
            struct_name, function_name
        );
        source.push_str("{\n");

        let _ = writeln!(
            source,
            "    static const struct {} {}_records[] = {{",
            struct_name, function_name
        );
        for record in &self.records {
            source.push_str("        {");
            for property in &properties {
                let _ = write!(source, "{}u,", record.get(property.id));
                size += property.width.byte_size();
            }
            source.push_str("},\n");
        }
        source.push_str("    };\n\n");

        emit::write_u16_array(
            &mut source,
            "    ",
            &format!("{}_stage1", function_name),
            &self.stage1,
        );
        size += self.stage1.len() * 2;
        source.push('\n');

        emit::write_u16_array(
            &mut source,
            "    ",
            &format!("{}_stage2", function_name),
            &self.stage2,
        );
        size += self.stage2.len() * 2;
        source.push('\n');

        let _ = writeln!(source, "    const struct {} *data = NULL;", struct_name);
        let _ = writeln!(source, "    if (cp > UNICHAR_C({}))", self.largest);
        source.push_str("    {\n");
        let _ = writeln!(
            source,
            "        data = &{}_records[0]; // code point out of range",
            function_name
        );
        source.push_str("    }\n");
        source.push_str("    else\n");
        source.push_str("    {\n");
        let _ = writeln!(
            source,
            "        const uint16_t stage2_offset = {}_stage1[cp >> UNICHAR_C({})];",
            function_name,
            BUCKET_SIZE.trailing_zeros()
        );
        let _ = writeln!(
            source,
            "        const uint16_t codepoint_index = {}_stage2[stage2_offset + (cp & UNICHAR_C({}))];",
            function_name,
            BUCKET_SIZE - 1
        );
        let _ = writeln!(source, "        data = &{}_records[codepoint_index];", function_name);
        source.push_str("    }\n");
        source.push('\n');
        source.push_str("    return data;\n");
        source.push_str("}\n\n");

        let mut header = String::new();
        let _ = writeln!(header, "struct {} {{", struct_name);
        for property in &properties {
            let _ = writeln!(header, "    {} {};", property.width.c_type(), property.name);
        }
        header.push_str("};\n");
        let _ = writeln!(
            header,
            "const struct {} *{}(unichar cp);",
            struct_name, function_name
        );

        Fragment {
            source,
            header,
            public_header: String::new(),
            size,
        }
    }
}

/// Finalizes the codespace and compiles it into its C fragment. A
/// codespace with no registered properties produces nothing; this happens
/// when the configuration requests no feature that needs a lookup table.
pub fn compile(
    space: &mut Codespace,
    struct_name: &str,
    function_name: &str,
) -> Result<Fragment, Error> {
    if space.property_count() == 0 {
        return Ok(Fragment::default());
    }
    space.finalize();
    let table = TwoStageTable::build(space)?;
    Ok(table.emit(space, struct_name, function_name))
}
