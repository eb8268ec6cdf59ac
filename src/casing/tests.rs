use crate::casing::*;

mod tests_encode {
    use super::*;

    #[test]
    fn test_small_deltas_round_trip() {
        let mut mappings = CaseMappings::new();
        let lower = mappings.register_column("simple_lowercase_mapping");

        // 'A' -> 'a', delta -32, and a negative-direction pair.
        mappings.encode(0x41, lower, 0x61).unwrap();
        mappings.encode(0x61, lower, 0x41).unwrap();
        // Extremes of the representable range.
        mappings.encode(0x4000, lower, 0x4000 + CASING_DIFF as u32).unwrap();
        mappings.encode(0x4000 + CASING_DIFF as u32, lower, 0x4000).unwrap();
        mappings.space.finalize();

        let cases = [
            (0x41u32, 0x61u32),
            (0x61, 0x41),
            (0x4000, 0x4000 + CASING_DIFF as u32),
            (0x4000 + CASING_DIFF as u32, 0x4000),
        ];
        for (source, target) in cases {
            let value = mappings.space.record(source).get(lower) as u16;
            assert_eq!(value & CASING_TABLE_BIT, 0, "U+{:04X} escaped", source);
            assert_eq!(mappings.decode(source, value), target);
        }
        // Nothing beyond the reserved slot was added.
        assert_eq!(mappings.overflow().len(), 1);
    }

    #[test]
    fn test_unmapped_codepoint_decodes_to_itself() {
        let mut mappings = CaseMappings::new();
        let lower = mappings.register_column("simple_lowercase_mapping");
        mappings.space.finalize();

        let value = mappings.space.record(0x2603).get(lower) as u16;
        assert_eq!(mappings.decode(0x2603, value), 0x2603);
    }

    #[test]
    fn test_large_delta_escapes_to_overflow_table() {
        let mut mappings = CaseMappings::new();
        let upper = mappings.register_column("simple_uppercase_mapping");

        // CHEROKEE SMALL LETTER A maps far past the delta range.
        mappings.encode(0xAB70, upper, 0x13A0).unwrap();
        mappings.space.finalize();

        let value = mappings.space.record(0xAB70).get(upper) as u16;
        assert_eq!(value & CASING_TABLE_BIT, CASING_TABLE_BIT);
        assert_eq!(mappings.overflow()[(value & CASING_INDEX_MASK) as usize], 0x13A0);
        assert_eq!(mappings.decode(0xAB70, value), 0x13A0);
    }

    #[test]
    fn test_overflow_entries_dedup_across_directions() {
        let mut mappings = CaseMappings::new();
        let lower = mappings.register_column("simple_lowercase_mapping");
        let title = mappings.register_column("simple_titlecase_mapping");

        mappings.encode(0x10000, lower, 0x40000).unwrap();
        mappings.encode(0x20000, title, 0x40000).unwrap();
        mappings.space.finalize();

        // Both directions resolve through the same slot to the same
        // absolute target.
        let a = mappings.space.record(0x10000).get(lower) as u16;
        let b = mappings.space.record(0x20000).get(title) as u16;
        assert_eq!(a & CASING_INDEX_MASK, b & CASING_INDEX_MASK);
        assert_eq!(mappings.decode(0x10000, a), 0x40000);
        assert_eq!(mappings.decode(0x20000, b), 0x40000);
        assert_eq!(mappings.overflow().len(), 2);
    }

    #[test]
    fn test_overflow_capacity_is_enforced() {
        let mut mappings = CaseMappings::new();
        let lower = mappings.register_column("simple_lowercase_mapping");

        // Fill every addressable slot (slot 0 is reserved).
        for i in 1..=CASING_INDEX_MASK as u32 {
            mappings.encode(0x40, lower, 0x100000 + i).unwrap();
        }
        assert_eq!(mappings.overflow().len(), CASING_INDEX_MASK as usize + 1);

        // One more distinct target cannot be addressed.
        let err = mappings.encode(0x40, lower, 0x500000).unwrap_err();
        assert!(err.to_string().contains("overflow table is full"));

        // A target already in the table is still fine.
        mappings.encode(0x41, lower, 0x100001).unwrap();
    }
}

mod tests_finish {
    use super::*;

    #[test]
    fn test_finish_emits_overflow_table_and_trie() {
        let mut mappings = CaseMappings::new();
        let lower = mappings.register_column("simple_lowercase_mapping");
        mappings.encode(0x41, lower, 0x61).unwrap();
        mappings.encode(0x10400, lower, 0x20400).unwrap();

        let fragment = mappings.finish().unwrap();
        assert!(fragment.source.contains("const unichar uni_case_mappings[] = {"));
        assert!(fragment.source.contains("UNICHAR_C(0x20400)"));
        assert!(fragment
            .source
            .contains("const struct CharCaseData *uni_codepoint_casing(unichar cp)"));
        assert!(fragment.header.contains("#define CASING_DIFF 8191"));
        assert!(fragment.header.contains("extern const unichar uni_case_mappings[2];"));
        assert!(fragment
            .header
            .contains("uint16_t simple_lowercase_mapping;"));
    }
}
