mod binary;
mod casemap;
mod category;
mod normalize;
mod segment;


use std::collections::{BTreeSet, HashMap};

use crate::bundle::Bundle;
use crate::casing::CaseMappings;
use crate::codespace::Codespace;
use crate::config::Config;
use crate::emit::Fragment;
use crate::error::Error;

pub use binary::{
    BINARY_ALPHABETIC, BINARY_DASH, BINARY_DIACRITIC, BINARY_EXTENDER, BINARY_HEX_DIGIT,
    BINARY_IDEOGRAPHIC, BINARY_LOWERCASE, BINARY_MATH, BINARY_NONCHARACTER_CODE_POINT,
    BINARY_QUOTATION_MARK, BINARY_TERMINAL_PUNCTUATION, BINARY_UNIFIED_IDEOGRAPH,
    BINARY_UPPERCASE, BINARY_WHITE_SPACE,
};

/// Character flags accumulated on the shared `flags` column. The bit for
/// each flag matches what the runtime's case-conversion and
/// normalization code tests.
pub const IS_COMPOSABLE: u32 = 0x1;
pub const IS_CASED: u32 = 0x2;
pub const IS_CASE_IGNORABLE: u32 = 0x4;
pub const IS_NORMALIZATION_NEEDED: u32 = 0x8;
pub const IS_CHANGES_WHEN_CASEFOLDED: u32 = 0x10;

/// Name, default, and width of the shared flags column. Several features
/// register it; registration is idempotent so the first wins and the rest
/// reuse it.
pub const FLAGS_PROPERTY: &str = "flags";

/// Per-run state shared by the features across all three phases, beyond
/// the main codespace itself: the casing store (finalized jointly by
/// `CaseMappingTable` once all three directions are in) and the largest
/// segmentation state-machine size seen so far.
#[derive(Default)]
pub struct Context {
    pub casing: CaseMappings,
    pub max_break_states: u32,
}

/// One build unit. Variants marked (internal) are not requestable from
/// the configuration; they exist as shared prerequisites so that a
/// column or fragment several features need is produced exactly once.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Feature {
    Alphabetic,
    /// (internal) Shared bit-flags column for the binary properties.
    BinaryProperties,
    CanonicalCaseFolding,
    CanonicalCombiningClass,
    CanonicalComposition,
    CanonicalDecomposition,
    /// (internal) Joint emission of the three case-mapping columns.
    CaseMappingTable,
    Collation,
    Compression,
    Dash,
    DefaultCaseFolding,
    Diacritic,
    EncodingUtf16,
    EncodingUtf32,
    EncodingUtf8,
    Extender,
    GeneralCategory,
    GraphemeBreak,
    HexDigit,
    Ideographic,
    Lowercase,
    LowercaseConversion,
    Math,
    NfcQuickCheck,
    NfdQuickCheck,
    NoncharacterCodePoint,
    NumericValue,
    QuotationMark,
    /// (internal) Shared break state-machine driver.
    Segmentation,
    SentenceBreak,
    SimpleLowercaseMapping,
    SimpleTitlecaseMapping,
    SimpleUppercaseMapping,
    /// (internal) Shared flags column and full special-case mappings.
    SpecialCasing,
    TerminalPunctuation,
    TitlecaseConversion,
    UnifiedIdeograph,
    Uppercase,
    UppercaseConversion,
    WhiteSpace,
    WordBreak,
}

pub const ALL_FEATURES: &[Feature] = &[
    Feature::Alphabetic,
    Feature::BinaryProperties,
    Feature::CanonicalCaseFolding,
    Feature::CanonicalCombiningClass,
    Feature::CanonicalComposition,
    Feature::CanonicalDecomposition,
    Feature::CaseMappingTable,
    Feature::Collation,
    Feature::Compression,
    Feature::Dash,
    Feature::DefaultCaseFolding,
    Feature::Diacritic,
    Feature::EncodingUtf16,
    Feature::EncodingUtf32,
    Feature::EncodingUtf8,
    Feature::Extender,
    Feature::GeneralCategory,
    Feature::GraphemeBreak,
    Feature::HexDigit,
    Feature::Ideographic,
    Feature::Lowercase,
    Feature::LowercaseConversion,
    Feature::Math,
    Feature::NfcQuickCheck,
    Feature::NfdQuickCheck,
    Feature::NoncharacterCodePoint,
    Feature::NumericValue,
    Feature::QuotationMark,
    Feature::Segmentation,
    Feature::SentenceBreak,
    Feature::SimpleLowercaseMapping,
    Feature::SimpleTitlecaseMapping,
    Feature::SimpleUppercaseMapping,
    Feature::SpecialCasing,
    Feature::TerminalPunctuation,
    Feature::TitlecaseConversion,
    Feature::UnifiedIdeograph,
    Feature::Uppercase,
    Feature::UppercaseConversion,
    Feature::WhiteSpace,
    Feature::WordBreak,
];

impl Feature {
    /// The stable identity. Doubles as the deterministic sort key for
    /// the processing order, so the emitted tables and markers are
    /// byte-identical across runs.
    pub fn name(self) -> &'static str {
        match self {
            Feature::Alphabetic => "Alphabetic",
            Feature::BinaryProperties => "BinaryProperties",
            Feature::CanonicalCaseFolding => "CanonicalCaseFolding",
            Feature::CanonicalCombiningClass => "CanonicalCombiningClass",
            Feature::CanonicalComposition => "CanonicalComposition",
            Feature::CanonicalDecomposition => "CanonicalDecomposition",
            Feature::CaseMappingTable => "CaseMappingTable",
            Feature::Collation => "Collation",
            Feature::Compression => "Compression",
            Feature::Dash => "Dash",
            Feature::DefaultCaseFolding => "DefaultCaseFolding",
            Feature::Diacritic => "Diacritic",
            Feature::EncodingUtf16 => "EncodingUtf16",
            Feature::EncodingUtf32 => "EncodingUtf32",
            Feature::EncodingUtf8 => "EncodingUtf8",
            Feature::Extender => "Extender",
            Feature::GeneralCategory => "GeneralCategory",
            Feature::GraphemeBreak => "GraphemeBreak",
            Feature::HexDigit => "HexDigit",
            Feature::Ideographic => "Ideographic",
            Feature::Lowercase => "Lowercase",
            Feature::LowercaseConversion => "LowercaseConversion",
            Feature::Math => "Math",
            Feature::NfcQuickCheck => "NfcQuickCheck",
            Feature::NfdQuickCheck => "NfdQuickCheck",
            Feature::NoncharacterCodePoint => "NoncharacterCodePoint",
            Feature::NumericValue => "NumericValue",
            Feature::QuotationMark => "QuotationMark",
            Feature::Segmentation => "Segmentation",
            Feature::SentenceBreak => "SentenceBreak",
            Feature::SimpleLowercaseMapping => "SimpleLowercaseMapping",
            Feature::SimpleTitlecaseMapping => "SimpleTitlecaseMapping",
            Feature::SimpleUppercaseMapping => "SimpleUppercaseMapping",
            Feature::SpecialCasing => "SpecialCasing",
            Feature::TerminalPunctuation => "TerminalPunctuation",
            Feature::TitlecaseConversion => "TitlecaseConversion",
            Feature::UnifiedIdeograph => "UnifiedIdeograph",
            Feature::Uppercase => "Uppercase",
            Feature::UppercaseConversion => "UppercaseConversion",
            Feature::WhiteSpace => "WhiteSpace",
            Feature::WordBreak => "WordBreak",
        }
    }

    /// Looks a feature up by its identity. Unknown identities are a
    /// configuration error.
    pub fn from_name(name: &str) -> Result<Feature, Error> {
        ALL_FEATURES
            .iter()
            .copied()
            .find(|feature| feature.name() == name)
            .ok_or_else(|| format!("unknown feature: {}", name).into())
    }

    /// Declared prerequisites. The engine includes these transitively
    /// whenever the feature is requested.
    pub fn dependencies(self) -> &'static [Feature] {
        match self {
            Feature::Alphabetic
            | Feature::Dash
            | Feature::Diacritic
            | Feature::Extender
            | Feature::HexDigit
            | Feature::Ideographic
            | Feature::Lowercase
            | Feature::Math
            | Feature::NoncharacterCodePoint
            | Feature::QuotationMark
            | Feature::TerminalPunctuation
            | Feature::UnifiedIdeograph
            | Feature::Uppercase
            | Feature::WhiteSpace => &[Feature::BinaryProperties],
            Feature::CanonicalCaseFolding => {
                &[Feature::DefaultCaseFolding, Feature::CanonicalDecomposition]
            }
            Feature::CanonicalComposition => &[Feature::CanonicalDecomposition],
            Feature::CanonicalDecomposition => {
                &[Feature::CanonicalCombiningClass, Feature::EncodingUtf8]
            }
            Feature::Collation => &[Feature::CanonicalDecomposition],
            Feature::GraphemeBreak | Feature::SentenceBreak | Feature::WordBreak => {
                &[Feature::Segmentation]
            }
            Feature::LowercaseConversion => {
                &[Feature::SimpleLowercaseMapping, Feature::SpecialCasing]
            }
            Feature::NfcQuickCheck | Feature::NfdQuickCheck => {
                &[Feature::CanonicalCombiningClass]
            }
            Feature::SimpleLowercaseMapping
            | Feature::SimpleTitlecaseMapping
            | Feature::SimpleUppercaseMapping => &[Feature::CaseMappingTable],
            Feature::TitlecaseConversion => &[
                Feature::SimpleTitlecaseMapping,
                Feature::WordBreak,
                Feature::CanonicalCombiningClass,
                Feature::LowercaseConversion,
            ],
            Feature::UppercaseConversion => {
                &[Feature::SimpleUppercaseMapping, Feature::SpecialCasing]
            }
            _ => &[],
        }
    }

    /// Phase 1: register this feature's property columns. Shared columns
    /// rely on registration being idempotent.
    fn register(self, space: &mut Codespace, ctx: &mut Context) {
        match self {
            Feature::BinaryProperties => binary::register(space),
            Feature::CanonicalCombiningClass => category::register_ccc(space),
            Feature::CanonicalComposition => normalize::register_composition(space),
            Feature::CanonicalDecomposition => normalize::register_decomposition(space),
            Feature::Collation => category::register_collation(space),
            Feature::DefaultCaseFolding => casemap::register_case_folding(space),
            Feature::GeneralCategory => category::register_general_category(space),
            Feature::GraphemeBreak => segment::register_grapheme_break(space),
            Feature::NfcQuickCheck | Feature::NfdQuickCheck => {
                normalize::register_quick_check(space)
            }
            Feature::NumericValue => category::register_numeric_value(space),
            Feature::SentenceBreak => segment::register_sentence_break(space),
            Feature::SimpleLowercaseMapping => {
                ctx.casing.register_column("simple_lowercase_mapping");
            }
            Feature::SimpleTitlecaseMapping => {
                ctx.casing.register_column("simple_titlecase_mapping");
            }
            Feature::SimpleUppercaseMapping => {
                ctx.casing.register_column("simple_uppercase_mapping");
            }
            Feature::SpecialCasing => casemap::register_special_casing(space),
            Feature::WordBreak => segment::register_word_break(space),
            _ => {}
        }
    }

    /// Phase 2: read this feature's data documents and populate its
    /// columns. Returns the feature's own text fragment.
    fn ingest(
        self,
        bundle: &mut Bundle,
        space: &mut Codespace,
        ctx: &mut Context,
        config: &Config,
    ) -> Result<Fragment, Error> {
        match self {
            Feature::Alphabetic => binary::ingest(
                bundle,
                space,
                "isAlphabetic",
                BINARY_ALPHABETIC,
                "UNI_FEATURE_ALPHABETIC",
            ),
            Feature::BinaryProperties => Ok(Fragment::marker("UNI_FEATURE_BINARY_PROPERTIES")),
            Feature::CanonicalCaseFolding => Ok(Fragment::marker("UNI_FEATURE_CASEFOLD_CANONICAL")),
            Feature::CanonicalCombiningClass => category::ingest_ccc(bundle, space),
            Feature::CanonicalComposition => normalize::ingest_composition(bundle, space),
            Feature::CanonicalDecomposition => {
                normalize::ingest_decomposition(bundle, space, config)
            }
            Feature::Collation => category::ingest_collation(bundle, space),
            Feature::Compression => Ok(Fragment::marker("UNI_FEATURE_COMPRESSION")),
            Feature::Dash => binary::ingest(
                bundle,
                space,
                "isDash",
                BINARY_DASH,
                "UNI_FEATURE_DASH",
            ),
            Feature::DefaultCaseFolding => casemap::ingest_case_folding(bundle, space),
            Feature::Diacritic => binary::ingest(
                bundle,
                space,
                "isDiacritic",
                BINARY_DIACRITIC,
                "UNI_FEATURE_DIACRITIC",
            ),
            Feature::EncodingUtf16 => Ok(Fragment::marker("UNI_FEATURE_ENCODING_UTF16")),
            Feature::EncodingUtf32 => Ok(Fragment::marker("UNI_FEATURE_ENCODING_UTF32")),
            Feature::EncodingUtf8 => Ok(Fragment::marker("UNI_FEATURE_ENCODING_UTF8")),
            Feature::Extender => binary::ingest(
                bundle,
                space,
                "isExtender",
                BINARY_EXTENDER,
                "UNI_FEATURE_EXTENDER",
            ),
            Feature::GeneralCategory => category::ingest_general_category(bundle, space),
            Feature::GraphemeBreak => segment::ingest_grapheme_break(bundle, space, ctx),
            Feature::HexDigit => binary::ingest(
                bundle,
                space,
                "isHexDigit",
                BINARY_HEX_DIGIT,
                "UNI_FEATURE_HEX_DIGIT",
            ),
            Feature::Ideographic => binary::ingest(
                bundle,
                space,
                "isIdeographic",
                BINARY_IDEOGRAPHIC,
                "UNI_FEATURE_IDEOGRAPHIC",
            ),
            Feature::Lowercase => binary::ingest(
                bundle,
                space,
                "isLowercase",
                BINARY_LOWERCASE,
                "UNI_FEATURE_LOWERCASE",
            ),
            Feature::LowercaseConversion => Ok(Fragment::marker("UNI_FEATURE_LOWERCASE_CONVERT")),
            Feature::Math => binary::ingest(
                bundle,
                space,
                "isMath",
                BINARY_MATH,
                "UNI_FEATURE_MATH",
            ),
            Feature::NfcQuickCheck => normalize::ingest_nfc_quick_check(bundle, space),
            Feature::NfdQuickCheck => normalize::ingest_nfd_quick_check(bundle, space),
            Feature::NoncharacterCodePoint => binary::ingest(
                bundle,
                space,
                "isNoncharacterCodePoint",
                BINARY_NONCHARACTER_CODE_POINT,
                "UNI_FEATURE_NONCHARACTER_CODE_POINT",
            ),
            Feature::NumericValue => category::ingest_numeric_value(bundle, space),
            Feature::QuotationMark => binary::ingest(
                bundle,
                space,
                "isQuotationMark",
                BINARY_QUOTATION_MARK,
                "UNI_FEATURE_QUOTATION_MARK",
            ),
            Feature::SentenceBreak => segment::ingest_sentence_break(bundle, space, ctx),
            Feature::SimpleLowercaseMapping => casemap::ingest_simple_mapping(
                bundle,
                ctx,
                "lowercase",
                "simple_lowercase_mapping",
                "UNI_FEATURE_SIMPLE_LOWERCASE_MAPPINGS",
            ),
            Feature::SimpleTitlecaseMapping => casemap::ingest_simple_mapping(
                bundle,
                ctx,
                "titlecase",
                "simple_titlecase_mapping",
                "UNI_FEATURE_SIMPLE_TITLECASE_MAPPINGS",
            ),
            Feature::SimpleUppercaseMapping => casemap::ingest_simple_mapping(
                bundle,
                ctx,
                "uppercase",
                "simple_uppercase_mapping",
                "UNI_FEATURE_SIMPLE_UPPERCASE_MAPPINGS",
            ),
            Feature::SpecialCasing => casemap::ingest_special_casing(bundle, space),
            Feature::TerminalPunctuation => binary::ingest(
                bundle,
                space,
                "isTerminalPunctuation",
                BINARY_TERMINAL_PUNCTUATION,
                "UNI_FEATURE_TERMINAL_PUNCTUATION",
            ),
            Feature::TitlecaseConversion => Ok(Fragment::marker("UNI_FEATURE_TITLECASE_CONVERT")),
            Feature::UnifiedIdeograph => binary::ingest(
                bundle,
                space,
                "isUnifiedIdeograph",
                BINARY_UNIFIED_IDEOGRAPH,
                "UNI_FEATURE_UNIFIED_IDEOGRAPH",
            ),
            Feature::Uppercase => binary::ingest(
                bundle,
                space,
                "isUppercase",
                BINARY_UPPERCASE,
                "UNI_FEATURE_UPPERCASE",
            ),
            Feature::UppercaseConversion => Ok(Fragment::marker("UNI_FEATURE_UPPERCASE_CONVERT")),
            Feature::WhiteSpace => binary::ingest(
                bundle,
                space,
                "isWhiteSpace",
                BINARY_WHITE_SPACE,
                "UNI_FEATURE_WHITE_SPACE",
            ),
            Feature::WordBreak => segment::ingest_word_break(bundle, space, ctx),
            Feature::CaseMappingTable | Feature::Segmentation => Ok(Fragment::default()),
        }
    }

    /// Phase 3: work that needs the complete state written by every
    /// sibling in phase 2 — joint casing emission and the global break
    /// state count.
    fn finish(
        self,
        bundle: &mut Bundle,
        _space: &mut Codespace,
        ctx: &mut Context,
        _config: &Config,
    ) -> Result<Fragment, Error> {
        match self {
            Feature::CaseMappingTable => {
                let casing = std::mem::take(&mut ctx.casing);
                casing.finish()
            }
            Feature::Segmentation => segment::finish(bundle, ctx),
            _ => Ok(Fragment::default()),
        }
    }
}

/// Computes the transitive closure of the requested features and fixes
/// the deterministic processing order (lexicographic by name). The
/// closure is a repeated union with every member's dependencies until no
/// new feature appears, so multi-level prerequisite chains resolve fully.
pub fn resolve(requested: &BTreeSet<Feature>) -> Result<Vec<Feature>, Error> {
    let mut closure = requested.clone();
    loop {
        let mut next = closure.clone();
        for feature in &closure {
            next.extend(feature.dependencies().iter().copied());
        }
        if next.len() == closure.len() {
            break;
        }
        closure = next;
    }

    for &feature in &closure {
        check_cycles(feature, &mut HashMap::new())?;
    }

    let mut order: Vec<Feature> = closure.into_iter().collect();
    order.sort_by_key(|feature| feature.name());
    Ok(order)
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

fn check_cycles(feature: Feature, marks: &mut HashMap<Feature, Mark>) -> Result<(), Error> {
    match marks.get(&feature) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            return Err(format!("feature dependency cycle involving {}", feature.name()).into())
        }
        None => {}
    }
    marks.insert(feature, Mark::InProgress);
    for &dependency in feature.dependencies() {
        check_cycles(dependency, marks)?;
    }
    marks.insert(feature, Mark::Done);
    Ok(())
}

/// Size contribution of one feature, for the verbose report.
#[derive(Debug)]
pub struct FeatureSize {
    pub name: &'static str,
    pub size: usize,
}

/// Drives the resolved feature list through the three phases. Each phase
/// completes for every feature before the next phase starts for any,
/// which is the only ordering guarantee the features rely on: phase n+1
/// may observe everything phase n wrote, and nothing of its own phase's
/// siblings.
pub fn run(
    features: &[Feature],
    bundle: &mut Bundle,
    config: &Config,
    space: &mut Codespace,
    ctx: &mut Context,
) -> Result<(Fragment, Vec<FeatureSize>), Error> {
    for &feature in features {
        feature.register(space, ctx);
    }

    let mut out = Fragment::default();
    let mut sizes: Vec<FeatureSize> = features
        .iter()
        .map(|feature| FeatureSize {
            name: feature.name(),
            size: 0,
        })
        .collect();

    for (index, &feature) in features.iter().enumerate() {
        let fragment = feature.ingest(bundle, space, ctx, config)?;
        sizes[index].size += fragment.size;
        append_fragment(&mut out, fragment);
    }

    for (index, &feature) in features.iter().enumerate() {
        let fragment = feature.finish(bundle, space, ctx, config)?;
        sizes[index].size += fragment.size;
        append_fragment(&mut out, fragment);
    }

    Ok((out, sizes))
}

fn append_fragment(out: &mut Fragment, fragment: Fragment) {
    out.source.push_str(&fragment.source);
    out.source.push('\n');
    out.header.push_str(&fragment.header);
    out.header.push('\n');
    out.public_header.push_str(&fragment.public_header);
    out.size += fragment.size;
}
