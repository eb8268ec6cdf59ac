use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use crate::error::Error;
use crate::features::Feature;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn native() -> Endian {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OptimizeFor {
    Speed,
    Size,
}

const MINIMUM_STACK_BUFFER_SIZE: u64 = 4;

/// The build configuration: target platform facts, the speed/size
/// trade-off, and the requested feature set.
///
/// Parsing is strict about types and lenient about vocabulary: a known
/// key with the wrong JSON type is fatal, while an unknown key or an
/// unknown enum string only warns and leaves that option unapplied.
#[derive(Clone, Debug)]
pub struct Config {
    pub endian: Endian,
    pub optimize: OptimizeFor,
    pub has_malloc: bool,
    pub character_storage: String,
    pub stack_buffer_size: u64,
    features: BTreeSet<Feature>,
    normalization_quick_check: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            endian: Endian::native(),
            optimize: OptimizeFor::Speed,
            has_malloc: true,
            character_storage: "uint32_t".to_string(),
            stack_buffer_size: 32,
            features: BTreeSet::new(),
            normalization_quick_check: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, Error> {
        let text = fs::read_to_string(path)
            .map_err(|err| format!("cannot read configuration {}: {}", path.display(), err))?;
        Config::from_str(&text)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Config, Error> {
        let data: Value =
            serde_json::from_str(text).map_err(|err| format!("malformed configuration: {}", err))?;
        let object = data
            .as_object()
            .ok_or("expected a JSON object at the top of the configuration")?;

        let version = object
            .get("version")
            .ok_or("configuration is missing 'version'")?;
        let version = version
            .as_str()
            .ok_or("expected string value for 'version'")?;
        if version_tuple(version)?.0 < 1 {
            return Err(format!("illegal configuration version: {}", version).into());
        }

        let mut config = Config::default();
        for (key, value) in object {
            match key.as_str() {
                "version" => {}
                "endian" => {
                    let value = value.as_str().ok_or("expected string value for 'endian'")?;
                    match value.to_lowercase().as_str() {
                        "little" => config.endian = Endian::Little,
                        "big" => config.endian = Endian::Big,
                        // Native byte order is already the default.
                        "native" => {}
                        _ => warn!("expected 'little' or 'big' for 'endian'"),
                    }
                }
                "optimizeFor" => {
                    let value = value
                        .as_str()
                        .ok_or("expected string value for 'optimizeFor'")?;
                    match value.to_lowercase().as_str() {
                        "speed" => config.optimize = OptimizeFor::Speed,
                        "size" => config.optimize = OptimizeFor::Size,
                        _ => warn!("expected 'speed' or 'size' for 'optimizeFor'"),
                    }
                }
                "hasStandardAllocators" => {
                    config.has_malloc = value
                        .as_bool()
                        .ok_or("expected boolean value for 'hasStandardAllocators'")?;
                }
                "characterStorage" => {
                    let value = value
                        .as_str()
                        .ok_or("expected string value for 'characterStorage'")?;
                    if value.trim().is_empty() {
                        return Err("expected string value for 'characterStorage'".into());
                    }
                    config.character_storage = value.to_string();
                }
                "stackBufferSize" => {
                    let mut size = value
                        .as_u64()
                        .filter(|&size| size >= 1)
                        .ok_or("expected a positive integer value for 'stackBufferSize'")?;
                    if size < MINIMUM_STACK_BUFFER_SIZE {
                        warn!(
                            "rounding up 'stackBufferSize' from {} to {} (the minimum)",
                            size, MINIMUM_STACK_BUFFER_SIZE
                        );
                        size = MINIMUM_STACK_BUFFER_SIZE;
                    }
                    config.stack_buffer_size = size;
                }
                "excludeCharacterBlocks" => {
                    value
                        .as_array()
                        .ok_or("expected string list for 'excludeCharacterBlocks'")?;
                    warn!("the 'excludeCharacterBlocks' configuration feature is deprecated");
                }
                "encodingForms" => {
                    for form in string_list(value, "encodingForms")? {
                        match form.to_lowercase().as_str() {
                            "utf-8" => {
                                config.features.insert(Feature::EncodingUtf8);
                            }
                            "utf-16" => {
                                config.features.insert(Feature::EncodingUtf16);
                            }
                            "utf-32" => {
                                config.features.insert(Feature::EncodingUtf32);
                            }
                            _ => warn!(
                                "expected 'utf-8' or 'utf-16' or 'utf-32' for 'encodingForms'"
                            ),
                        }
                    }
                }
                "characterProperties" => {
                    for name in string_list(value, "characterProperties")? {
                        match character_property(name) {
                            Some(feature) => {
                                config.features.insert(feature);
                            }
                            None => warn!("ignoring unknown character property: {}", name),
                        }
                    }
                }
                "algorithms" => parse_algorithms(&mut config, value)?,
                _ => warn!("ignoring unknown feature: {}", key),
            }
        }
        Ok(config)
    }

    pub fn character_storage_bytes(&self) -> usize {
        // e.g. "int64_t"; otherwise assume a 32-bit integer.
        if self.character_storage.contains("64") {
            8
        } else {
            4
        }
    }

    /// The feature set this configuration requests, before dependency
    /// resolution. Quick check only applies to normalization forms that
    /// are themselves requested.
    pub fn requested_features(&self) -> BTreeSet<Feature> {
        let mut features = self.features.clone();
        if self.normalization_quick_check {
            if self.features.contains(&Feature::CanonicalComposition) {
                features.insert(Feature::NfcQuickCheck);
            }
            if self.features.contains(&Feature::CanonicalDecomposition) {
                features.insert(Feature::NfdQuickCheck);
            }
        }
        features
    }
}

fn parse_algorithms(config: &mut Config, algorithms: &Value) -> Result<(), Error> {
    let object = algorithms
        .as_object()
        .ok_or("expected object for 'algorithms'")?;

    for (key, value) in object {
        match key.as_str() {
            "normalization" => {
                for form in string_list(value, "normalization")? {
                    match form.to_lowercase().as_str() {
                        "nfc" => {
                            config.features.insert(Feature::CanonicalComposition);
                        }
                        "nfd" => {
                            config.features.insert(Feature::CanonicalDecomposition);
                        }
                        _ => warn!("ignoring unknown normalization form: {}", form),
                    }
                }
            }
            "normalizationQuickCheck" => {
                config.normalization_quick_check = value
                    .as_bool()
                    .ok_or("expected boolean value for 'normalizationQuickCheck'")?;
            }
            "caseConversion" => {
                for casing in string_list(value, "caseConversion")? {
                    match casing.to_lowercase().as_str() {
                        "lower" => {
                            config.features.insert(Feature::LowercaseConversion);
                        }
                        "upper" => {
                            config.features.insert(Feature::UppercaseConversion);
                        }
                        "title" => {
                            config.features.insert(Feature::TitlecaseConversion);
                        }
                        _ => warn!("ignoring unknown case conversion target: {}", casing),
                    }
                }
            }
            "caseFolding" => {
                for casing in string_list(value, "caseFolding")? {
                    match casing.to_lowercase().as_str() {
                        "default" => {
                            config.features.insert(Feature::DefaultCaseFolding);
                        }
                        "canonical" => {
                            config.features.insert(Feature::CanonicalCaseFolding);
                        }
                        _ => warn!("ignoring unknown case fold target: {}", casing),
                    }
                }
            }
            "segmentation" => {
                for form in string_list(value, "segmentation")? {
                    match form.to_lowercase().as_str() {
                        "grapheme" => {
                            config.features.insert(Feature::GraphemeBreak);
                        }
                        "word" => {
                            config.features.insert(Feature::WordBreak);
                        }
                        "sentence" => {
                            config.features.insert(Feature::SentenceBreak);
                        }
                        _ => warn!("ignoring unknown segmentation form: {}", form),
                    }
                }
            }
            "compression" => {
                if value
                    .as_bool()
                    .ok_or("expected boolean value for 'compression'")?
                {
                    config.features.insert(Feature::Compression);
                }
            }
            "collation" => {
                if value
                    .as_bool()
                    .ok_or("expected boolean value for 'collation'")?
                {
                    config.features.insert(Feature::Collation);
                }
            }
            _ => warn!("ignoring unknown algorithm: {}", key),
        }
    }
    Ok(())
}

fn string_list<'a>(value: &'a Value, key: &str) -> Result<Vec<&'a str>, Error> {
    let list = value
        .as_array()
        .ok_or_else(|| format!("expected string list for '{}'", key))?;
    list.iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| format!("expected string list for '{}'", key).into())
        })
        .collect()
}

fn version_tuple(version: &str) -> Result<(u32, u32), Error> {
    let mut digits = Vec::new();
    for point in version.split('.') {
        let digit: u32 = point
            .parse()
            .map_err(|_| format!("illegal configuration version: {}", version))?;
        digits.push(digit);
    }
    while digits.len() < 2 {
        digits.push(0);
    }
    Ok((digits[0], digits[1]))
}

/// Maps a configured character-property name to its feature using the
/// loose matching rules of UAX #44: case, whitespace, hyphens,
/// underscores, and a leading "is" are not significant.
fn character_property(name: &str) -> Option<Feature> {
    match loose_name(name).as_str() {
        "alphabetic" => Some(Feature::Alphabetic),
        "canonicalcombiningclass" => Some(Feature::CanonicalCombiningClass),
        "dash" => Some(Feature::Dash),
        "diacritic" => Some(Feature::Diacritic),
        "extender" => Some(Feature::Extender),
        "generalcategory" => Some(Feature::GeneralCategory),
        "hexdigit" => Some(Feature::HexDigit),
        "ideographic" => Some(Feature::Ideographic),
        "lowercase" => Some(Feature::Lowercase),
        "math" => Some(Feature::Math),
        "noncharactercodepoint" => Some(Feature::NoncharacterCodePoint),
        "numericvalue" => Some(Feature::NumericValue),
        "quotationmark" => Some(Feature::QuotationMark),
        "simplelowercasemapping" => Some(Feature::SimpleLowercaseMapping),
        "simpleuppercasemapping" => Some(Feature::SimpleUppercaseMapping),
        "simpletitlecasemapping" => Some(Feature::SimpleTitlecaseMapping),
        "terminalpunctuation" => Some(Feature::TerminalPunctuation),
        "unifiedideograph" => Some(Feature::UnifiedIdeograph),
        "uppercase" => Some(Feature::Uppercase),
        "whitespace" => Some(Feature::WhiteSpace),
        _ => None,
    }
}

fn loose_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = lowered.strip_prefix("is").unwrap_or(&lowered);
    stripped
        .chars()
        .filter(|c| !matches!(c, '_' | ' ' | '-'))
        .collect()
}
