
use std::collections::{BTreeMap, HashMap};

pub type Codepoint = u32;
pub type PropertyId = usize;

/// Defined by the Unicode Consortium.
pub const MAX_CODEPOINTS: u32 = 0x110000;

/// Storage width of a property column in the emitted struct.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum StorageWidth {
    Uint8 = 8,
    Uint16 = 16,
    Uint32 = 32,
}

impl StorageWidth {
    pub fn byte_size(self) -> usize {
        self as usize / 8
    }

    pub fn c_type(self) -> &'static str {
        match self {
            StorageWidth::Uint8 => "uint8_t",
            StorageWidth::Uint16 => "uint16_t",
            StorageWidth::Uint32 => "uint32_t",
        }
    }
}

/// A named per-codepoint attribute. The `id` indexes into every
/// [`Record`] and is assigned at first registration.
#[derive(Clone, Debug)]
pub struct Property {
    pub id: PropertyId,
    pub name: String,
    pub default_value: u32,
    pub width: StorageWidth,
}

/// The full tuple of property values for one codepoint, indexed by
/// property id. Records are compared and hashed by value so they can be
/// deduplicated when the tables are built.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Record(Vec<u32>);

impl Record {
    pub fn get(&self, property: PropertyId) -> u32 {
        self.0[property]
    }

    pub fn values(&self) -> &[u32] {
        &self.0
    }
}

/// Sparse store of per-codepoint property values.
///
/// Codepoints without an explicit row resolve to each property's default
/// value. The default is live: a property registered after a row was
/// created still contributes its default to that row, which
/// `row_mut` maintains by padding short rows on write and
/// [`Codespace::record`] maintains on read.
#[derive(Default)]
pub struct Codespace {
    properties: Vec<Property>,
    index: HashMap<String, PropertyId>,
    rows: BTreeMap<Codepoint, Record>,
    default_record: Option<Record>,
}

impl Codespace {
    pub fn new() -> Codespace {
        Codespace::default()
    }

    /// Registers a property and returns its id. Idempotent: registering
    /// an existing name returns the existing id and leaves its default
    /// and width untouched.
    pub fn register(&mut self, name: &str, default_value: u32, width: StorageWidth) -> PropertyId {
        assert!(
            self.default_record.is_none(),
            "property registered after codespace was finalized: {}",
            name
        );
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.properties.len();
        self.properties.push(Property {
            id,
            name: name.to_string(),
            default_value,
            width,
        });
        self.index.insert(name.to_string(), id);
        id
    }

    /// Looks up a registered property by name. Unregistered names are a
    /// programming error: registration for every feature completes before
    /// any feature ingests data.
    pub fn id(&self, name: &str) -> PropertyId {
        match self.index.get(name) {
            Some(&id) => id,
            None => panic!("property is not registered: {}", name),
        }
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Overwrites a property value for a codepoint.
    pub fn set(&mut self, cp: Codepoint, property: PropertyId, value: u32) {
        self.row_mut(cp).0[property] = value;
    }

    /// ORs bits into a property value. Used for flag columns shared by
    /// several features, where each contributes independent bits.
    pub fn set_bitwise(&mut self, cp: Codepoint, property: PropertyId, bits: u32) {
        self.row_mut(cp).0[property] |= bits;
    }

    /// Freezes the default record from the current property list. Must be
    /// called exactly once, after every feature has finished writing and
    /// before the tables are built.
    pub fn finalize(&mut self) {
        assert!(
            self.default_record.is_none(),
            "codespace finalized more than once"
        );
        let defaults = self.properties.iter().map(|p| p.default_value).collect();
        self.default_record = Some(Record(defaults));
    }

    pub fn is_finalized(&self) -> bool {
        self.default_record.is_some()
    }

    pub fn default_record(&self) -> &Record {
        self.default_record
            .as_ref()
            .expect("codespace is not finalized")
    }

    /// Resolves the full record for a codepoint: its explicit row, padded
    /// with defaults for any later-registered properties, or the default
    /// record when the codepoint was never written.
    pub fn record(&self, cp: Codepoint) -> Record {
        let default = self.default_record();
        match self.rows.get(&cp) {
            Some(row) => {
                let mut record = row.clone();
                record
                    .0
                    .extend_from_slice(&default.0[record.0.len()..]);
                record
            }
            None => default.clone(),
        }
    }

    /// Explicit rows in ascending codepoint order.
    pub fn rows(&self) -> impl Iterator<Item = (Codepoint, &Record)> {
        self.rows.iter().map(|(&cp, record)| (cp, record))
    }

    fn row_mut(&mut self, cp: Codepoint) -> &mut Record {
        assert!(
            self.default_record.is_none(),
            "codepoint U+{:04X} modified after codespace was finalized",
            cp
        );
        assert!(cp < MAX_CODEPOINTS, "codepoint out of range: {:#x}", cp);
        let properties = &self.properties;
        let row = self.rows.entry(cp).or_insert_with(|| {
            Record(properties.iter().map(|p| p.default_value).collect())
        });
        // Rows created before a later registration are shorter than the
        // current property list; top them up with the new defaults.
        for property in &properties[row.0.len()..] {
            row.0.push(property.default_value);
        }
        row
    }
}
