use crate::settings::MINIMUM_STRING_TABLE_CAPACITY;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A unique identifier for an interned string, represented as a u32 for memory efficiency.
/// Function and local names in the IR are always stored as StringIds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringId(u32);

impl StringId {
    /// Convert the StringId to its underlying u32 value
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Create a StringId from a u32 value (used when rebuilding a table from a module file)
    #[inline]
    pub fn from_u32(id: u32) -> Self {
        Self(id)
    }

    /// Resolve this interned string using the provided StringTable.
    #[inline]
    pub fn resolve(self, table: &StringTable) -> &str {
        table.resolve(self)
    }
}

impl std::fmt::Display for StringId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StringId({})", self.0)
    }
}

/// A centralized string interning table storing each unique name exactly once.
///
/// IDs are handed out sequentially, so a table can be reconstructed from an
/// ordered dump of its strings (this is how module files carry names).
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    /// Primary storage: ID → string mapping for O(1) resolution
    strings: Vec<Box<str>>,

    /// Reverse lookup for fast interning.
    /// FxHashMap is noticeably faster than the default hasher for short name keys.
    string_to_id: FxHashMap<Box<str>, StringId>,
}

impl StringTable {
    pub fn new() -> Self {
        Self {
            strings: Vec::with_capacity(MINIMUM_STRING_TABLE_CAPACITY),
            string_to_id: FxHashMap::default(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            strings: Vec::with_capacity(capacity + MINIMUM_STRING_TABLE_CAPACITY),
            string_to_id: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Intern a string slice, returning its unique ID.
    /// Existing strings return their existing ID without allocating.
    #[inline]
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&existing_id) = self.string_to_id.get(s) {
            return existing_id;
        }

        self.intern_new(s.into())
    }

    /// Intern an owned String, avoiding a copy when the string is new.
    #[inline]
    pub fn get_or_intern(&mut self, s: String) -> StringId {
        if let Some(&existing_id) = self.string_to_id.get(s.as_str()) {
            return existing_id;
        }

        self.intern_new(s.into_boxed_str())
    }

    #[cold]
    #[inline(never)]
    fn intern_new(&mut self, boxed: Box<str>) -> StringId {
        let new_id = StringId(self.strings.len() as u32);
        self.string_to_id.insert(boxed.clone(), new_id);
        self.strings.push(boxed);
        new_id
    }

    /// Resolve an interned ID back to its string content.
    ///
    /// Panics on an ID this table never produced; IDs deserialized from
    /// module files go through the validator before reaching this.
    #[inline]
    pub fn resolve(&self, id: StringId) -> &str {
        self.strings[id.0 as usize].as_ref()
    }

    /// Resolve without panicking, for validation of untrusted module files.
    #[inline]
    pub fn try_resolve(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.0 as usize).map(|s| s.as_ref())
    }

    /// Check whether a string is already interned without interning it.
    #[inline]
    pub fn get_existing(&self, s: &str) -> Option<StringId> {
        self.string_to_id.get(s).copied()
    }

    /// All interned strings in ID order, for serializing a module file.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|s| s.as_ref())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
