use std::collections::HashMap;

/// Per-entity cache of the aggregate record.
///
/// Loaded at most once per entity instance, on the first aggregate read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum HashCache {
    #[default]
    NotLoaded,
    /// Loaded, and the store held no record.
    LoadedEmpty,
    /// Loaded: member name to raw stored value.
    Loaded(HashMap<String, String>),
}

impl HashCache {
    pub fn is_loaded(&self) -> bool {
        !matches!(self, HashCache::NotLoaded)
    }

    /// Raw value of a member. `None` if absent or not loaded.
    pub fn member(&self, name: &str) -> Option<&str> {
        match self {
            HashCache::Loaded(map) => map.get(name).map(String::as_str),
            _ => None,
        }
    }
}

/// Whether the entity's aggregate record exists in the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Existence {
    /// Not checked yet, or invalidated.
    #[default]
    Unknown,
    Present,
    Absent,
}

impl From<bool> for Existence {
    fn from(exists: bool) -> Self {
        if exists {
            Existence::Present
        } else {
            Existence::Absent
        }
    }
}

/// Aggregate-record state shared by every hash field of one entity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct HashState {
    pub(crate) cache: HashCache,
    pub(crate) existence: Existence,
}

impl HashState {
    /// Store the result of a full-record fetch.
    pub(crate) fn fill(&mut self, record: HashMap<String, String>) {
        if record.is_empty() {
            self.cache = HashCache::LoadedEmpty;
            self.existence = Existence::Absent;
        } else {
            self.cache = HashCache::Loaded(record);
            self.existence = Existence::Present;
        }
    }

    /// A member was written. The cache is updated only if already loaded.
    pub(crate) fn record_write(&mut self, name: &str, raw: String) {
        match &mut self.cache {
            HashCache::NotLoaded => {}
            HashCache::LoadedEmpty => {
                self.cache = HashCache::Loaded(HashMap::from([(name.to_string(), raw)]));
            }
            HashCache::Loaded(map) => {
                map.insert(name.to_string(), raw);
            }
        }
        self.existence = Existence::Present;
    }

    /// A member was deleted. Other members may remain, so existence goes
    /// back to unknown.
    pub(crate) fn evict(&mut self, name: &str) {
        if let HashCache::Loaded(map) = &mut self.cache {
            map.remove(name);
            if map.is_empty() {
                self.cache = HashCache::LoadedEmpty;
            }
        }
        self.existence = Existence::Unknown;
    }

    /// The whole record was deleted.
    pub(crate) fn mark_removed(&mut self) {
        self.cache = HashCache::LoadedEmpty;
        self.existence = Existence::Absent;
    }

    pub(crate) fn invalidate(&mut self) {
        *self = Self::default();
    }
}
