use std::collections::HashMap;
use storage::{SchemaVariant, TagRecord, ARTIST_PREFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Existing(i64),
    Created(i64),
}

impl Resolution {
    pub fn id(self) -> i64 {
        match self {
            Resolution::Existing(id) | Resolution::Created(id) => id,
        }
    }
}

/// Tag name to id map plus the largest id seen, which drives allocation.
#[derive(Debug, Default)]
pub struct TagCache {
    ids: HashMap<String, i64>,
    max_id: i64,
}

impl TagCache {
    /// Duplicate names keep the first id encountered.
    pub fn from_records(records: impl IntoIterator<Item = TagRecord>) -> Self {
        let mut cache = Self::default();
        for record in records {
            cache.max_id = cache.max_id.max(record.id);
            cache.ids.entry(record.name).or_insert(record.id);
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn max_id(&self) -> i64 {
        self.max_id
    }

    /// In the hierarchical schema a prefixed artist name first matches the
    /// regrouped (stripped) tag, then the raw prefixed one.
    pub fn lookup(&self, name: &str, variant: SchemaVariant) -> Option<i64> {
        if variant == SchemaVariant::Hierarchical {
            if let Some(id) = name
                .strip_prefix(ARTIST_PREFIX)
                .and_then(|stripped| self.ids.get(stripped))
            {
                return Some(*id);
            }
        }
        self.ids.get(name).copied()
    }

    pub fn resolve_or_allocate(&mut self, name: &str, variant: SchemaVariant) -> Resolution {
        if let Some(id) = self.lookup(name, variant) {
            return Resolution::Existing(id);
        }
        let id = self.max_id + 1;
        self.ids.insert(name.to_string(), id);
        self.max_id = id;
        Resolution::Created(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: i64, name: &str) -> TagRecord {
        TagRecord {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn empty_cache_allocates_from_one() {
        let mut cache = TagCache::default();
        assert_eq!(
            cache.resolve_or_allocate("landscape", SchemaVariant::Legacy),
            Resolution::Created(1)
        );
        assert_eq!(
            cache.resolve_or_allocate("landscape", SchemaVariant::Legacy),
            Resolution::Existing(1)
        );
    }

    #[test]
    fn first_id_wins_and_allocation_exceeds_max() {
        let mut cache = TagCache::from_records(vec![tag(7, "sky"), tag(3, "sky"), tag(12, "sea")]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup("sky", SchemaVariant::Legacy), Some(7));
        assert_eq!(cache.resolve_or_allocate("cloud", SchemaVariant::Legacy).id(), 13);
        assert_eq!(cache.resolve_or_allocate("rain", SchemaVariant::Legacy).id(), 14);
        assert_eq!(cache.max_id(), 14);
    }

    #[test]
    fn hierarchical_lookup_prefers_stripped_artist_name() {
        let cache = TagCache::from_records(vec![tag(4, "Alice"), tag(9, "Artist:Bob")]);
        assert_eq!(cache.lookup("Artist:Alice", SchemaVariant::Hierarchical), Some(4));
        assert_eq!(cache.lookup("Artist:Bob", SchemaVariant::Hierarchical), Some(9));
        assert_eq!(cache.lookup("Artist:Alice", SchemaVariant::Legacy), None);
    }
}
