use serde::Serialize;
use storage::{AssetStore, StoreError, TagRecord, ARTIST_PREFIX};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegroupReport {
    pub parent_id: i64,
    pub regrouped: u64,
}

/// Moves every ungrouped `Artist:` tag under the shared parent and strips
/// the prefix from its name. Hierarchical stores only.
pub async fn regroup_artist_tags(store: &dyn AssetStore) -> Result<RegroupReport, StoreError> {
    let parent_id = store.get_or_create_artist_parent_tag().await?;
    let ungrouped = store.list_ungrouped_artist_subtags().await?;
    if ungrouped.is_empty() {
        info!(parent_id, "no ungrouped artist tags");
        return Ok(RegroupReport {
            parent_id,
            regrouped: 0,
        });
    }

    let renamed: Vec<TagRecord> = ungrouped.into_iter().map(strip_artist_prefix).collect();
    let regrouped = store.regroup_artist_subtags(&renamed, parent_id).await?;
    info!(parent_id, regrouped, "artist tags regrouped");
    Ok(RegroupReport {
        parent_id,
        regrouped,
    })
}

fn strip_artist_prefix(tag: TagRecord) -> TagRecord {
    let name = tag
        .name
        .strip_prefix(ARTIST_PREFIX)
        .map(str::to_string)
        .unwrap_or(tag.name);
    TagRecord { id: tag.id, name }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_stripped_once() {
        let tag = strip_artist_prefix(TagRecord {
            id: 3,
            name: "Artist:Artist:Bob".into(),
        });
        assert_eq!(tag.name, "Artist:Bob");
        let plain = strip_artist_prefix(TagRecord {
            id: 4,
            name: "Alice".into(),
        });
        assert_eq!(plain.name, "Alice");
    }
}
