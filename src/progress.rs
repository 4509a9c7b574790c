//! Per-region offset into the URL catalog so large catalogs are warmed a page at a time.

use crate::state::{keys, KvStore, StateError};
use std::sync::Arc;

/// One page of the catalog, plus where the cursor goes once it has been warmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSlice {
    pub urls: Vec<String>,
    pub start_offset: usize,
    pub new_offset: usize,
    /// True when this page reaches the end of the catalog; the cursor wraps to 0.
    pub cycle_complete: bool,
}

pub struct ProgressCursor {
    store: Arc<dyn KvStore>,
}

impl ProgressCursor {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Stored offset for `region`; missing, unreadable or garbage values read as 0.
    pub fn offset(&self, region: &str) -> usize {
        match self.store.get(&keys::progress(region)) {
            Ok(Some(raw)) => raw.trim().parse::<usize>().unwrap_or_else(|_| {
                tracing::warn!(region = %region, value = %raw, "Unparsable progress offset, restarting at 0");
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(region = %region, error = %e, "Failed to read progress offset, using 0");
                0
            }
        }
    }

    /// Compute the next page without persisting anything.
    pub fn plan(&self, region: &str, catalog: &[String], page_size: usize) -> PageSlice {
        let mut offset = self.offset(region);
        if offset > catalog.len() {
            tracing::info!(
                region = %region,
                offset,
                catalog = catalog.len(),
                "Catalog shrank below stored offset, restarting cycle"
            );
            offset = 0;
        }
        slice_at(catalog, offset, page_size)
    }

    /// Persist the cursor position recorded in `slice`.
    pub fn commit(&self, region: &str, slice: &PageSlice) -> Result<(), StateError> {
        self.store
            .put(&keys::progress(region), &slice.new_offset.to_string(), None)?;
        if slice.cycle_complete {
            tracing::info!(region = %region, "Completed full catalog cycle");
        }
        Ok(())
    }

    /// Plan and immediately persist the next page.
    pub fn next_slice(
        &self,
        region: &str,
        catalog: &[String],
        page_size: usize,
    ) -> Result<PageSlice, StateError> {
        let slice = self.plan(region, catalog, page_size);
        self.commit(region, &slice)?;
        Ok(slice)
    }
}

/// Slice `catalog[offset..offset + page_size]`, wrapping the cursor at the end.
pub fn slice_at(catalog: &[String], offset: usize, page_size: usize) -> PageSlice {
    let start = offset.min(catalog.len());
    let end = start.saturating_add(page_size.max(1)).min(catalog.len());
    let cycle_complete = end >= catalog.len();

    PageSlice {
        urls: catalog[start..end].to_vec(),
        start_offset: start,
        new_offset: if cycle_complete { 0 } else { end },
        cycle_complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStore;

    fn catalog(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://example.com/{}", i)).collect()
    }

    #[test]
    fn test_full_cycle_visits_each_url_once() {
        for (size, page) in [(10, 3), (9, 3), (1, 5), (7, 1), (5, 5)] {
            let cursor = ProgressCursor::new(Arc::new(MemoryStore::new()));
            let urls = catalog(size);
            let mut visited = Vec::new();

            loop {
                let slice = cursor.next_slice("Oceania", &urls, page).unwrap();
                visited.extend(slice.urls);
                if slice.cycle_complete {
                    break;
                }
            }

            assert_eq!(visited, urls, "size={} page={}", size, page);
            assert_eq!(cursor.offset("Oceania"), 0);
        }
    }

    #[test]
    fn test_plan_does_not_persist() {
        let cursor = ProgressCursor::new(Arc::new(MemoryStore::new()));
        let urls = catalog(10);
        let first = cursor.plan("Africa", &urls, 4);
        assert_eq!(first.new_offset, 4);
        assert_eq!(cursor.offset("Africa"), 0);

        cursor.commit("Africa", &first).unwrap();
        let second = cursor.plan("Africa", &urls, 4);
        assert_eq!(second.start_offset, 4);
        assert_eq!(second.urls[0], "https://example.com/4");
    }

    #[test]
    fn test_regions_are_independent() {
        let cursor = ProgressCursor::new(Arc::new(MemoryStore::new()));
        let urls = catalog(10);
        cursor.next_slice("A", &urls, 6).unwrap();
        assert_eq!(cursor.offset("A"), 6);
        assert_eq!(cursor.offset("B"), 0);
    }

    #[test]
    fn test_shrunk_catalog_restarts() {
        let store = Arc::new(MemoryStore::new());
        store.put(&keys::progress("A"), "50", None).unwrap();
        let cursor = ProgressCursor::new(store);

        let slice = cursor.plan("A", &catalog(10), 4);
        assert_eq!(slice.start_offset, 0);
        assert_eq!(slice.urls.len(), 4);
    }

    #[test]
    fn test_empty_catalog_completes_immediately() {
        let slice = slice_at(&[], 0, 10);
        assert!(slice.urls.is_empty());
        assert!(slice.cycle_complete);
        assert_eq!(slice.new_offset, 0);
    }

    #[test]
    fn test_final_partial_page() {
        let slice = slice_at(&catalog(10), 8, 5);
        assert_eq!(slice.urls.len(), 2);
        assert!(slice.cycle_complete);
        assert_eq!(slice.new_offset, 0);
    }
}
