// Discover the URL catalog from configured sitemaps, following nested sitemap indexes.

use crate::config::Config;
use crate::network::Fetcher;
use crate::parser::{extract_locs, is_sitemap_index};
use std::collections::HashSet;
use std::sync::Arc;

pub struct SitemapSeeder {
    http: Arc<dyn Fetcher>,
    max_depth: usize,
}

impl SitemapSeeder {
    pub fn new(http: Arc<dyn Fetcher>) -> Self {
        Self {
            http,
            max_depth: Config::MAX_SITEMAP_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    // Single attempt; any failure is logged and the sitemap is skipped.
    async fn fetch_sitemap(&self, sitemap_url: &str) -> Option<String> {
        match self.http.fetch(sitemap_url).await {
            Ok(result) if result.is_success() => Some(result.content),
            Ok(result) => {
                tracing::warn!(
                    sitemap = %sitemap_url,
                    status = result.status_code,
                    "Sitemap returned non-success status, skipping"
                );
                None
            }
            Err(e) => {
                tracing::warn!(sitemap = %sitemap_url, error = %e, "Failed to fetch sitemap, skipping");
                None
            }
        }
    }

    /// Build the ordered, deduplicated catalog from `sources`.
    ///
    /// Sources are visited depth-first in the given order; nested indexes are
    /// expanded in place, so output order is first-encounter order. Unreachable
    /// sitemaps never abort discovery.
    pub async fn discover(&self, sources: &[String]) -> Vec<String> {
        let mut catalog = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut visited_sitemaps: HashSet<String> = HashSet::new();

        // Explicit stack, pushed in reverse so pops follow source order.
        let mut pending: Vec<(String, usize)> = sources
            .iter()
            .rev()
            .map(|source| (source.clone(), 0))
            .collect();

        while let Some((sitemap_url, depth)) = pending.pop() {
            if !visited_sitemaps.insert(sitemap_url.clone()) {
                tracing::debug!(sitemap = %sitemap_url, "Sitemap already visited, skipping");
                continue;
            }

            let Some(xml) = self.fetch_sitemap(&sitemap_url).await else {
                continue;
            };
            let locs = extract_locs(&xml);

            if is_sitemap_index(&xml) {
                if depth >= self.max_depth {
                    tracing::warn!(
                        sitemap = %sitemap_url,
                        depth,
                        "Sitemap index nesting too deep, not descending"
                    );
                    continue;
                }
                tracing::debug!(sitemap = %sitemap_url, nested = locs.len(), "Expanding sitemap index");
                for nested in locs.into_iter().rev() {
                    pending.push((nested, depth + 1));
                }
                continue;
            }

            let before = catalog.len();
            for url in locs {
                if seen_urls.insert(url.clone()) {
                    catalog.push(url);
                }
            }
            tracing::debug!(
                sitemap = %sitemap_url,
                added = catalog.len() - before,
                "Parsed leaf sitemap"
            );
        }

        tracing::info!(urls = catalog.len(), sources = sources.len(), "Discovered URL catalog");
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{CacheDirectives, FetchError, FetchResult, WarmResponse};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Serves canned sitemap bodies and records every fetch.
    #[derive(Default)]
    struct SitemapFixture {
        documents: HashMap<String, (u16, String)>,
        fetched: Mutex<Vec<String>>,
    }

    impl SitemapFixture {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.documents.insert(url.to_string(), (200, body.to_string()));
            self
        }

        fn with_status(mut self, url: &str, status: u16) -> Self {
            self.documents.insert(url.to_string(), (status, String::new()));
            self
        }
    }

    #[async_trait]
    impl Fetcher for SitemapFixture {
        async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
            self.fetched.lock().push(url.to_string());
            match self.documents.get(url) {
                Some((status, body)) => Ok(FetchResult {
                    content: body.clone(),
                    status_code: *status,
                    content_type: Some("application/xml".to_string()),
                }),
                None => Err(FetchError::ConnectionRefused),
            }
        }

        async fn warm(&self, _url: &str, _d: &CacheDirectives) -> Result<WarmResponse, FetchError> {
            unreachable!("discovery never warms")
        }
    }

    fn urlset(urls: &[&str]) -> String {
        let entries: String = urls
            .iter()
            .map(|u| format!("<url><loc>{}</loc></url>", u))
            .collect();
        format!("<urlset>{}</urlset>", entries)
    }

    fn index(sitemaps: &[&str]) -> String {
        let entries: String = sitemaps
            .iter()
            .map(|u| format!("<sitemap><loc>{}</loc></sitemap>", u))
            .collect();
        format!("<sitemapindex>{}</sitemapindex>", entries)
    }

    #[tokio::test]
    async fn test_two_level_index_union() {
        let fixture = SitemapFixture::default()
            .with("https://s.test/index.xml", &index(&["https://s.test/a.xml", "https://s.test/b.xml"]))
            .with("https://s.test/a.xml", &urlset(&["https://s.test/1", "https://s.test/2", "https://s.test/3"]))
            .with("https://s.test/b.xml", &urlset(&["https://s.test/3", "https://s.test/4"]));

        let seeder = SitemapSeeder::new(Arc::new(fixture));
        let catalog = seeder.discover(&["https://s.test/index.xml".to_string()]).await;

        assert_eq!(
            catalog,
            vec!["https://s.test/1", "https://s.test/2", "https://s.test/3", "https://s.test/4"]
        );
    }

    #[tokio::test]
    async fn test_failed_sources_are_skipped() {
        let fixture = SitemapFixture::default()
            .with("https://s.test/index.xml", &index(&["https://s.test/gone.xml", "https://s.test/ok.xml"]))
            .with_status("https://s.test/gone.xml", 404)
            .with("https://s.test/ok.xml", &urlset(&["https://s.test/ok"]));

        let seeder = SitemapSeeder::new(Arc::new(fixture));
        let catalog = seeder
            .discover(&[
                "https://unreachable.test/sitemap.xml".to_string(),
                "https://s.test/index.xml".to_string(),
            ])
            .await;

        assert_eq!(catalog, vec!["https://s.test/ok"]);
    }

    #[tokio::test]
    async fn test_depth_first_order_across_sources() {
        let fixture = SitemapFixture::default()
            .with("https://s.test/first.xml", &index(&["https://s.test/nested.xml"]))
            .with("https://s.test/nested.xml", &urlset(&["https://s.test/nested"]))
            .with("https://s.test/second.xml", &urlset(&["https://s.test/second", "https://s.test/nested"]));

        let seeder = SitemapSeeder::new(Arc::new(fixture));
        let catalog = seeder
            .discover(&[
                "https://s.test/first.xml".to_string(),
                "https://s.test/second.xml".to_string(),
            ])
            .await;

        assert_eq!(catalog, vec!["https://s.test/nested", "https://s.test/second"]);
    }

    #[tokio::test]
    async fn test_self_referencing_index_terminates() {
        let fixture = Arc::new(
            SitemapFixture::default()
                .with("https://s.test/loop.xml", &index(&["https://s.test/loop.xml", "https://s.test/leaf.xml"]))
                .with("https://s.test/leaf.xml", &urlset(&["https://s.test/page"])),
        );

        let seeder = SitemapSeeder::new(fixture.clone());
        let catalog = seeder.discover(&["https://s.test/loop.xml".to_string()]).await;

        assert_eq!(catalog, vec!["https://s.test/page"]);
        assert_eq!(fixture.fetched.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let fixture = SitemapFixture::default()
            .with("https://s.test/top.xml", &index(&["https://s.test/mid.xml"]))
            .with("https://s.test/mid.xml", &index(&["https://s.test/leaf.xml"]))
            .with("https://s.test/leaf.xml", &urlset(&["https://s.test/deep"]));

        let seeder = SitemapSeeder::new(Arc::new(fixture)).with_max_depth(1);
        let catalog = seeder.discover(&["https://s.test/top.xml".to_string()]).await;
        assert!(catalog.is_empty());
    }
}
