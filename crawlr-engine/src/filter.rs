//! Domain scoping and pattern exclusion for discovered links.

use crate::error::{CrawlError, Result};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Keeps candidates on the seed's host that are not yet visited and do not
/// match any exclude pattern.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    seed: Url,
    host: String,
    exclude_patterns: Vec<String>,
}

impl ScopeFilter {
    /// Build a filter scoped to the host of `seed`.
    ///
    /// A seed that does not parse, or has no host, leaves the crawl without a
    /// scope and is rejected as a configuration error.
    pub fn new(seed: &str) -> Result<Self> {
        let parsed = Url::parse(seed)
            .map_err(|e| CrawlError::Configuration(format!("Invalid seed URL '{}': {}", seed, e)))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| CrawlError::Configuration(format!("Seed URL has no host: {}", seed)))?
            .to_string();

        Ok(Self {
            seed: parsed,
            host,
            exclude_patterns: Vec::new(),
        })
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns
            .into_iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    /// The seed in canonical form, e.g. `https://site.test` becomes
    /// `https://site.test/`. This is the form the frontier must hold.
    pub fn seed(&self) -> &str {
        self.seed.as_str()
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    /// Filter `candidates`, preserving their order. Kept URLs come back in
    /// canonical form so they compare equal to the visited set.
    pub fn filter(&self, candidates: Vec<String>, visited: &HashSet<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter_map(|candidate| self.canonical_in_scope(&candidate))
            .filter(|candidate| {
                if visited.contains(candidate) {
                    return false;
                }
                if self.is_excluded(candidate) {
                    debug!(url = %candidate, "Excluded by pattern");
                    return false;
                }
                seen.insert(candidate.clone())
            })
            .collect()
    }

    /// Exact host match against the seed, http(s) only.
    pub fn is_in_scope(&self, candidate: &str) -> bool {
        self.canonical_in_scope(candidate).is_some()
    }

    fn canonical_in_scope(&self, candidate: &str) -> Option<String> {
        match Url::parse(candidate) {
            Ok(parsed) => {
                let in_scope = matches!(parsed.scheme(), "http" | "https")
                    && parsed.host_str() == Some(self.host.as_str());
                in_scope.then(|| parsed.into())
            }
            Err(e) => {
                debug!(url = %candidate, error = %e, "Skipping malformed candidate");
                None
            }
        }
    }

    pub fn is_excluded(&self, candidate: &str) -> bool {
        if self.exclude_patterns.is_empty() {
            return false;
        }
        let lower = candidate.to_lowercase();
        self.exclude_patterns.iter().any(|p| lower.contains(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_keeps_only_seed_host() {
        let filter = ScopeFilter::new("https://a.example/x").unwrap();
        let kept = filter.filter(
            strings(&["https://a.example/y", "https://b.example/z"]),
            &HashSet::new(),
        );
        assert_eq!(kept, vec!["https://a.example/y"]);
    }

    #[test]
    fn test_subdomains_are_out_of_scope() {
        let filter = ScopeFilter::new("https://example.com/").unwrap();
        assert!(!filter.is_in_scope("https://docs.example.com/"));
        assert!(!filter.is_in_scope("https://example.com.evil.test/"));
        assert!(filter.is_in_scope("http://example.com/plain"));
    }

    #[test]
    fn test_skips_visited_and_duplicates() {
        let filter = ScopeFilter::new("https://a.example/").unwrap();
        let visited: HashSet<String> = strings(&["https://a.example/seen"]).into_iter().collect();
        let kept = filter.filter(
            strings(&[
                "https://a.example/seen",
                "https://a.example/new",
                "https://a.example/new",
            ]),
            &visited,
        );
        assert_eq!(kept, vec!["https://a.example/new"]);
    }

    #[test]
    fn test_skips_malformed_and_non_http() {
        let filter = ScopeFilter::new("https://a.example/").unwrap();
        let kept = filter.filter(
            strings(&["not a url", "ftp://a.example/file", "https://a.example/ok"]),
            &HashSet::new(),
        );
        assert_eq!(kept, vec!["https://a.example/ok"]);
    }

    #[test]
    fn test_exclude_patterns_are_case_insensitive() {
        let filter = ScopeFilter::new("https://a.example/")
            .unwrap()
            .with_exclude_patterns(strings(&["/Blog/", "  ", "?page="]));
        assert_eq!(filter.exclude_patterns(), &["/blog/", "?page="]);
        let kept = filter.filter(
            strings(&[
                "https://a.example/blog/post",
                "https://a.example/list?page=2",
                "https://a.example/docs",
            ]),
            &HashSet::new(),
        );
        assert_eq!(kept, vec!["https://a.example/docs"]);
    }

    #[test]
    fn test_seed_and_candidates_are_canonicalised() {
        let filter = ScopeFilter::new("https://Site.test").unwrap();
        assert_eq!(filter.seed(), "https://site.test/");

        let visited: HashSet<String> = strings(&[filter.seed()]).into_iter().collect();
        let kept = filter.filter(
            strings(&["https://site.test", "https://SITE.test/a", "https://site.test/a"]),
            &visited,
        );
        assert_eq!(kept, vec!["https://site.test/a"]);
    }

    #[test]
    fn test_malformed_seed_is_configuration_error() {
        assert!(matches!(
            ScopeFilter::new("::not-a-url"),
            Err(CrawlError::Configuration(_))
        ));
        assert!(matches!(
            ScopeFilter::new("mailto:someone@example.com"),
            Err(CrawlError::Configuration(_))
        ));
    }
}
