//! Discovery-value scoring for newly found links.

use serde::{Deserialize, Serialize};

const HUB_SCORE: i32 = 10;
const LISTING_SCORE: i32 = 8;
const TRAILING_SLASH_SCORE: i32 = 3;
const NO_FRAGMENT_SCORE: i32 = 2;
const LOW_VALUE_PENALTY: i32 = -5;

const DEFAULT_HUBS: &[&str] = &[
    "docs",
    "documentation",
    "overview",
    "reference",
    "guide",
    "manual",
    "index",
    "api",
];
const DEFAULT_LISTINGS: &[&str] = &["sitemap", "list", "archive", "category", "contents", "toc"];
const DEFAULT_LOW_VALUE: &[&str] = &["demo", "example", "playground", "sandbox"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub url: String,
    pub score: i32,
}

/// Ranks URLs by how likely they are to lead to many further pages.
///
/// All substring lists are matched case-insensitively and each list
/// contributes at most once to a score.
#[derive(Debug, Clone)]
pub struct PriorityScorer {
    hubs: Vec<String>,
    listings: Vec<String>,
    low_value: Vec<String>,
}

impl PriorityScorer {
    pub fn new(hubs: Vec<String>, listings: Vec<String>, low_value: Vec<String>) -> Self {
        Self {
            hubs: lowercase(hubs),
            listings: lowercase(listings),
            low_value: lowercase(low_value),
        }
    }

    pub fn score(&self, url: &str) -> i32 {
        let lower = url.to_lowercase();
        let mut score = 0;

        if contains_any(&lower, &self.hubs) {
            score += HUB_SCORE;
        }
        if contains_any(&lower, &self.listings) {
            score += LISTING_SCORE;
        }
        if lower.ends_with('/') {
            score += TRAILING_SLASH_SCORE;
        }
        if !lower.contains('#') {
            score += NO_FRAGMENT_SCORE;
        }
        if contains_any(&lower, &self.low_value) {
            score += LOW_VALUE_PENALTY;
        }

        score
    }

    /// Score `urls` and order them by descending score. Equal scores keep
    /// their input order.
    pub fn rank(&self, urls: Vec<String>) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = urls
            .into_iter()
            .map(|url| ScoredCandidate {
                score: self.score(&url),
                url,
            })
            .collect();
        // sort_by is stable
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored
    }
}

impl Default for PriorityScorer {
    fn default() -> Self {
        Self::new(
            to_owned(DEFAULT_HUBS),
            to_owned(DEFAULT_LISTINGS),
            to_owned(DEFAULT_LOW_VALUE),
        )
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_str()))
}

fn lowercase(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn to_owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
