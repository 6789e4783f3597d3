use std::collections::BTreeMap;

use regex::Regex;
use tracing::debug;

use crate::config::KeywordFilterConfig;
use crate::errors::ConfigError;
use crate::models::{CategorizationResult, KeywordMatch};

/// Characters kept on each side of an occurrence in a context snippet.
const CONTEXT_CHARS: usize = 50;
const MAX_CONTEXTS: usize = 5;

struct CompiledKeyword {
    keyword: String,
    weight: f64,
    pattern: Regex,
    /// ASCII keywords must not touch letters or digits on either side.
    whole_word: bool,
}

struct CompiledCategory {
    name: String,
    keywords: Vec<CompiledKeyword>,
}

#[derive(Debug, Clone, Copy)]
struct Occurrence {
    keyword: usize,
    start: usize,
    end: usize,
}

impl Occurrence {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn lies_within(&self, other: &Occurrence) -> bool {
        other.start <= self.start && self.end <= other.end
    }
}

/// Scores text against weighted keyword tables.
///
/// Built once from configuration; `categorize` takes `&self` and keeps no
/// state between calls, so the same input always yields the same result.
pub struct KeywordCategorizer {
    categories: Vec<CompiledCategory>,
}

impl KeywordCategorizer {
    pub fn new(categories: &BTreeMap<String, BTreeMap<String, f64>>) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(categories.len());

        for (name, keywords) in categories {
            let mut compiled_keywords = Vec::with_capacity(keywords.len());
            for (keyword, weight) in keywords {
                let keyword = keyword.trim();
                let pattern = Regex::new(&format!("(?i){}", regex::escape(keyword))).map_err(|e| {
                    ConfigError::invalid(format!("analysis.keyword_filter.categories.{}", name), e.to_string())
                })?;
                compiled_keywords.push(CompiledKeyword {
                    keyword: keyword.to_string(),
                    weight: *weight,
                    pattern,
                    whole_word: keyword.is_ascii(),
                });
            }
            compiled.push(CompiledCategory {
                name: name.clone(),
                keywords: compiled_keywords,
            });
        }

        Ok(Self { categories: compiled })
    }

    pub fn from_config(config: &KeywordFilterConfig) -> Result<Self, ConfigError> {
        Self::new(&config.categories)
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Title and content are read as a single text.
    pub fn categorize(&self, article_id: i64, title: &str, content: &str) -> CategorizationResult {
        let text = format!("{} {}", title, content);
        self.categorize_text(article_id, &text)
    }

    pub fn categorize_text(&self, article_id: i64, text: &str) -> CategorizationResult {
        let mut category_scores = BTreeMap::new();
        let mut matches = Vec::new();

        for category in &self.categories {
            let occurrences = counted_occurrences(category, text);
            let mut score = 0.0;

            for (idx, keyword) in category.keywords.iter().enumerate() {
                let spans: Vec<(usize, usize)> = occurrences
                    .iter()
                    .filter(|o| o.keyword == idx)
                    .map(|o| (o.start, o.end))
                    .collect();
                if spans.is_empty() {
                    continue;
                }

                let keyword_match = KeywordMatch {
                    article_id,
                    keyword: keyword.keyword.clone(),
                    category: category.name.clone(),
                    weight: keyword.weight,
                    match_count: spans.len() as i32,
                    context: build_context(text, &spans),
                    positions: spans.iter().map(|(start, _)| *start).collect(),
                };
                score += keyword_match.contribution();
                matches.push(keyword_match);
            }

            category_scores.insert(category.name.clone(), score);
        }

        debug!(
            "Article {}: {} keyword matches across {} categories",
            article_id,
            matches.len(),
            category_scores.values().filter(|s| **s > 0.0).count()
        );

        CategorizationResult {
            article_id,
            category_scores,
            matches,
        }
    }
}

/// All occurrences of the category's keywords, minus those that sit inside a
/// longer keyword's occurrence. Partial overlaps are kept on both sides.
fn counted_occurrences(category: &CompiledCategory, text: &str) -> Vec<Occurrence> {
    let all: Vec<Occurrence> = category
        .keywords
        .iter()
        .enumerate()
        .flat_map(|(idx, keyword)| {
            keyword
                .pattern
                .find_iter(text)
                .filter(move |m| !keyword.whole_word || is_whole_word(text, m.start(), m.end()))
                .map(move |m| Occurrence {
                    keyword: idx,
                    start: m.start(),
                    end: m.end(),
                })
        })
        .collect();

    all.iter()
        .filter(|occ| {
            !all.iter().any(|other| {
                other.keyword != occ.keyword && other.len() > occ.len() && occ.lies_within(other)
            })
        })
        .copied()
        .collect()
}

fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.map_or(false, is_word) && !after.map_or(false, is_word)
}

fn build_context(text: &str, spans: &[(usize, usize)]) -> String {
    spans
        .iter()
        .take(MAX_CONTEXTS)
        .map(|&(start, end)| {
            let from = text[..start]
                .char_indices()
                .rev()
                .take(CONTEXT_CHARS)
                .last()
                .map_or(start, |(i, _)| i);
            let to = text[end..]
                .char_indices()
                .nth(CONTEXT_CHARS)
                .map_or(text.len(), |(i, _)| end + i);
            format!("{}**{}**{}", &text[from..start], &text[start..end], &text[end..to]).replace('\n', " ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
