use std::collections::HashSet;

use crate::docs::query::alphanumeric_tokens;
use crate::docs::DocResult;

const KUBERNETES_DOC_MARKERS: &[&str] =
    &["kubernetes", "k8s", "/k8s/", "operator", "ingress", "helm", "crd"];

const GENERIC_DOC_WORDS: &[&str] =
    &["ngrok", "docs", "http", "https", "com", "the", "and", "for", "with", "how"];

pub fn is_kubernetes_doc(doc: &DocResult) -> bool {
    let title = doc.title.to_lowercase();
    let link = doc.link.to_lowercase();
    KUBERNETES_DOC_MARKERS.iter().any(|marker| title.contains(marker) || link.contains(marker))
}

/// Keyword-overlap relevance. Rewards query words found in the title, link
/// and content, and penalises topical title/link words the query never
/// mentioned.
pub fn score(doc: &DocResult, query: &str) -> f64 {
    let query_lower = query.to_lowercase();
    let query_words: Vec<&str> =
        query_lower.split_whitespace().filter(|word| word.len() >= 3).collect();

    let title = doc.title.to_lowercase();
    let link = doc.link.to_lowercase();
    let content = doc.content.to_lowercase();

    let mut total = 0.0;
    for word in &query_words {
        if title.contains(word) {
            total += 3.0;
        }
        if link.contains(word) {
            total += 2.0;
        }
        if content.contains(word) {
            total += 1.0;
        }
    }

    if title.contains(&query_lower) {
        total += 10.0;
    } else if content.contains(&query_lower) {
        total += 5.0;
    }

    let query_word_set: HashSet<&str> = query_words.iter().copied().collect();
    let doc_words: HashSet<String> = alphanumeric_tokens(&title)
        .into_iter()
        .chain(alphanumeric_tokens(&link))
        .filter(|word| !GENERIC_DOC_WORDS.contains(&word.as_str()))
        .collect();
    for doc_word in &doc_words {
        let related = query_word_set.contains(doc_word.as_str())
            || query_word_set
                .iter()
                .any(|query_word| doc_word.contains(query_word) || query_word.contains(doc_word.as_str()));
        if doc_word.len() >= 4 && !related {
            total -= 1.5;
        }
    }

    if !query_words.is_empty() {
        let matched =
            query_words.iter().filter(|word| title.contains(*word) || link.contains(*word)).count();
        total += (matched as f64 / query_words.len() as f64) * 5.0;
    }

    total
}

/// Scores every doc against `query`, orders best first and keeps `limit`.
pub fn rank(mut docs: Vec<DocResult>, query: &str, limit: usize) -> Vec<DocResult> {
    for doc in &mut docs {
        doc.score = score(doc, query);
    }
    docs.sort_by(|left, right| right.score.total_cmp(&left.score));
    docs.truncate(limit);
    docs
}
