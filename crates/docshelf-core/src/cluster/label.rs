//! Human-readable cluster names.
//!
//! Resolution order:
//!
//! 1. Tags shared by at least half the members of a multi-member cluster.
//! 2. The most frequent significant terms across member titles and
//!    content (stopword-filtered, lightly stemmed, title words weighted
//!    double). Up to three terms. A term must occur in more than one member
//!    unless the cluster has at most two members.
//! 3. `"Cluster N"` with `N = cluster_id + 1`.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::Document;

const MAX_TERMS: usize = 3;
const MAX_TAGS: usize = 3;
const TITLE_WEIGHT: usize = 2;
const CONTENT_WEIGHT: usize = 1;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "my", "your", "his", "her", "its", "our",
    "their", "all", "both", "each", "every", "any", "some", "few", "many", "i", "me", "we", "us",
    "you", "he", "him", "she", "it", "they", "them", "who", "whom", "whose", "which", "what",
    "where", "when", "why", "how", "in", "on", "at", "to", "for", "of", "with", "by", "from", "up",
    "down", "out", "off", "over", "under", "about", "into", "through", "during", "before",
    "after", "above", "below", "between", "among", "and", "or", "but", "if", "then", "because",
    "as", "until", "while", "since", "unless", "although", "though", "whether", "is", "are",
    "was", "were", "been", "be", "being", "have", "has", "had", "having", "do", "does", "did",
    "doing", "done", "will", "would", "shall", "should", "could", "may", "might", "must", "can",
    "cannot", "get", "got", "getting", "gets", "make", "made", "making", "makes", "not", "no",
    "nor", "yes", "very", "just", "only", "well", "even", "also", "too", "so", "now", "here",
    "there", "more", "most", "less", "least", "much", "little", "new", "old", "good", "bad",
    "great", "small", "large", "big", "one", "two", "three", "four", "five", "first", "second",
    "third", "document", "documents", "file", "files", "than", "such", "other", "into", "via",
    "using", "used", "use", "based",
];

/// Derive a label for a cluster from its members.
pub fn label_cluster(cluster_id: usize, members: &[&Document]) -> String {
    if let Some(label) = shared_tags(members) {
        return label;
    }
    if let Some(label) = frequent_terms(members) {
        return label;
    }
    fallback_label(cluster_id)
}

pub fn fallback_label(cluster_id: usize) -> String {
    format!("Cluster {}", cluster_id + 1)
}

fn shared_tags(members: &[&Document]) -> Option<String> {
    if members.len() < 2 {
        return None;
    }

    // lowercased tag -> (member count, first-seen spelling)
    let mut counts: HashMap<String, (usize, String)> = HashMap::new();
    for doc in members {
        let mut seen = HashSet::new();
        for tag in doc.tag_list() {
            let key = tag.to_lowercase();
            if seen.insert(key.clone()) {
                counts.entry(key).or_insert((0, tag)).0 += 1;
            }
        }
    }

    let threshold = members.len().div_ceil(2);
    let mut shared: Vec<(usize, String)> = counts
        .into_values()
        .filter(|(count, _)| *count >= threshold)
        .collect();
    if shared.is_empty() {
        return None;
    }

    shared.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    Some(
        shared
            .into_iter()
            .take(MAX_TAGS)
            .map(|(_, tag)| tag)
            .collect::<Vec<_>>()
            .join(", "),
    )
}

#[derive(Default)]
struct TermStats {
    weight: usize,
    members: usize,
    /// Shortest surface form seen for this stem.
    display: String,
}

fn frequent_terms(members: &[&Document]) -> Option<String> {
    let mut stats: BTreeMap<String, TermStats> = BTreeMap::new();

    for doc in members {
        let mut seen_in_doc = HashSet::new();
        for (text, weight) in [(&doc.title, TITLE_WEIGHT), (&doc.content, CONTENT_WEIGHT)] {
            for word in words(text) {
                let stem = stem(&word);
                let entry = stats.entry(stem.clone()).or_default();
                entry.weight += weight;
                if entry.display.is_empty() || word.len() < entry.display.len() {
                    entry.display = word;
                }
                if seen_in_doc.insert(stem) {
                    entry.members += 1;
                }
            }
        }
    }

    let require_shared = members.len() > 2;
    let mut ranked: Vec<(&String, &TermStats)> = stats
        .iter()
        .filter(|(_, s)| !require_shared || s.members > 1)
        .collect();
    ranked.sort_by(|a, b| b.1.weight.cmp(&a.1.weight).then_with(|| a.0.cmp(b.0)));

    let parts: Vec<String> = ranked
        .into_iter()
        .take(MAX_TERMS)
        .map(|(_, s)| capitalize(&s.display))
        .collect();

    (!parts.is_empty()).then(|| parts.join(" "))
}

/// Lowercased alphabetic words longer than two letters, stopwords removed.
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
}

/// Strip common English suffixes so plural and singular forms group.
fn stem(word: &str) -> String {
    let len = word.len();
    if word.ends_with("ies") && len > 4 {
        format!("{}y", &word[..len - 3])
    } else if word.ends_with("es") && len > 3 {
        word[..len - 2].to_string()
    } else if word.ends_with('s') && !word.ends_with("ss") && len > 3 {
        word[..len - 1].to_string()
    } else if word.ends_with("ing") && len > 5 {
        word[..len - 3].to_string()
    } else if word.ends_with("ed") && len > 4 {
        word[..len - 2].to_string()
    } else {
        word.to_string()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewDocument;

    fn doc(title: &str, content: &str, tags: Option<&str>) -> Document {
        let mut new = NewDocument::new(title, content);
        if let Some(t) = tags {
            new = new.with_tags(t);
        }
        Document::from_new(new)
    }

    #[test]
    fn test_shared_tags_win() {
        let a = doc("Alpha", "x", Some("rust, systems"));
        let b = doc("Beta", "y", Some("Rust"));
        let c = doc("Gamma", "z", Some("python"));
        assert_eq!(label_cluster(0, &[&a, &b, &c]), "rust");
    }

    #[test]
    fn test_frequent_terms() {
        let a = doc("Neural networks for vision", "convolution layers", None);
        let b = doc("Training neural network models", "layers and weights", None);
        let c = doc("Network pruning", "sparse neural layers", None);
        let label = label_cluster(0, &[&a, &b, &c]);
        assert!(label.starts_with("Network") || label.starts_with("Neural"), "{label}");
        assert!(label.contains("Layer"), "{label}");
    }

    #[test]
    fn test_single_member_uses_its_terms() {
        let a = doc("Sourdough baking", "flour water salt", None);
        assert!(label_cluster(0, &[&a]).contains("Sourdough"));
    }

    #[test]
    fn test_fallback_when_no_signal() {
        let a = doc("a b", "it is", None);
        let b = doc("of", "the", None);
        let c = doc("to", "an", None);
        assert_eq!(label_cluster(4, &[&a, &b, &c]), "Cluster 5");
    }

    #[test]
    fn test_stem() {
        assert_eq!(stem("libraries"), "library");
        assert_eq!(stem("networks"), "network");
        assert_eq!(stem("glass"), "glass");
        assert_eq!(stem("training"), "train");
    }
}
