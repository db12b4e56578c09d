//! Title normalization and trigram-Jaccard similarity.

use std::collections::HashSet;

/// Similarity above which two titles describe the same event
pub const DEFAULT_NEAR_DUP_THRESHOLD: f64 = 0.5;

/// Punctuation ignored when building trigrams (ASCII plus common CJK forms)
const CJK_PUNCTUATION: &[char] = &[
    '【', '】', '（', '）', '：', '，', '。', '！', '？', '、', '；', '“', '”', '‘', '’', '《',
    '》', '—', '…', '·', '「', '」',
];

/// Trim and collapse internal whitespace. Identity key for exact dedup.
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn significant_chars(title: &str) -> Vec<char> {
    title
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation() && !CJK_PUNCTUATION.contains(c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Set of overlapping character trigrams. Titles shorter than three
/// significant characters contribute a single gram of what they have.
pub fn trigrams(title: &str) -> HashSet<String> {
    let chars = significant_chars(title);
    if chars.is_empty() {
        return HashSet::new();
    }
    if chars.len() < 3 {
        return HashSet::from([chars.iter().collect()]);
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

/// Jaccard similarity of the two titles' trigram sets, in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    jaccard(&ta, &tb)
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Keep items in arrival order, dropping any whose title is more similar than
/// `threshold` to an already kept title.
pub fn merge_near_duplicates<T, F>(items: Vec<T>, threshold: f64, title_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    let mut kept_grams: Vec<HashSet<String>> = Vec::with_capacity(items.len());

    for item in items {
        let grams = trigrams(title_of(&item));
        let duplicate = kept_grams.iter().any(|g| jaccard(&grams, g) > threshold);
        if duplicate {
            tracing::debug!("near-duplicate dropped: {}", title_of(&item));
            continue;
        }
        kept_grams.push(grams);
        kept.push(item);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_titles_are_fully_similar() {
        assert_eq!(similarity("央行宣布降准0.5个百分点", "央行宣布降准0.5个百分点"), 1.0);
    }

    #[test]
    fn test_punctuation_is_ignored() {
        assert_eq!(similarity("【快讯】央行宣布降准", "快讯：央行宣布降准！"), 1.0);
    }

    #[test]
    fn test_unrelated_titles() {
        assert!(similarity("央行宣布降准", "存储芯片价格持续上涨") < 0.1);
    }

    #[test]
    fn test_empty_title_has_zero_similarity() {
        assert_eq!(similarity("", "央行宣布降准"), 0.0);
        assert_eq!(similarity("！！", "？？"), 0.0);
    }

    #[test]
    fn test_normalize_title_collapses_whitespace() {
        assert_eq!(normalize_title("  Fed  holds\trates "), "Fed holds rates");
    }

    #[test]
    fn test_merge_keeps_first_encountered() {
        let titles = vec![
            "央行宣布下调存款准备金率0.5个百分点",
            "存储芯片价格持续上涨",
            "央行宣布下调存款准备金率0.5个百分点！",
            "快讯：央行宣布下调存款准备金率0.5个百分点",
        ];
        let kept = merge_near_duplicates(titles, DEFAULT_NEAR_DUP_THRESHOLD, |t| t);
        assert_eq!(kept, vec!["央行宣布下调存款准备金率0.5个百分点", "存储芯片价格持续上涨"]);
    }

    #[test]
    fn test_threshold_is_strict() {
        // Exactly at the threshold is kept
        let kept = merge_near_duplicates(vec!["abcdef", "abcdef"], 1.0, |t| t);
        assert_eq!(kept.len(), 2);
    }
}
