//! Fulltext query preparation

use graphqa_common::models::EntityId;

/// Characters with meaning in Lucene query syntax
const LUCENE_SPECIAL: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/',
];

/// Backslash-escape Lucene operators so free text is matched literally
pub fn escape_lucene(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if LUCENE_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Scale fulltext scores into `[0, 1]` by the best hit of the lookup
pub fn normalize(hits: &mut [(EntityId, f32)]) {
    let max = hits.iter().map(|(_, s)| *s).fold(0.0_f32, f32::max);
    if max > 0.0 {
        for (_, score) in hits.iter_mut() {
            *score /= max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators_are_escaped() {
        assert_eq!(escape_lucene("C++ vs C#?"), "C\\+\\+ vs C#\\?");
        assert_eq!(escape_lucene("a && (b || !c)"), "a \\&\\& \\(b \\|\\| \\!c\\)");
        assert_eq!(escape_lucene("path/to:file"), "path\\/to\\:file");
        assert_eq!(escape_lucene("plain words"), "plain words");
    }

    #[test]
    fn test_normalize_by_best_hit() {
        let mut hits = vec![(EntityId::from("a"), 4.0), (EntityId::from("b"), 1.0)];
        normalize(&mut hits);
        assert_eq!(hits[0].1, 1.0);
        assert_eq!(hits[1].1, 0.25);

        let mut empty: Vec<(EntityId, f32)> = Vec::new();
        normalize(&mut empty);
        assert!(empty.is_empty());
    }
}
