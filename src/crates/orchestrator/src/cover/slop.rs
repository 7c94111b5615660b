//! Known "slop pattern" phrases the cover quality gate rejects outright —
//! visual motifs that production image models over-produce for book-cover
//! prompts (the generic shadow-figure-on-horizon, an oversized lone tree,
//! a DNA-helix-adjacent swirl, etc). This list is content, not code: it
//! grows as new patterns are observed, no logic changes needed.

pub const SLOP_PATTERNS: &[&str] = &[
    "silhouette against sunset",
    "oversized lone tree",
    "generic galaxy swirl",
    "floating feather",
    "ornate keyhole",
    "cracked earth texture",
    "glowing orb in palm",
    "storm clouds with single ray",
];

pub fn matches_slop_pattern(description: &str) -> Option<&'static str> {
    let lower = description.to_lowercase();
    SLOP_PATTERNS.iter().find(|pattern| lower.contains(&pattern.to_lowercase())).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_known_pattern() {
        assert_eq!(matches_slop_pattern("a lone tree, oversized lone tree on a hill"), Some("oversized lone tree"));
    }

    #[test]
    fn test_no_match_for_original_description() {
        assert_eq!(matches_slop_pattern("a lighthouse beam cutting through fog"), None);
    }
}
