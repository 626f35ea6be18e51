//! Minimal front-matter extraction: a leading `---` fence with `key: value`
//! pairs, closed by `---` or `...`. Deliberately not a full YAML parser;
//! notes in the wild use flat scalar keys and simple tag lists.

/// Metadata extracted from a note's front-matter block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteMetadata {
    pub scope: String,
    pub note_type: String,
    /// Normalized status; defaults to `active`.
    pub status: String,
    /// ISO `YYYY-MM-DD` review date, kept only when well-formed.
    pub last_reviewed: Option<String>,
    /// Tags with any `#` prefix stripped. A `category` key is folded in here
    /// so the tag-weight rules are its single source of truth.
    pub tags: Vec<String>,
}

impl Default for NoteMetadata {
    fn default() -> Self {
        Self {
            scope: String::new(),
            note_type: String::new(),
            status: "active".to_string(),
            last_reviewed: None,
            tags: Vec::new(),
        }
    }
}

/// Parse front-matter from the start of `markdown`. Returns the metadata and
/// the number of leading lines consumed by the block (0 when there is none,
/// or when the block never closes).
#[must_use]
pub fn parse_front_matter(markdown: &str) -> (NoteMetadata, usize) {
    let mut meta = NoteMetadata::default();
    let lines: Vec<&str> = markdown.lines().collect();
    if lines.len() < 3 || !lines[0].starts_with("---") {
        return (meta, 0);
    }

    let Some(end) = lines[1..]
        .iter()
        .position(|l| l.starts_with("---") || l.starts_with("..."))
        .map(|i| i + 1)
    else {
        return (meta, 0);
    };

    for line in &lines[1..end] {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = strip_quotes(value.trim());

        match key {
            "scope" => meta.scope = value.to_string(),
            "type" => meta.note_type = value.to_string(),
            "status" => meta.status = normalize_status(value),
            "last_reviewed" | "lastReviewed" => {
                if is_iso_date(value) {
                    meta.last_reviewed = Some(value.to_string());
                }
            }
            "tags" => meta.tags.extend(parse_tags(value)),
            "category" => {
                let category = value.trim_start_matches('#');
                if !category.is_empty() {
                    meta.tags.push(category.to_string());
                }
            }
            _ => {}
        }
    }

    (meta, end + 1)
}

/// Map status synonyms onto the canonical four values; unknown values pass
/// through lowercased.
#[must_use]
pub fn normalize_status(status: &str) -> String {
    let status = status.trim().to_lowercase();
    match status.as_str() {
        "active" | "live" | "current" => "active".to_string(),
        "draft" | "wip" | "in-progress" => "draft".to_string(),
        "superseded" | "replaced" => "superseded".to_string(),
        "deprecated" | "obsolete" => "deprecated".to_string(),
        _ => status,
    }
}

/// Tags come in array form (`[a, b]`, optional `#`) or inline
/// whitespace/comma-separated form. `#` prefixes are stripped, empties
/// dropped.
fn parse_tags(value: &str) -> Vec<String> {
    value
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split([',', ' ', '\t'])
        .map(|t| strip_quotes(t.trim()).trim_start_matches('#'))
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn is_iso_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 4 | 7) || b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_front_matter_gives_defaults() {
        let (meta, consumed) = parse_front_matter("# Heading\nbody\n");
        assert_eq!(meta, NoteMetadata::default());
        assert_eq!(consumed, 0);
    }

    #[test]
    fn unterminated_block_is_ignored() {
        let (meta, consumed) = parse_front_matter("---\nstatus: draft\nno closing fence\n");
        assert_eq!(meta.status, "active");
        assert_eq!(consumed, 0);
    }

    #[test]
    fn parses_scalar_keys_and_quotes() {
        let input = "---\nscope: \"personal\"\ntype: 'decision'\nstatus: WIP\nlast_reviewed: 2024-03-01\n---\nbody\n";
        let (meta, consumed) = parse_front_matter(input);
        assert_eq!(meta.scope, "personal");
        assert_eq!(meta.note_type, "decision");
        assert_eq!(meta.status, "draft");
        assert_eq!(meta.last_reviewed.as_deref(), Some("2024-03-01"));
        assert_eq!(consumed, 6);
    }

    #[test]
    fn malformed_review_date_is_dropped() {
        let (meta, _) = parse_front_matter("---\nlastReviewed: yesterday\n---\n");
        assert_eq!(meta.last_reviewed, None);
    }

    #[test]
    fn tags_accept_array_form() {
        let (meta, _) = parse_front_matter("---\ntags: [alpha, #beta, gamma]\n---\n");
        assert_eq!(meta.tags, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn tags_accept_inline_hashtag_form() {
        let (meta, _) = parse_front_matter("---\ntags: #permanent-note #customer-research\n---\n");
        assert_eq!(meta.tags, vec!["permanent-note", "customer-research"]);
    }

    #[test]
    fn empty_tags_are_dropped() {
        let (meta, _) = parse_front_matter("---\ntags: [ , alpha,, ]\n---\n");
        assert_eq!(meta.tags, vec!["alpha"]);
    }

    #[test]
    fn category_folds_into_tags() {
        let (meta, _) = parse_front_matter("---\ntags: [vision]\ncategory: canon\n---\n");
        assert_eq!(meta.tags, vec!["vision", "canon"]);
    }

    #[test]
    fn closing_fence_accepts_dots() {
        let (meta, consumed) = parse_front_matter("---\nstatus: obsolete\n...\nbody\n");
        assert_eq!(meta.status, "deprecated");
        assert_eq!(consumed, 3);
    }

    #[test]
    fn status_normalization_table() {
        for (input, expected) in [
            ("active", "active"),
            ("LIVE", "active"),
            ("current", "active"),
            ("draft", "draft"),
            ("wip", "draft"),
            ("in-progress", "draft"),
            ("superseded", "superseded"),
            ("replaced", "superseded"),
            ("deprecated", "deprecated"),
            ("obsolete", "deprecated"),
            ("Frozen", "frozen"),
        ] {
            assert_eq!(normalize_status(input), expected, "input {input}");
        }
    }
}
