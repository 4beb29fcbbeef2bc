//! Small helpers shared by the providers.

/// Words that mark a bracketed or dashed title suffix as a version.
const VERSION_KEYWORDS: &[&str] = &[
    "remix",
    "mix",
    "edit",
    "live",
    "acoustic",
    "version",
    "remaster",
    "remastered",
    "instrumental",
    "extended",
    "radio",
    "club",
    "demo",
    "bootleg",
    "rework",
    "vip",
    "dub",
    "unplugged",
    "mono",
    "stereo",
];

fn is_version_text(text: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|word| VERSION_KEYWORDS.contains(&word.to_lowercase().as_str()))
}

/// Byte ranges of `(...)` and `[...]` groups, brackets included.
fn bracket_groups(title: &str) -> Vec<(usize, usize)> {
    let mut groups = Vec::new();
    let mut open: Option<(usize, char)> = None;
    for (idx, c) in title.char_indices() {
        match (open, c) {
            (None, '(') => open = Some((idx, ')')),
            (None, '[') => open = Some((idx, ']')),
            (Some((start, close)), c) if c == close => {
                groups.push((start, idx + c.len_utf8()));
                open = None;
            }
            _ => {}
        }
    }
    groups
}

/// Split a track title into name and version.
///
/// `"Song (Radio Edit)"` and `"Song - Radio Edit"` both give
/// `("Song", "Radio Edit")`. Groups that are not versions (e.g. `feat.`)
/// stay in the name.
pub fn parse_title_and_version(title: &str) -> (String, String) {
    let title = title.trim();
    let mut version = String::new();
    let mut name = String::with_capacity(title.len());
    let mut last = 0;

    for (start, end) in bracket_groups(title) {
        let inner = &title[start + 1..end - 1];
        if !is_version_text(inner) {
            continue;
        }
        if version.is_empty() {
            version = inner.trim().to_string();
        }
        name.push_str(&title[last..start]);
        last = end;
    }
    name.push_str(&title[last..]);

    if version.is_empty() {
        if let Some((head, tail)) = name.rsplit_once(" - ") {
            if is_version_text(tail) {
                version = tail.trim().to_string();
                name = head.to_string();
            }
        }
    }

    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    (name, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(title: &str) -> (String, String) {
        parse_title_and_version(title)
    }

    #[test]
    fn test_plain_title() {
        assert_eq!(split("Around the World"), ("Around the World".into(), "".into()));
    }

    #[test]
    fn test_bracketed_versions() {
        assert_eq!(split("Song (Live)"), ("Song".into(), "Live".into()));
        assert_eq!(
            split("Track [Extended Mix]"),
            ("Track".into(), "Extended Mix".into())
        );
        assert_eq!(
            split("One More Time (Radio Edit) (feat. Romanthony)"),
            ("One More Time (feat. Romanthony)".into(), "Radio Edit".into())
        );
    }

    #[test]
    fn test_dash_suffix_version() {
        assert_eq!(
            split("Digital Love - 2021 Remaster"),
            ("Digital Love".into(), "2021 Remaster".into())
        );
        assert_eq!(
            split("Something - Else Entirely"),
            ("Something - Else Entirely".into(), "".into())
        );
    }

    #[test]
    fn test_featuring_is_not_a_version() {
        assert_eq!(
            split("Lose Yourself to Dance (feat. Pharrell)"),
            ("Lose Yourself to Dance (feat. Pharrell)".into(), "".into())
        );
    }
}
