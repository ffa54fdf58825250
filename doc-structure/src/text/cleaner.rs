//! Sentence text cleaning for narration.

/// Characters that trip up speech engines and their replacements.
const PROBLEMATIC_CHARS: &[(char, &str)] = &[
    ('\u{2018}', "'"),   // Left single quote
    ('\u{2019}', "'"),   // Right single quote
    ('\u{201c}', "\""),  // Left double quote
    ('\u{201d}', "\""),  // Right double quote
    ('\u{2013}', "-"),   // En dash
    ('\u{2014}', "-"),   // Em dash
    ('\u{2026}', "..."), // Ellipsis
    ('\u{00a0}', " "),   // Non-breaking space
    ('\u{200b}', ""),    // Zero-width space
    ('\u{200c}', ""),    // Zero-width non-joiner
    ('\u{200d}', ""),    // Zero-width joiner
    ('\u{feff}', ""),    // BOM
    ('\u{2011}', "-"),   // Non-breaking hyphen
    ('\u{2012}', "-"),   // Figure dash
    ('\u{2015}', "-"),   // Horizontal bar
    ('\u{00ab}', "\""),  // Left-pointing double angle quote
    ('\u{00bb}', "\""),  // Right-pointing double angle quote
];

/// Clean one sentence of plain text.
///
/// This function:
/// - Optionally replaces smart quotes, dashes and invisible characters
/// - Drops control characters
/// - Collapses whitespace to single spaces
pub fn clean_sentence(raw: &str, normalize_typography: bool) -> String {
    let mut result = String::with_capacity(raw.len());
    for c in raw.chars() {
        let replacement = normalize_typography
            .then(|| PROBLEMATIC_CHARS.iter().find(|(ch, _)| *ch == c))
            .flatten()
            .map(|(_, r)| *r);

        if let Some(r) = replacement {
            result.push_str(r);
        } else if !c.is_control() || c.is_whitespace() {
            result.push(c);
        }
    }

    normalize_whitespace(&result)
}

/// Collapse every whitespace run into a single space and trim.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(text: &str) -> String {
        clean_sentence(text, true)
    }

    #[test]
    fn test_clean_smart_quotes() {
        let text = "\u{201c}Hello,\u{201d} said John. \u{2018}It\u{2019}s nice.\u{2019}";
        assert_eq!(clean(text), "\"Hello,\" said John. 'It's nice.'");
    }

    #[test]
    fn test_clean_dashes() {
        assert_eq!(clean("one–two—three"), "one-two-three");
    }

    #[test]
    fn test_typography_left_alone_when_disabled() {
        let cleaned = clean_sentence("one–two \u{201c}three\u{201d}", false);
        assert_eq!(cleaned, "one–two \u{201c}three\u{201d}");
    }

    #[test]
    fn test_clean_whitespace() {
        assert_eq!(clean("Hello   world\n\tagain  "), "Hello world again");
    }

    #[test]
    fn test_clean_control_and_zero_width_chars() {
        assert_eq!(clean("Hello\x00World\x07Test"), "HelloWorldTest");
        assert_eq!(clean("Hello\u{200b}World\u{feff}Test"), "HelloWorldTest");
    }

    #[test]
    fn test_literal_markers_survive() {
        assert_eq!(
            clean("Compute 5 * 3 with snake_case names."),
            "Compute 5 * 3 with snake_case names."
        );
    }
}
