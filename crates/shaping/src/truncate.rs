use crate::config::ShapingConfig;

/// Text cut down to a budget, with the number of characters that were dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextTruncation {
    pub text: String,
    pub omitted_chars: usize,
}

/// Line-safe truncation of opaque text to `max_length` bytes.
///
/// The cut lands `text_suffix_reserve` bytes before the budget (on a character boundary), moves
/// back to the last newline when that newline is late enough in the kept part, and an explicit
/// suffix reports how many characters were dropped. Returns `None` when `text` already fits.
pub fn truncate_text(
    text: &str,
    max_length: usize,
    config: &ShapingConfig,
) -> Option<TextTruncation> {
    if text.len() <= max_length {
        return None;
    }

    let target = max_length.saturating_sub(config.text_suffix_reserve);
    let mut cut = char_boundary_at_or_before(text, target);
    if let Some(newline) = text[..cut].rfind('\n') {
        if newline * 100 >= target * config.newline_backoff_percent {
            cut = newline;
        }
    }

    let kept = &text[..cut];
    let omitted_chars = text.chars().count() - kept.chars().count();
    Some(TextTruncation {
        text: format!("{kept}\n\n... (truncated, {omitted_chars} characters omitted)"),
        omitted_chars,
    })
}

fn char_boundary_at_or_before(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_text_is_left_alone() {
        let config = ShapingConfig::default();
        assert_eq!(truncate_text("hello", 2_000, &config), None);
    }

    #[test]
    fn cuts_at_late_newline() {
        let config = ShapingConfig::default();
        // 12 lines of 99 chars; target is 800, last newline before it sits at 799.
        let line = "x".repeat(99);
        let text = vec![line; 12].join("\n");
        let out = truncate_text(&text, 1_000, &config).unwrap();

        let (kept, suffix) = out.text.split_once("\n\n...").unwrap();
        assert_eq!(kept.chars().count(), 799);
        assert!(!kept.ends_with('\n'));
        assert_eq!(out.omitted_chars, text.chars().count() - 799);
        assert_eq!(
            format!("...{suffix}"),
            format!("... (truncated, {} characters omitted)", out.omitted_chars)
        );
    }

    #[test]
    fn early_newline_is_ignored() {
        let config = ShapingConfig::default();
        let text = format!("header\n{}", "y".repeat(3_000));
        let out = truncate_text(&text, 1_000, &config).unwrap();
        let kept = out.text.split("\n\n...").next().unwrap();
        assert_eq!(kept.chars().count(), 800);
        assert_eq!(out.omitted_chars, text.chars().count() - 800);
    }

    #[test]
    fn budget_is_bytes_cut_on_a_char_boundary() {
        let config = ShapingConfig::default();
        // 1500 chars but 3000 bytes; the 801-byte target falls inside a character.
        let text = "é".repeat(1_500);
        let out = truncate_text(&text, 1_001, &config).unwrap();
        let kept = out.text.split("\n\n...").next().unwrap();
        assert_eq!(kept, "é".repeat(400));
        assert_eq!(out.omitted_chars, 1_100);
        assert!(out.text.len() <= 1_001);
    }

    #[test]
    fn multibyte_text_under_char_count_still_truncates() {
        let config = ShapingConfig::default();
        let text = "é".repeat(1_500);
        assert!(truncate_text(&text, 2_000, &config).is_some());
    }

    #[test]
    fn tiny_budget_keeps_only_the_suffix() {
        let config = ShapingConfig::default();
        let out = truncate_text("abcdefghij", 5, &config).unwrap();
        assert_eq!(out.omitted_chars, 10);
        assert_eq!(out.text, "\n\n... (truncated, 10 characters omitted)");
    }
}
