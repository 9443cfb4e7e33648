//! Token substitution for module format strings.
//!
//! A module renders its text by substituting tokens such as `%volume%` into
//! its configured format string. The final length is computed before any
//! output is allocated: replacement text is arbitrary and may be longer,
//! shorter, or the same size as its token, so the exact size is derived up
//! front and reserved in one step rather than grown incidentally.

use crate::error::Error;

/// One `token -> replacement` pair. Tokens are replaced in the order given.
pub type TokenTable<'a> = [(&'a str, String)];

/// Exact byte length of `render(format, tokens)`.
///
/// For every token the occurrence count in `format` is weighed against the
/// difference between replacement and token length. Tokens that do not occur
/// contribute nothing.
pub fn rendered_len(format: &str, tokens: &TokenTable<'_>) -> usize {
    tokens.iter().fold(format.len(), |len, (token, replacement)| {
        if token.is_empty() {
            return len;
        }

        let count = count_occurrences(format, token);

        len + count * replacement.len() - count * token.len()
    })
}

/// Substitutes every token in `format` with its replacement, in table order.
///
/// An empty table degrades to a plain copy of `format`. Fails with
/// [`Error::Allocation`] if memory cannot be reserved; no partial result is
/// returned in that case.
pub fn render(format: &str, tokens: &TokenTable<'_>) -> Result<String, Error> {
    let mut buffer = String::new();
    buffer.try_reserve_exact(rendered_len(format, tokens))?;
    buffer.push_str(format);

    for (token, replacement) in tokens {
        if token.is_empty() {
            continue;
        }

        buffer = replace_all(buffer, token, replacement)?;
    }

    Ok(buffer)
}

/// Replaces every occurrence of `token` in `input`, preserving all other
/// bytes. Returns the input unchanged when the token does not occur.
fn replace_all(input: String, token: &str, replacement: &str) -> Result<String, Error> {
    let count = count_occurrences(&input, token);

    if count == 0 {
        return Ok(input);
    }

    let mut output = String::new();
    output.try_reserve_exact(input.len() + count * replacement.len() - count * token.len())?;

    let mut rest = input.as_str();

    while let Some(position) = rest.find(token) {
        output.push_str(&rest[..position]);
        output.push_str(replacement);
        rest = &rest[position + token.len()..];
    }

    output.push_str(rest);

    Ok(output)
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    let mut count = 0;
    let mut rest = haystack;

    while let Some(position) = rest.find(needle) {
        count += 1;
        rest = &rest[position + needle.len()..];
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn table(pairs: &[(&'static str, &str)]) -> Vec<(&'static str, String)> {
        pairs
            .iter()
            .map(|(token, replacement)| (*token, (*replacement).to_string()))
            .collect()
    }

    #[test]
    fn empty_table_is_a_pure_copy() {
        let rendered = render("CPU 42% | 13:37", &[]).unwrap();
        assert_eq!(rendered, "CPU 42% | 13:37");
    }

    #[test]
    fn single_token_single_occurrence() {
        let tokens = table(&[("%value%", "87")]);
        assert_eq!(render("BL %value%", &tokens).unwrap(), "BL 87");
    }

    #[test]
    fn tokens_replaced_in_table_order() {
        let tokens = table(&[("%volume%", "42"), ("%state%", "M")]);
        let rendered = render("VOL %volume% [%state%]", &tokens).unwrap();
        assert_eq!(rendered, "VOL 42 [M]");
    }

    #[test]
    fn many_occurrences_of_one_token() {
        let tokens = table(&[("%x%", "ab")]);
        assert_eq!(render("%x%-%x%-%x%", &tokens).unwrap(), "ab-ab-ab");
    }

    #[test]
    fn adjacent_occurrences_predict_exactly() {
        // Predicted length: 6 + (2 - 3) * 2 = 4.
        let tokens = table(&[("%x%", "12")]);
        assert_eq!(rendered_len("%x%%x%", &tokens), 4);
        assert_eq!(render("%x%%x%", &tokens).unwrap(), "1212");
    }

    #[test]
    fn replacement_longer_than_token() {
        let tokens = table(&[("%v%", "one hundred")]);
        assert_eq!(render("[%v%]", &tokens).unwrap(), "[one hundred]");
        assert_eq!(rendered_len("[%v%]", &tokens), "[one hundred]".len());
    }

    #[test]
    fn replacement_shorter_than_token() {
        let tokens = table(&[("%status%", "")]);
        assert_eq!(render("a%status%b", &tokens).unwrap(), "ab");
        assert_eq!(rendered_len("a%status%b", &tokens), 2);
    }

    #[test]
    fn absent_token_changes_nothing() {
        let tokens = table(&[("%missing%", "zzz")]);
        assert_eq!(render("plain text", &tokens).unwrap(), "plain text");
        assert_eq!(rendered_len("plain text", &tokens), "plain text".len());
    }

    #[test]
    fn replacing_a_token_with_itself_is_idempotent() {
        let tokens = table(&[("%v%", "%v%")]);
        let once = render("x %v% y", &tokens).unwrap();
        let twice = render(&once, &tokens).unwrap();
        assert_eq!(once, "x %v% y");
        assert_eq!(twice, once);
    }

    #[test]
    fn non_token_bytes_are_untouched() {
        let tokens = table(&[("%v%", "1")]);
        let rendered = render("⌁ %v% ⌁", &tokens).unwrap();
        assert_eq!(rendered, "⌁ 1 ⌁");
    }

    #[test]
    fn length_matches_prediction_for_mixed_table() {
        let format = "A:%a% B:%b% B:%b%";
        let tokens = table(&[("%a%", "longer-than-token"), ("%b%", "")]);

        let rendered = render(format, &tokens).unwrap();
        assert_eq!(rendered.len(), rendered_len(format, &tokens));
        assert_eq!(rendered, "A:longer-than-token B: B:");
    }

    #[test]
    fn empty_format_renders_empty() {
        let tokens = table(&[("%v%", "42")]);
        assert_eq!(render("", &tokens).unwrap(), "");
        assert_eq!(rendered_len("", &tokens), 0);
    }

    proptest! {
        // Token-free replacement text keeps the length prediction exact for
        // arbitrary formats and replacements.
        #[test]
        fn render_length_always_matches_prediction(
            format in "[a-z %]{0,40}",
            replacement in "[a-z0-9]{0,10}",
        ) {
            let tokens = vec![("%v%", replacement)];
            let rendered = render(&format, &tokens).unwrap();
            prop_assert_eq!(rendered.len(), rendered_len(&format, &tokens));
        }

        #[test]
        fn render_without_tokens_is_identity(format in ".{0,60}") {
            prop_assert_eq!(render(&format, &[]).unwrap(), format);
        }
    }
}
