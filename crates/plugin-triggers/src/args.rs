/// Splits the leading trigger word off `args`.
///
/// A word in double quotes may contain spaces: `"good morning" Morning!`.
/// Returns the word and the trimmed remainder, or `None` when there is no
/// word or the quote is never closed.
pub(crate) fn split_word(args: &str) -> Option<(&str, &str)> {
    let args = args.trim();
    if let Some(quoted) = args.strip_prefix('"') {
        let end = quoted.find('"')?;
        return Some((&quoted[..end], quoted[end + 1..].trim()));
    }
    let (word, rest) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    if word.is_empty() {
        return None;
    }
    Some((word, rest.trim()))
}

#[cfg(test)]
mod tests {
    use super::split_word;

    #[test]
    fn bare_word_and_rest() {
        assert_eq!(
            split_word("hello   Hi there, friend "),
            Some(("hello", "Hi there, friend"))
        );
    }

    #[test]
    fn word_without_rest() {
        assert_eq!(split_word(" hello "), Some(("hello", "")));
    }

    #[test]
    fn quoted_word_keeps_spaces() {
        assert_eq!(
            split_word("\"good morning\" Morning! It's early"),
            Some(("good morning", "Morning! It's early"))
        );
    }

    #[test]
    fn empty_or_unterminated_is_none() {
        assert_eq!(split_word("   "), None);
        assert_eq!(split_word("\"good morning Morning!"), None);
    }
}
