/// Strip one layer of SCPI string quoting.
///
/// A token opening with `"` has its first and last character removed and
/// every doubled internal quote collapsed to one. Anything else is returned
/// unchanged.
pub fn unquote(token: &str) -> String {
    if !token.starts_with('"') {
        return token.to_string();
    }
    let inner = if token.len() >= 2 {
        &token[1..token.len() - 1]
    } else {
        ""
    };
    inner.replace("\"\"", "\"")
}

/// Wrap a string in SCPI quotes, doubling internal quotes.
///
/// Already quote-wrapped input passes through unchanged so that block writes
/// composed from pre-quoted elements do not get double-wrapped.
pub fn quote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        return s.to_string();
    }
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_wraps_and_doubles() {
        assert_eq!(quote("hello"), "\"hello\"");
        assert_eq!(quote("say \"hi\" now"), "\"say \"\"hi\"\" now\"");
        assert_eq!(quote(""), "\"\"");
    }

    #[test]
    fn quote_is_idempotent_on_wrapped_input() {
        assert_eq!(quote("\"hello\""), "\"hello\"");
        assert_eq!(quote(quote("hello").as_str()), "\"hello\"");
    }

    #[test]
    fn unquote_strips_and_collapses() {
        assert_eq!(unquote("\"hello\""), "hello");
        assert_eq!(unquote("\"say \"\"hi\"\"\""), "say \"hi\"");
        assert_eq!(unquote("\"\""), "");
    }

    #[test]
    fn unquote_leaves_bare_tokens_alone() {
        assert_eq!(unquote("AUTO"), "AUTO");
        assert_eq!(unquote(""), "");
    }

    #[test]
    fn quoting_round_trips() {
        for s in ["", "plain", "with \"quotes\"", "\"", "a\"\"b", "trailing\""] {
            assert_eq!(unquote(&quote(s)), s, "round trip failed for {s:?}");
        }
    }
}
