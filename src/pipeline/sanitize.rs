//! Best-effort repair of a markup candidate that failed to parse.
//!
//! Only invoked by the validator after its first attempt fails, and only
//! once. The repaired text is not guaranteed to parse.
//!
//! ## Rule Order
//!
//! 1. Strip `<?xml …?>` prologs
//! 2. Drop everything before the first `<`
//! 3. Drop everything after the last `>`
//! 4. Escape bare `&` that do not start a predefined or numeric entity, then
//!    escape every `<` that cannot open markup (`a < b`, `<3`)
//! 5. Keep the first `<` a literal tag delimiter
//!
//! Rule 4 can escape the very first `<` of the candidate (a reply that starts
//! with `<3 ...` or `< receipt>`). Rule 5 puts that one back, so the
//! candidate always begins at the delimiter rules 2 and 3 cut it to.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_PROLOG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\?xml[^>]*\?>").unwrap());

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^&(?:amp|lt|gt|quot|apos|#[0-9]+|#[xX][0-9A-Fa-f]+);").unwrap());

/// Apply all repair rules in order and trim the result.
pub fn sanitize_markup(candidate: &str) -> String {
    let s = strip_prolog(candidate);
    let s = strip_leading_text(&s);
    let s = strip_trailing_text(s);
    let s = escape_bare_ampersands(s);
    let s = escape_stray_delimiters(&s);
    let s = restore_leading_delimiter(&s);
    let s = s.trim().to_string();
    debug!("Sanitised candidate: {} → {} bytes", candidate.len(), s.len());
    s
}

// ── Rule 1: prolog ───────────────────────────────────────────────────────────

fn strip_prolog(input: &str) -> String {
    RE_PROLOG.replace_all(input, "").into_owned()
}

// ── Rule 2: leading text ─────────────────────────────────────────────────────

fn strip_leading_text(input: &str) -> &str {
    match input.find('<') {
        Some(pos) => &input[pos..],
        None => "",
    }
}

// ── Rule 3: trailing text ────────────────────────────────────────────────────

fn strip_trailing_text(input: &str) -> &str {
    match input.rfind('>') {
        Some(pos) => &input[..=pos],
        None => input,
    }
}

// ── Rule 4: bare ampersands ──────────────────────────────────────────────────

fn escape_bare_ampersands(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if RE_ENTITY.is_match(tail) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

/// `<` opens markup only when followed by a name start, `/`, `!` or `?`.
fn opens_markup(after: &str) -> bool {
    after
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || matches!(c, '_' | ':' | '/' | '!' | '?'))
}

fn escape_stray_delimiters(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut rest = input;
    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        if opens_markup(tail) {
            out.push('<');
        } else {
            out.push_str("&lt;");
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

// ── Rule 5: leading delimiter ────────────────────────────────────────────────

fn restore_leading_delimiter(input: &str) -> String {
    match input.strip_prefix("&lt;") {
        Some(rest) => format!("<{rest}"),
        None => input.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prolog() {
        let input = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<receipt/>";
        assert_eq!(strip_prolog(input), "\n<receipt/>");
    }

    #[test]
    fn strips_surrounding_text() {
        assert_eq!(strip_leading_text("Here: <a>1</a> ok"), "<a>1</a> ok");
        assert_eq!(strip_trailing_text("<a>1</a> ok"), "<a>1</a>");
        assert_eq!(strip_leading_text("no tags"), "");
    }

    #[test]
    fn escapes_only_bare_ampersands() {
        let input = "<n>Fish & Chips &amp; Co &#169; &#xA9; &lt;3 &nbsp;</n>";
        assert_eq!(
            escape_bare_ampersands(input),
            "<n>Fish &amp; Chips &amp; Co &#169; &#xA9; &lt;3 &amp;nbsp;</n>"
        );
    }

    #[test]
    fn existing_entities_are_not_double_escaped() {
        let input = "<n>A &amp; B</n>";
        assert_eq!(escape_bare_ampersands(input), input);
    }

    #[test]
    fn escapes_stray_delimiters_only() {
        assert_eq!(
            escape_stray_delimiters("<n>a < b</n><!-- c --><?pi?><x:y/>"),
            "<n>a &lt; b</n><!-- c --><?pi?><x:y/>"
        );
        assert_eq!(escape_stray_delimiters("<n>x <3</n>"), "<n>x &lt;3</n>");
        assert_eq!(escape_stray_delimiters("<n>trailing <</n>"), "<n>trailing &lt;</n>");
    }

    #[test]
    fn restores_escaped_leading_delimiter() {
        assert_eq!(restore_leading_delimiter("&lt;receipt/>"), "<receipt/>");
        assert_eq!(restore_leading_delimiter("<a>&lt;</a>"), "<a>&lt;</a>");
    }

    #[test]
    fn first_delimiter_survives_rule_4() {
        let input = "<3 thanks!\n<receipt><name>a < b</name></receipt>";
        let through_rule_4 = escape_stray_delimiters(&escape_bare_ampersands(input));
        assert!(through_rule_4.starts_with("&lt;3"));

        let out = sanitize_markup(input);
        assert_eq!(out, "<3 thanks!\n<receipt><name>a &lt; b</name></receipt>");
    }

    #[test]
    fn stray_less_than_in_text_is_repaired() {
        assert_eq!(
            sanitize_markup("Here:\n<receipt><name>a < b & c</name></receipt>"),
            "<receipt><name>a &lt; b &amp; c</name></receipt>"
        );
    }

    #[test]
    fn full_repair() {
        let input = "Model says:\n<?xml version=\"1.0\"?>\n<receipt><store_info><name>M&S</name></store_info></receipt>\nThanks!";
        assert_eq!(
            sanitize_markup(input),
            "<receipt><store_info><name>M&amp;S</name></store_info></receipt>"
        );
    }

    #[test]
    fn text_without_tags_sanitises_to_empty() {
        assert_eq!(sanitize_markup("nothing here"), "");
    }
}
