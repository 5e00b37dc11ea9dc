//! RFC 8288 `Link` header parsing.

use reqwest::header::{HeaderMap, LINK};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub target: String,
    pub rels: Vec<String>,
}

impl LinkEntry {
    pub fn has_rel(&self, rel: &str) -> bool {
        self.rels.iter().any(|r| r.eq_ignore_ascii_case(rel))
    }
}

/// Parse one header value into its link entries.
///
/// Entries without a `<target>` are skipped. `rel` may be quoted or bare and
/// may carry several space-separated relation types.
pub fn parse_link_header(value: &str) -> Vec<LinkEntry> {
    split_outside(value, ',')
        .into_iter()
        .filter_map(|entry| {
            let mut params = split_outside(entry, ';').into_iter();
            let target = params.next()?.trim();
            let target = target.strip_prefix('<')?.strip_suffix('>')?.trim();

            let rels = params
                .filter_map(|param| {
                    let (name, value) = param.split_once('=')?;
                    name.trim()
                        .eq_ignore_ascii_case("rel")
                        .then_some(value.trim().trim_matches('"'))
                })
                .flat_map(str::split_ascii_whitespace)
                .map(str::to_string)
                .collect();

            Some(LinkEntry {
                target: target.to_string(),
                rels,
            })
        })
        .collect()
}

/// The `rel="next"` target across every `Link` header value, if any.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_link_header)
        .find(|entry| entry.has_rel("next"))
        .map(|entry| entry.target)
}

// Split on `sep` only outside `<...>` targets and quoted parameter values.
fn split_outside(value: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_target = false;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        if in_quotes {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quotes = false,
                _ => {},
            }
            continue;
        }
        match c {
            '<' if !in_target => in_target = true,
            '>' if in_target => in_target = false,
            '"' if !in_target => in_quotes = true,
            c if c == sep && !in_target => {
                parts.push(&value[start..i]);
                start = i + c.len_utf8();
            },
            _ => {},
        }
    }
    parts.push(&value[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use {super::*, reqwest::header::HeaderValue, rstest::rstest};

    #[rstest]
    #[case::quoted(r#"<https://x.test/p?page=2>; rel="next""#, Some("https://x.test/p?page=2"))]
    #[case::bare(r#"<https://x.test/p?page=2>; rel=next"#, Some("https://x.test/p?page=2"))]
    #[case::multiple_rels(r#"<https://x.test/2>; rel="prefetch next""#, Some("https://x.test/2"))]
    #[case::after_prev(
        r#"<https://x.test/1>; rel="prev", <https://x.test/3>; rel="next""#,
        Some("https://x.test/3")
    )]
    #[case::extra_params(r#"<https://x.test/3>; title="more"; REL="Next""#, Some("https://x.test/3"))]
    #[case::comma_in_target(r#"<https://x.test/p?ids=1,2>; rel="next""#, Some("https://x.test/p?ids=1,2"))]
    #[case::semicolon_in_target(
        r#"<https://x.test/p;v=1?page=2>; rel="next""#,
        Some("https://x.test/p;v=1?page=2")
    )]
    #[case::comma_in_quoted_param(r#"<https://x.test/2>; title="a, b"; rel="next""#, Some("https://x.test/2"))]
    #[case::semicolon_in_quoted_param(r#"<https://x.test/2>; title="x; y"; rel="next""#, Some("https://x.test/2"))]
    #[case::escaped_quote_in_param(
        r#"<https://x.test/1>; title="say \"hi, there\"", <https://x.test/2>; rel="next""#,
        Some("https://x.test/2")
    )]
    #[case::only_prev(r#"<https://x.test/1>; rel="prev""#, None)]
    #[case::next_archive_is_not_next(r#"<https://x.test/a>; rel="next-archive""#, None)]
    #[case::no_target(r#"https://x.test/2; rel="next""#, None)]
    #[case::empty("", None)]
    fn finds_next_target(#[case] header: &str, #[case] expected: Option<&str>) {
        let next = parse_link_header(header)
            .into_iter()
            .find(|e| e.has_rel("next"))
            .map(|e| e.target);
        assert_eq!(next.as_deref(), expected);
    }

    #[test]
    fn parses_every_entry() {
        let entries = parse_link_header(
            r#"<https://x.test/1>; rel="first", <https://x.test/9>; rel="last prev""#,
        );
        assert_eq!(entries, vec![
            LinkEntry {
                target: "https://x.test/1".into(),
                rels: vec!["first".into()],
            },
            LinkEntry {
                target: "https://x.test/9".into(),
                rels: vec!["last".into(), "prev".into()],
            },
        ]);
    }

    #[test]
    fn next_link_scans_all_header_values() {
        let mut headers = HeaderMap::new();
        headers.append(LINK, HeaderValue::from_static(r#"<https://x.test/1>; rel="prev""#));
        headers.append(LINK, HeaderValue::from_static(r#"<https://x.test/3>; rel="next""#));
        assert_eq!(next_link(&headers).as_deref(), Some("https://x.test/3"));

        assert_eq!(next_link(&HeaderMap::new()), None);
    }
}
