/// Case-folds a label, spells out `&`, turns punctuation into spaces and
/// collapses runs of whitespace.
pub fn normalize_label(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '&' {
            out.push_str(" and ");
        } else if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive comparison form that keeps punctuation.
pub fn exact_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Tolerant comparison form: normalized, leading filler words such as
/// "less" dropped, and every token singularized.
pub fn fuzzy_key(text: &str, ignored_prefixes: &[String]) -> String {
    let normalized = normalize_label(text);
    let mut tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();

    while tokens.len() > 1
        && ignored_prefixes
            .iter()
            .any(|p| p.eq_ignore_ascii_case(tokens[0]))
    {
        tokens.remove(0);
    }

    tokens
        .into_iter()
        .map(singularize)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn singularize(token: &str) -> &str {
    if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") {
        &token[..token.len() - 1]
    } else {
        token
    }
}

/// Normalized, singularized tokens used for keyword matching.
pub fn label_tokens(text: &str) -> Vec<String> {
    normalize_label(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(|t| singularize(t).to_string())
        .collect()
}

/// True when `needle` occurs in `haystack` as a contiguous run of whole tokens.
pub fn contains_phrase(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
