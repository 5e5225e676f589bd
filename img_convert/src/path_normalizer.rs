//! Drop Payload Path Normalizer
//!
//! Turns raw drag-and-drop style strings into clean path strings. Pure string work;
//! nothing here touches the filesystem.
//!
//! A payload is split into tokens: a `{...}` group is one token (so paths with spaces
//! survive), everything else splits on whitespace. Each token is trimmed, stripped of
//! its braces and lexically normalized in the host path convention.

/// Path separator convention applied during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// `/` separates; a backslash is an ordinary filename character.
    Unix,
    /// `/` and `\` both separate; output uses `\`. Drive and UNC prefixes are kept.
    Windows,
}

impl PathStyle {
    pub fn host() -> Self {
        if cfg!(windows) {
            PathStyle::Windows
        } else {
            PathStyle::Unix
        }
    }

    fn separator(&self) -> char {
        match self {
            PathStyle::Unix => '/',
            PathStyle::Windows => '\\',
        }
    }

    fn is_separator(&self, c: char) -> bool {
        match self {
            PathStyle::Unix => c == '/',
            PathStyle::Windows => c == '/' || c == '\\',
        }
    }
}

/// Normalize one drop payload using the host convention.
pub fn normalize_drop_payload(raw: &str) -> Vec<String> {
    normalize_drop_payload_with_style(raw, PathStyle::host())
}

/// Normalize a batch of payloads, flattening the results in order.
pub fn normalize_drop_payloads<I, S>(raws: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raws.into_iter()
        .flat_map(|raw| normalize_drop_payload(raw.as_ref()))
        .collect()
}

pub fn normalize_drop_payload_with_style(raw: &str, style: PathStyle) -> Vec<String> {
    tokenize(raw)
        .into_iter()
        .map(|token| clean_token(&token))
        .filter(|token| !token.is_empty())
        .map(|token| normalize_path(&token, style))
        .collect()
}

/// Split on whitespace, keeping each `{...}` group as a single token.
///
/// An unterminated `{` swallows the rest of the payload.
fn tokenize(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c == '{' && current.is_empty() {
            let mut group = String::new();
            for g in chars.by_ref() {
                if g == '}' {
                    break;
                }
                group.push(g);
            }
            tokens.push(group);
        } else if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn clean_token(token: &str) -> String {
    token
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim()
        .to_string()
}

/// Lexical normalization: collapse separators, drop `.`, resolve `..` where possible.
pub fn normalize_path(path: &str, style: PathStyle) -> String {
    let sep = style.separator();
    let (prefix, rest) = split_prefix(path, style);

    let leading = rest.chars().take_while(|&c| style.is_separator(c)).count();
    let is_absolute = leading > 0;
    let root = match style {
        PathStyle::Unix if leading == 2 => "//".to_string(),
        _ if is_absolute => sep.to_string(),
        _ => String::new(),
    };

    let mut parts: Vec<&str> = Vec::new();
    for comp in rest.split(|c| style.is_separator(c)) {
        match comp {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !is_absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let body = parts.join(&sep.to_string());
    let normalized = format!("{}{}{}", prefix, root, body);
    if normalized.is_empty() {
        ".".to_string()
    } else {
        normalized
    }
}

/// Split off a Windows drive (`C:`) or UNC (`\\server\share`) prefix.
fn split_prefix(path: &str, style: PathStyle) -> (String, &str) {
    if style != PathStyle::Windows {
        return (String::new(), path);
    }

    let mut chars = path.chars();
    if let (Some(first), Some(':')) = (chars.next(), chars.next()) {
        if first.is_ascii_alphabetic() {
            return (path[..2].to_string(), &path[2..]);
        }
    }

    let bytes: Vec<char> = path.chars().take(3).collect();
    let is_unc = bytes.len() == 3
        && style.is_separator(bytes[0])
        && style.is_separator(bytes[1])
        && !style.is_separator(bytes[2]);
    if is_unc {
        // \\server\share is the prefix; whatever follows is the rooted remainder
        let after = &path[2..];
        let mut seps = after
            .char_indices()
            .filter(|(_, c)| style.is_separator(*c))
            .map(|(i, _)| i);
        let server_end = seps.next();
        let share_end = seps.next();
        if let Some(server_end) = server_end {
            let end = share_end.unwrap_or(after.len());
            let server = &after[..server_end];
            let share = &after[server_end + 1..end];
            if !server.is_empty() && !share.is_empty() {
                return (format!("\\\\{}\\{}", server, share), &after[end..]);
            }
        }
    }

    (String::new(), path)
}
