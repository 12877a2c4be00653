//! Filing documents arrive as HTML; pattern matching wants plain text.

const SKIPPED_ELEMENTS: [(&str, &str); 2] = [("script", "</script"), ("style", "</style")];

/// Strip markup from an HTML document, yielding whitespace-normalized text.
///
/// Script and style elements are elided wholesale, tags become single
/// spaces, and the common entities are decoded. This is not a conforming
/// HTML parser; filing documents are tag soup and only the prose matters.
pub fn strip_html(input: &str) -> String {
    // ASCII lowercasing preserves byte offsets, so the shadow copy can be
    // searched case-insensitively while slicing the original.
    let shadow = input.to_ascii_lowercase();
    let mut text = String::with_capacity(input.len() / 4);
    let mut pos = 0;

    while let Some(rel) = shadow[pos..].find('<') {
        let open = pos + rel;
        text.push_str(&input[pos..open]);

        let after_open = &shadow[open + 1..];
        let skipped = SKIPPED_ELEMENTS
            .iter()
            .find(|(name, _)| after_open.starts_with(name));

        pos = match skipped {
            Some((_, close_tag)) => match shadow[open..].find(close_tag) {
                Some(rel_close) => {
                    let close = open + rel_close;
                    match shadow[close..].find('>') {
                        Some(rel_gt) => close + rel_gt + 1,
                        None => shadow.len(),
                    }
                }
                None => shadow.len(),
            },
            None => match shadow[open..].find('>') {
                Some(rel_gt) => {
                    text.push(' ');
                    open + rel_gt + 1
                }
                None => shadow.len(),
            },
        };
    }
    text.push_str(&input[pos..]);

    let decoded = decode_entities(&text);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let semi = tail
            .char_indices()
            .take(10)
            .find(|(_, ch)| *ch == ';')
            .map(|(index, _)| index);
        match semi {
            Some(end) => {
                let entity = &tail[1..end];
                match decode_entity(entity) {
                    Some(ch) => out.push(ch),
                    None => out.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "rsquo" | "lsquo" => Some('\''),
        "rdquo" | "ldquo" => Some('"'),
        "ndash" | "mdash" => Some('-'),
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}
