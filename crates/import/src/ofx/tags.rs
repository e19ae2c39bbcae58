//! Tag scanning over OFX content.
//!
//! Both extractors try the XML reading first (`<TAG>value</TAG>`) and fall
//! back to the SGML reading, where a tag has no closing counterpart and its
//! value runs to the next tag or line break. Tag names are matched
//! ASCII case-insensitively; `to_ascii_uppercase` keeps byte offsets intact,
//! so positions found in the uppercased copy index the original text.

/// Container closers that end an unterminated SGML block.
const SGML_BLOCK_TERMINATORS: &[&str] = &["</BANKTRANLIST>", "</STMTRS>", "</CCSTMTRS>", "</OFX>"];

/// Returns the trimmed value of the first `tag` in `text`, or an empty string
/// when the tag is absent.
pub fn extract_value(text: &str, tag: &str) -> String {
    let upper = text.to_ascii_uppercase();
    let name = tag.to_ascii_uppercase();
    let open = format!("<{name}>");
    let close = format!("</{name}>");

    let value_starts: Vec<usize> = upper
        .match_indices(&open)
        .map(|(i, _)| i + open.len())
        .collect();

    for &start in &value_starts {
        let end = upper[start..].find('<').map_or(upper.len(), |i| start + i);
        if upper[end..].starts_with(&close) {
            return text[start..end].trim().to_string();
        }
    }

    value_starts
        .first()
        .map(|&start| {
            let end = upper[start..]
                .find(|c: char| matches!(c, '<' | '\r' | '\n'))
                .map_or(upper.len(), |i| start + i);
            text[start..end].trim().to_string()
        })
        .unwrap_or_default()
}

/// Like [`extract_value`], but `None` instead of an empty string.
pub fn extract_optional(text: &str, tag: &str) -> Option<String> {
    let value = extract_value(text, tag);
    (!value.is_empty()).then_some(value)
}

/// Returns every `block` element in source order.
///
/// Paired `<BLOCK>...</BLOCK>` elements win; the SGML split only runs when
/// no paired element exists, so a block is never counted twice.
pub fn extract_blocks(text: &str, block: &str) -> Vec<String> {
    let upper = text.to_ascii_uppercase();
    let name = block.to_ascii_uppercase();
    let open = format!("<{name}>");
    let close = format!("</{name}>");

    let paired = paired_blocks(text, &upper, &open, &close);
    if !paired.is_empty() {
        return paired;
    }
    sgml_blocks(text, &upper, &open)
}

fn paired_blocks(text: &str, upper: &str, open: &str, close: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = upper[cursor..].find(open) {
        let start = cursor + offset;
        let body = start + open.len();
        let Some(close_offset) = upper[body..].find(close) else {
            break;
        };
        let end = body + close_offset + close.len();
        blocks.push(text[start..end].to_string());
        cursor = end;
    }

    blocks
}

/// Each fragment runs from one opening tag to the next opening tag of the
/// same name, a container closer, or end of input. The opening tag is put
/// back on each fragment so tag extraction sees a uniform shape.
fn sgml_blocks(text: &str, upper: &str, open: &str) -> Vec<String> {
    let starts: Vec<usize> = upper.match_indices(open).map(|(i, _)| i).collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let body = start + open.len();
            let limit = starts.get(n + 1).copied().unwrap_or(upper.len());
            let region = &upper[body..limit];
            let end = SGML_BLOCK_TERMINATORS
                .iter()
                .filter_map(|t| region.find(t))
                .min()
                .map_or(limit, |i| body + i);
            format!("{open}{}", text[body..end].trim_end())
        })
        .collect()
}
