//! Merges a rendered schema block into the text of a model file

use crate::config::{Position, RenderOptions};
use crate::schema::renderer::HEADER_PREFIX;

const MAGIC_COMMENTS: &[&str] = &[
    "frozen_string_literal:",
    "coding:",
    "encoding:",
    "warn_indent:",
    "warn_past_scope:",
    "shareable_constant_value:",
];

/// Place `block` into `original` according to `options.position`.
///
/// An existing block is replaced rather than duplicated, so patching the
/// result again with the same block returns it unchanged.
pub fn patch(original: &str, block: &str, options: &RenderOptions) -> String {
    let nl = options.line_ending.as_str();
    let text = original.trim_end();

    match options.position {
        Position::After => {
            let base = strip_trailing_block(text).trim_end();
            if base.is_empty() {
                format!("{}{}", block, nl)
            } else {
                format!("{}{}{}{}{}", base, nl, nl, block, nl)
            }
        }
        Position::Before => {
            let (magic, rest) = split_magic_comments(text);
            let rest = strip_leading_block(rest.trim_start()).trim_start();

            let mut output = String::new();
            for line in &magic {
                output.push_str(line);
                output.push_str(nl);
            }
            if !magic.is_empty() {
                output.push_str(nl);
            }
            output.push_str(block);
            output.push_str(nl);
            if !rest.is_empty() {
                output.push_str(nl);
                output.push_str(rest);
                output.push_str(nl);
            }
            output
        }
    }
}

/// Lines of `text` with their byte offsets, terminators removed
fn lines_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n')
        .map(|raw| {
            let start = offset;
            offset += raw.len();
            let line = raw.strip_suffix('\n').unwrap_or(raw);
            (start, line.strip_suffix('\r').unwrap_or(line))
        })
        .collect()
}

/// Cut the last header line and everything after it, provided only comment
/// lines follow it
fn strip_trailing_block(text: &str) -> &str {
    let lines = lines_with_offsets(text);

    let Some(header) = lines.iter().rposition(|(_, l)| l.starts_with(HEADER_PREFIX)) else {
        return text;
    };

    if lines[header + 1..].iter().all(|(_, l)| l.starts_with('#')) {
        &text[..lines[header].0]
    } else {
        text
    }
}

/// Drop a block at the very top: a header line plus the comment lines after it
fn strip_leading_block(text: &str) -> &str {
    let lines = lines_with_offsets(text);

    match lines.first() {
        Some((_, first)) if first.starts_with(HEADER_PREFIX) => {}
        _ => return text,
    }

    match lines.iter().position(|(_, l)| !l.starts_with('#')) {
        Some(end) => &text[lines[end].0..],
        None => "",
    }
}

/// Split off leading interpreter and magic comment lines
fn split_magic_comments(text: &str) -> (Vec<&str>, &str) {
    let lines = lines_with_offsets(text);
    let mut magic = Vec::new();

    for (i, (_, line)) in lines.iter().enumerate() {
        if !is_magic_comment(line, i == 0) {
            return (magic, &text[lines[i].0..]);
        }
        magic.push(*line);
    }

    (magic, "")
}

fn is_magic_comment(line: &str, first: bool) -> bool {
    if first && line.starts_with("#!") {
        return true;
    }

    let Some(body) = line.strip_prefix('#') else {
        return false;
    };
    let body = body.trim();
    let lowered = body.to_lowercase();

    (body.starts_with("-*-") && body.ends_with("-*-"))
        || MAGIC_COMMENTS.iter().any(|m| lowered.starts_with(m))
}
