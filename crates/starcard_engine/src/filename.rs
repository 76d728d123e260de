use sha2::{Digest, Sha256};

const MAX_STEM_LEN: usize = 80;

/// Windows-safe, deterministic filename: `{sanitized_name}--{short_hash(url)}.{extension}`
///
/// The hash keeps names unique when two repositories sanitize to the same stem.
pub fn deterministic_filename(name: &str, url: &str, extension: &str) -> String {
    let stem = sanitize_stem(name);
    let hash = short_hash(url);
    format!("{stem}--{hash}.{extension}")
}

fn sanitize_stem(input: &str) -> String {
    let mut stem = String::with_capacity(input.len());
    for c in input.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        // Collapse runs of underscores ("owner//repo" -> "owner_repo").
        if c == '_' && stem.ends_with('_') {
            continue;
        }
        stem.push(c);
    }

    let mut stem = stem.trim_matches(&['_', ' ', '.'][..]).to_string();
    if stem.is_empty() {
        stem = "untitled".to_string();
    }
    if stem.len() > MAX_STEM_LEN {
        let mut end = MAX_STEM_LEN;
        while !stem.is_char_boundary(end) {
            end -= 1;
        }
        stem.truncate(end);
    }
    if is_reserved_windows_name(&stem) {
        stem.push('_');
    }
    stem
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(4).map(|byte| format!("{byte:02x}")).collect()
}
