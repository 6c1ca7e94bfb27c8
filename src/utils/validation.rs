use anyhow::{Result, anyhow};
use std::path::Path;

/// Sanitizes a declared filename before it travels in the caption and the
/// outbound multipart part. Strips any path component and replaces reserved
/// characters; the relay forwards arbitrary file types, so there is no
/// extension or MIME filtering here.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    // Get only the filename component (remove any path)
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(anyhow!("Filename cannot be empty"));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path component stripped from declared filename: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == '/'
                || c == '\\'
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    Ok(sanitized)
}
