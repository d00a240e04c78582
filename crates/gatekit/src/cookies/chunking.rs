// Chunking for cookie values that exceed the browser's per-cookie limit.
// Chunks are named `{base}.{index}` and reassembled in index order.

use std::collections::HashMap;

/// Maximum cookie value size before chunking kicks in.
pub const MAX_COOKIE_SIZE: usize = 4093;

#[derive(Debug, Clone)]
pub struct CookieChunk {
    pub name: String,
    pub value: String,
}

/// Split an oversized value into chunks.
pub fn chunk_cookie_value(name: &str, data: &str) -> Vec<CookieChunk> {
    if data.len() <= MAX_COOKIE_SIZE {
        return vec![CookieChunk {
            name: name.to_string(),
            value: data.to_string(),
        }];
    }

    data.as_bytes()
        .chunks(MAX_COOKIE_SIZE)
        .enumerate()
        .map(|(index, chunk)| CookieChunk {
            name: format!("{name}.{index}"),
            // Values are base64/hex at this point, so chunk boundaries never
            // split a UTF-8 sequence.
            value: String::from_utf8_lossy(chunk).into_owned(),
        })
        .collect()
}

/// Chunk names to expire when clearing a possibly-chunked cookie.
pub fn clean_chunk_cookies(name: &str, max_chunks: usize) -> Vec<CookieChunk> {
    (0..max_chunks)
        .map(|i| CookieChunk {
            name: format!("{name}.{i}"),
            value: String::new(),
        })
        .collect()
}

/// Read a possibly-chunked cookie from a parsed cookie map.
pub fn get_chunked_cookie(cookies: &HashMap<String, String>, name: &str) -> Option<String> {
    if let Some(value) = cookies.get(name) {
        return Some(value.clone());
    }

    let prefix = format!("{name}.");
    let mut chunks: Vec<(usize, &str)> = cookies
        .iter()
        .filter_map(|(cookie_name, value)| {
            let index = cookie_name.strip_prefix(&prefix)?.parse::<usize>().ok()?;
            Some((index, value.as_str()))
        })
        .collect();

    if chunks.is_empty() {
        return None;
    }

    chunks.sort_by_key(|(idx, _)| *idx);
    Some(chunks.into_iter().map(|(_, v)| v).collect())
}
