//! Single-range parsing and partial-content synthesis (§4 Range & TTL
//! policy, component C7).

use crate::error::ProxyError;

/// A resolved byte range against a known total size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// Inclusive end offset.
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn content_range_header(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_size)
    }
}

/// Parse a single-range `Range` header value (`bytes=a-b`, `bytes=a-`,
/// `bytes=-n`) against a known total size. Only single ranges are
/// supported; a multi-range request (comma-separated) is rejected as
/// unsatisfiable rather than attempting multipart/byteranges synthesis.
pub fn parse_range(header_value: &str, total_size: u64) -> Result<ByteRange, ProxyError> {
    let spec = header_value
        .strip_prefix("bytes=")
        .ok_or_else(|| ProxyError::RangeUnsatisfiable { total_size })?;

    if spec.contains(',') {
        return Err(ProxyError::RangeUnsatisfiable { total_size });
    }

    let (start_str, end_str) = spec
        .split_once('-')
        .ok_or(ProxyError::RangeUnsatisfiable { total_size })?;

    if total_size == 0 {
        return Err(ProxyError::RangeUnsatisfiable { total_size });
    }

    let range = if start_str.is_empty() {
        // suffix range: last N bytes
        let n: u64 = end_str
            .parse()
            .map_err(|_| ProxyError::RangeUnsatisfiable { total_size })?;
        if n == 0 {
            return Err(ProxyError::RangeUnsatisfiable { total_size });
        }
        let n = n.min(total_size);
        ByteRange {
            start: total_size - n,
            end: total_size - 1,
        }
    } else {
        let start: u64 = start_str
            .parse()
            .map_err(|_| ProxyError::RangeUnsatisfiable { total_size })?;
        let end: u64 = if end_str.is_empty() {
            total_size - 1
        } else {
            end_str
                .parse()
                .map_err(|_| ProxyError::RangeUnsatisfiable { total_size })?
        };
        ByteRange { start, end }
    };

    if range.start > range.end || range.end >= total_size {
        return Err(ProxyError::RangeUnsatisfiable { total_size });
    }

    Ok(range)
}

/// Minimal inclusive span of fixed-size chunks covering a byte range,
/// used by the KV chunk store to avoid reading chunks outside the
/// requested window.
pub fn chunk_span(range: &ByteRange, chunk_size: u64) -> (u64, u64) {
    (range.start / chunk_size, range.end / chunk_size)
}
