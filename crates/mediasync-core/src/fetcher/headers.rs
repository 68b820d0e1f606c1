//! Incremental parsing of response header lines.

/// Headers of the final response in a redirect chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    pub status: Option<u32>,
    pub content_length: Option<u64>,
    pub content_disposition: Option<String>,
}

impl ResponseHeaders {
    /// Feed one raw header line. A status line starts a new response (curl
    /// reports every hop of a redirect), discarding earlier values.
    pub fn feed(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if line.starts_with("HTTP/") {
            *self = ResponseHeaders {
                status: line
                    .split_whitespace()
                    .nth(1)
                    .and_then(|c| c.parse::<u32>().ok()),
                ..ResponseHeaders::default()
            };
            return;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                self.content_length = value.parse::<u64>().ok();
            } else if name.eq_ignore_ascii_case("content-disposition") {
                self.content_disposition = Some(value.to_string());
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(200..=299))
    }

    pub fn filename(&self) -> Option<String> {
        self.content_disposition
            .as_deref()
            .and_then(parse_content_disposition_filename)
    }
}

/// Extracts the filename from a raw Content-Disposition value.
///
/// `filename*=UTF-8''percent-encoded` (RFC 5987) wins over `filename=`.
pub fn parse_content_disposition_filename(header_value: &str) -> Option<String> {
    let mut plain: Option<String> = None;
    for param in header_value.split(';') {
        let Some((name, v)) = param.trim().split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let v = v.trim();
        if name == "filename*" {
            let lower = v.to_ascii_lowercase();
            if lower.starts_with("utf-8''") {
                if let Some(decoded) = percent_decode(&v[7..]).filter(|d| !d.is_empty()) {
                    return Some(decoded);
                }
            }
        } else if name == "filename" {
            let unquoted = v
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(v)
                .replace("\\\"", "\"");
            if !unquoted.is_empty() {
                plain = Some(unquoted);
            }
        }
    }
    plain
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(lines: &[&str]) -> ResponseHeaders {
        let mut h = ResponseHeaders::default();
        for l in lines {
            h.feed(l);
        }
        h
    }

    #[test]
    fn status_and_length() {
        let h = parse(&["HTTP/1.1 200 OK\r\n", "Content-Length: 12345\r\n", "\r\n"]);
        assert_eq!(h.status, Some(200));
        assert_eq!(h.content_length, Some(12345));
        assert!(h.is_success());
    }

    #[test]
    fn redirect_resets_previous_hop() {
        let h = parse(&[
            "HTTP/1.1 302 Found",
            "Content-Length: 0",
            "Location: https://cdn.example.com/x",
            "",
            "HTTP/2 200",
            "content-length: 77",
        ]);
        assert_eq!(h.status, Some(200));
        assert_eq!(h.content_length, Some(77));
    }

    #[test]
    fn error_status_is_not_success() {
        let h = parse(&["HTTP/1.1 503 Service Unavailable"]);
        assert!(!h.is_success());
        assert_eq!(h.content_length, None);
    }

    #[test]
    fn content_disposition_plain_and_extended() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=\"Album.zip\"").as_deref(),
            Some("Album.zip")
        );
        assert_eq!(
            parse_content_disposition_filename(
                "attachment; filename=\"fallback.zip\"; filename*=UTF-8''Caf%C3%A9%20Live.zip"
            )
            .as_deref(),
            Some("Café Live.zip")
        );
        assert_eq!(parse_content_disposition_filename("inline"), None);
    }

    #[test]
    fn filename_from_headers() {
        let h = parse(&[
            "HTTP/1.1 200 OK",
            "Content-Disposition: attachment; filename*=UTF-8''track.flac",
        ]);
        assert_eq!(h.filename().as_deref(), Some("track.flac"));
    }
}
