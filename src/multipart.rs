//! # Multipart Request Decoder
//!
//! Pulls a single uploaded file out of a raw `multipart/form-data` body.
//!
//! This is a deliberately small, byte-level decoder rather than a full
//! RFC 7578 parser. Clients in the wild depend on its exact behavior, so the
//! quirks below are part of the contract:
//!
//! - The boundary is whatever follows the last `boundary=` in `Content-Type`
//!   (no quote stripping, no parameter parsing).
//! - The body is split on `--<boundary>` and the first segment containing
//!   both `Content-Disposition` and `filename="` wins.
//! - Any run of trailing `\r`, `\n` or `-` bytes is stripped from the payload,
//!   even when those bytes belong to the file itself.

use std::fmt;

const MULTIPART_FORM_DATA: &str = "multipart/form-data";
const BOUNDARY_PARAM: &str = "boundary=";
const CONTENT_DISPOSITION: &[u8] = b"Content-Disposition";
const FILENAME_MARKER: &[u8] = b"filename=\"";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// A file extracted from one multipart section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Taken verbatim from the `filename="..."` parameter. Not sanitized.
    pub filename: String,
    /// Section payload with trailing `\r`, `\n` and `-` bytes removed.
    pub bytes: Vec<u8>,
}

/// Reasons a request body could not be turned into an [`UploadedFile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// `Content-Type` is missing or does not mention `multipart/form-data`.
    NotMultipart,
    /// No section carries both `Content-Disposition` and `filename="`.
    NoFileFound,
    /// The selected section could not be split into headers and payload.
    MalformedPart(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::NotMultipart => write!(f, "Expected multipart/form-data"),
            DecodeError::NoFileFound => write!(f, "No file found in request"),
            DecodeError::MalformedPart(reason) => write!(f, "Malformed file part: {}", reason),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Extract the boundary token from a `Content-Type` header value.
///
/// Fails with [`DecodeError::NotMultipart`] before looking at anything else
/// when the header is absent or is not `multipart/form-data`. When the header
/// has no `boundary=` parameter at all, the whole value is returned.
pub fn boundary(content_type: Option<&str>) -> Result<&str, DecodeError> {
    let content_type = content_type.ok_or(DecodeError::NotMultipart)?;
    if !content_type.contains(MULTIPART_FORM_DATA) {
        return Err(DecodeError::NotMultipart);
    }

    // rsplit always yields at least one item
    Ok(content_type.rsplit(BOUNDARY_PARAM).next().unwrap_or(content_type))
}

/// Decode the first file part of a multipart body.
pub fn decode(content_type: Option<&str>, body: &[u8]) -> Result<UploadedFile, DecodeError> {
    let boundary = boundary(content_type)?;

    let mut delimiter = Vec::with_capacity(boundary.len() + 2);
    delimiter.extend_from_slice(b"--");
    delimiter.extend_from_slice(boundary.as_bytes());

    let section = split_on(body, &delimiter)
        .into_iter()
        .find(|segment| is_file_part(segment))
        .ok_or(DecodeError::NoFileFound)?;

    parse_file_part(section)
}

fn is_file_part(segment: &[u8]) -> bool {
    find(segment, CONTENT_DISPOSITION).is_some() && find(segment, FILENAME_MARKER).is_some()
}

fn parse_file_part(section: &[u8]) -> Result<UploadedFile, DecodeError> {
    let split_at = find(section, HEADER_TERMINATOR).ok_or_else(|| {
        DecodeError::MalformedPart("missing blank line after part headers".to_string())
    })?;
    let headers = &section[..split_at];
    let payload = &section[split_at + HEADER_TERMINATOR.len()..];

    let name_start = find(headers, FILENAME_MARKER)
        .map(|pos| pos + FILENAME_MARKER.len())
        .ok_or_else(|| {
            DecodeError::MalformedPart("filename parameter not in part headers".to_string())
        })?;
    let rest = &headers[name_start..];
    let name_bytes = match rest.iter().position(|&b| b == b'"') {
        Some(end) => &rest[..end],
        None => rest,
    };
    let filename = String::from_utf8(name_bytes.to_vec())
        .map_err(|_| DecodeError::MalformedPart("filename is not valid UTF-8".to_string()))?;

    Ok(UploadedFile {
        filename,
        bytes: trim_trailing_delimiters(payload).to_vec(),
    })
}

/// Strip any trailing `\r`, `\n` and `-` bytes.
pub fn trim_trailing_delimiters(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| !matches!(b, b'\r' | b'\n' | b'-'))
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Split `haystack` on every non-overlapping occurrence of `delimiter`.
///
/// Mirrors `str::split`: leading and trailing empty segments are kept.
pub fn split_on<'a>(haystack: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut segments = Vec::new();
    if delimiter.is_empty() {
        segments.push(haystack);
        return segments;
    }

    let mut rest = haystack;
    while let Some(pos) = find(rest, delimiter) {
        segments.push(&rest[..pos]);
        rest = &rest[pos + delimiter.len()..];
    }
    segments.push(rest);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    const CT: &str = "multipart/form-data; boundary=XyZ";

    fn body_with_file(filename: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"--XyZ\r\n");
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\r\n--XyZ--\r\n");
        body
    }

    #[test]
    fn test_boundary_requires_multipart() {
        assert_eq!(boundary(None), Err(DecodeError::NotMultipart));
        assert_eq!(boundary(Some("application/json")), Err(DecodeError::NotMultipart));
        assert_eq!(boundary(Some(CT)), Ok("XyZ"));
    }

    #[test]
    fn test_boundary_takes_text_after_last_param() {
        let ct = "multipart/form-data; boundary=first; boundary=second";
        assert_eq!(boundary(Some(ct)), Ok("second"));
    }

    #[test]
    fn test_boundary_is_not_unquoted() {
        let ct = "multipart/form-data; boundary=\"quoted\"";
        assert_eq!(boundary(Some(ct)), Ok("\"quoted\""));
    }

    #[test]
    fn test_boundary_without_param_is_whole_header() {
        let ct = "multipart/form-data";
        assert_eq!(boundary(Some(ct)), Ok("multipart/form-data"));
    }

    #[test]
    fn test_decode_single_file() {
        let body = body_with_file("clip.mp3", b"RIFF...audio bytes...");
        let file = decode(Some(CT), &body).unwrap();

        assert_eq!(file.filename, "clip.mp3");
        assert_eq!(file.bytes, b"RIFF...audio bytes...");
    }

    #[test]
    fn test_decode_strips_trailing_payload_dashes_and_newlines() {
        // Genuine payload bytes are lost too; this is the documented policy.
        let body = body_with_file("a.wav", b"data--\n\r-");
        let file = decode(Some(CT), &body).unwrap();
        assert_eq!(file.bytes, b"data");
    }

    #[test]
    fn test_decode_keeps_interior_delimiter_bytes() {
        let body = body_with_file("a.wav", b"\r\n-mid-\r\nend");
        let file = decode(Some(CT), &body).unwrap();
        assert_eq!(file.bytes, b"\r\n-mid-\r\nend");
    }

    #[test]
    fn test_decode_picks_first_file_part() {
        let body = b"--XyZ\r\n\
Content-Disposition: form-data; name=\"note\"\r\n\r\n\
just a field\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"a\"; filename=\"first.wav\"\r\n\r\n\
one\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"b\"; filename=\"second.wav\"\r\n\r\n\
two\r\n\
--XyZ--\r\n";

        let file = decode(Some(CT), body).unwrap();
        assert_eq!(file.filename, "first.wav");
        assert_eq!(file.bytes, b"one");
    }

    #[test]
    fn test_decode_without_file_part() {
        let body = b"--XyZ\r\n\
Content-Disposition: form-data; name=\"note\"\r\n\r\n\
hello\r\n\
--XyZ--\r\n";
        assert_eq!(decode(Some(CT), body), Err(DecodeError::NoFileFound));
    }

    #[test]
    fn test_decode_rejects_non_multipart_before_parsing() {
        let body = body_with_file("clip.mp3", b"abc");
        assert_eq!(
            decode(Some("text/plain"), &body),
            Err(DecodeError::NotMultipart)
        );
    }

    #[test]
    fn test_decode_part_without_header_terminator() {
        let body = b"--XyZ\r\nContent-Disposition: form-data; filename=\"x.wav\"\r\nabc";
        assert!(matches!(
            decode(Some(CT), body),
            Err(DecodeError::MalformedPart(_))
        ));
    }

    #[test]
    fn test_decode_filename_marker_only_in_payload() {
        let body = b"--XyZ\r\n\
Content-Disposition: form-data; name=\"f\"\r\n\r\n\
filename=\"sneaky.wav\"\r\n\
--XyZ--\r\n";
        assert!(matches!(
            decode(Some(CT), body),
            Err(DecodeError::MalformedPart(_))
        ));
    }

    #[test]
    fn test_decode_unterminated_filename_runs_to_end_of_headers() {
        let body = b"--XyZ\r\n\
Content-Disposition: form-data; name=\"f\"\r\n\
X-Note: filename=\"open.wav\r\n\r\n\
abc\r\n\
--XyZ--";
        let file = decode(Some(CT), body).unwrap();
        assert_eq!(file.filename, "open.wav");
        assert_eq!(file.bytes, b"abc");
    }

    #[test]
    fn test_trim_trailing_delimiters() {
        assert_eq!(trim_trailing_delimiters(b"abc\r\n--"), b"abc");
        assert_eq!(trim_trailing_delimiters(b"--\r\n"), b"");
        assert_eq!(trim_trailing_delimiters(b""), b"");
        assert_eq!(trim_trailing_delimiters(b"a-b"), b"a-b");
    }

    #[test]
    fn test_split_on_keeps_edge_segments() {
        let parts = split_on(b"--Xa--Xb--X", b"--X");
        assert_eq!(parts, vec![&b""[..], &b"a"[..], &b"b"[..], &b""[..]]);

        let parts = split_on(b"no delimiter", b"--X");
        assert_eq!(parts, vec![&b"no delimiter"[..]]);
    }
}
