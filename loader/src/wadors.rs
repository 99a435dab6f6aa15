//! Single-frame pixel data retrieval over multipart responses.
//!
//! A frame endpoint returns one pixel data part wrapped in a
//! `multipart/related` body. The part is located by scanning for the
//! header terminator and the boundary markers; a response missing
//! either is malformed.

use snafu::{OptionExt, Snafu};

use crate::transport::HttpTransport;

/// A single pixel data part extracted from a multipart response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFrame {
    /// the Content-Type declared for the part, if any
    pub content_type: Option<String>,
    pub pixel_data: Vec<u8>,
}

/// The multipart response did not have the expected structure.
#[derive(Debug, Snafu)]
#[snafu(display("Malformed multipart response: {detail}"))]
pub struct MalformedMultipartResponse {
    detail: &'static str,
}

/// An error while retrieving a frame.
#[derive(Debug, Snafu)]
pub enum FetchFrameError {
    #[snafu(display("Failed to retrieve frame: {source}"))]
    FrameRequestFailed {
        source: crate::transport::TransportError,
    },
    #[snafu(transparent)]
    Malformed { source: MalformedMultipartResponse },
}

/// Find the first occurrence of `needle` in `haystack` at or after `offset`.
fn find_index_of(haystack: &[u8], needle: &[u8], offset: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (offset..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn find_boundary<'a>(header_lines: &[&'a str]) -> Option<&'a str> {
    header_lines.iter().find(|line| line.starts_with("--")).copied()
}

fn find_content_type(header_lines: &[&str]) -> Option<String> {
    header_lines
        .iter()
        .find_map(|line| line.strip_prefix("Content-Type:"))
        .map(|value| value.trim().to_string())
}

/// Extract the single pixel data part from a multipart response body.
pub fn extract_multipart_frame(
    response: &[u8],
) -> Result<MultipartFrame, MalformedMultipartResponse> {
    // first look for the multipart mime header
    let token_index = find_index_of(response, b"\r\n\r\n", 0).context(MalformedMultipartResponseSnafu {
        detail: "no multipart mime header",
    })?;

    let header = String::from_utf8_lossy(&response[..token_index]);
    let header_lines: Vec<&str> = header.split("\r\n").collect();

    let boundary = find_boundary(&header_lines).context(MalformedMultipartResponseSnafu {
        detail: "no boundary marker",
    })?;

    // skip over the \r\n\r\n
    let offset = token_index + 4;

    // find the terminal boundary marker
    let end_index =
        find_index_of(response, boundary.as_bytes(), offset).context(MalformedMultipartResponseSnafu {
            detail: "terminating boundary not found",
        })?;

    // remove the \r\n preceding the terminal boundary
    let length = end_index.saturating_sub(offset).saturating_sub(2);

    Ok(MultipartFrame {
        content_type: find_content_type(&header_lines),
        pixel_data: response[offset..offset + length].to_vec(),
    })
}

/// Fetch one frame's pixel data from a frame endpoint URI.
pub async fn fetch_frame(
    transport: &HttpTransport,
    uri: &str,
    media_type: Option<&str>,
) -> Result<MultipartFrame, FetchFrameError> {
    let media_type = media_type.unwrap_or("application/octet-stream");
    let response = transport
        .fetch_with_accept(uri, Some(media_type))
        .await
        .map_err(|source| FetchFrameError::FrameRequestFailed { source })?;

    Ok(extract_multipart_frame(&response)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multipart_body(boundary: &str, content_type: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{boundary}--").as_bytes());
        body
    }

    #[test]
    fn extracts_frame_payload_and_content_type() {
        let body = multipart_body("MESSAGE", "application/octet-stream", &[1, 2, 3, 4, 5]);
        let frame = extract_multipart_frame(&body).unwrap();
        assert_eq!(frame.pixel_data, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            frame.content_type.as_deref(),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn payload_may_contain_crlf_sequences() {
        let payload = b"ab\r\n\r\ncd";
        let body = multipart_body("B", "application/octet-stream", payload);
        let frame = extract_multipart_frame(&body).unwrap();
        assert_eq!(frame.pixel_data, payload);
    }

    #[test]
    fn missing_header_terminator_is_malformed() {
        let err = extract_multipart_frame(b"--BOUNDARY").unwrap_err();
        assert!(err.to_string().contains("no multipart mime header"));
    }

    #[test]
    fn missing_boundary_is_malformed() {
        let err = extract_multipart_frame(b"Content-Type: a/b\r\n\r\ndata").unwrap_err();
        assert!(err.to_string().contains("no boundary marker"));
    }

    #[test]
    fn missing_terminal_boundary_is_malformed() {
        let body = b"--B\r\nContent-Type: a/b\r\n\r\ndata without end";
        let err = extract_multipart_frame(body).unwrap_err();
        assert!(err.to_string().contains("terminating boundary not found"));
    }
}
