/// Module containing logic to parse HTTP headers
pub mod headers;
/// Module containing logic to parse HTTP request lines
pub mod request_line;
/// Module containing logic to read one request from a stream
pub mod request;
/// Module serialising responses.
pub mod response;

/// Line terminator of the request line and every header line.
pub(crate) const CRLF: &[u8] = b"\r\n";

/// Offset of the first `\r\n` in the data, if any.
pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|window| window == CRLF)
}
