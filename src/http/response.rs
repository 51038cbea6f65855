use std::fmt;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::Headers;

/// Representation of a HTTP response with status code, headers and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The status sent in the status line.
    pub status: StatusCode,
    /// Response headers, serialised in key order.
    pub headers: Headers,
    /// The raw response body.
    pub body: Vec<u8>,
}

/// Enum containing the status codes used in this application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusCode {
    /// 200
    Ok = 200,
}

/// Implements Display for the Status Code to enable formatting the Codes as integer values.
impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u16)
    }
}

impl StatusCode {
    /// Creates the string representation of the passed status code.
    #[must_use]
    pub const fn reason_phrase(self) -> &'static str {
        match self {
            Self::Ok => "OK",
        }
    }
}

/// Write the status line to the passed writer.
///
/// Hardcodes HTTP/1.1 due to the limit of the Server to that version.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub async fn write_status_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status_code: StatusCode,
) -> std::io::Result<()> {
    let line = format!("HTTP/1.1 {status_code} {}\r\n", status_code.reason_phrase());
    writer.write_all(line.as_bytes()).await
}

/// Writes the headers to the passed writer.
///
/// Prints the keys and values in HTTP valid format, followed by the empty line separating headers from the HTTP body.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub async fn write_headers<W: AsyncWrite + Unpin>(
    writer: &mut W,
    headers: &Headers,
) -> std::io::Result<()> {
    let mut section = String::new();
    for (key, value) in headers.iter() {
        section.push_str(key);
        section.push_str(": ");
        section.push_str(value);
        section.push_str("\r\n");
    }
    section.push_str("\r\n");
    writer.write_all(section.as_bytes()).await
}

/// Writes status line, headers and body, then flushes the writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> std::io::Result<()> {
    write_status_line(writer, response.status).await?;
    write_headers(writer, &response.headers).await?;
    writer.write_all(&response.body).await?;
    writer.flush().await
}

/// Helper function to remove boilerplate for creating plain text responses with associated headers.
#[must_use]
pub fn text_response(status_code: StatusCode, text: &str) -> Response {
    let mut headers = Headers::new();
    headers.insert("content-type", "text/plain");
    headers.insert("content-length", text.len().to_string());
    Response {
        status: status_code,
        headers,
        body: text.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{
        headers::Headers,
        response::{StatusCode, text_response, write_headers, write_response, write_status_line},
    };

    #[test]
    fn reason_phrase_converts_status_to_string() {
        assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
        assert_eq!(StatusCode::Ok.to_string(), "200");
    }

    #[tokio::test]
    async fn write_status_line_produces_correct_http_line() {
        let mut buffer = Vec::new();

        write_status_line(&mut buffer, StatusCode::Ok).await.unwrap();

        assert_eq!(buffer, b"HTTP/1.1 200 OK\r\n");
    }

    #[tokio::test]
    async fn write_headers_produces_correct_headers() {
        let mut buffer = Vec::new();
        let mut headers = Headers::new();
        headers.insert("host", "localhost:8443");

        write_headers(&mut buffer, &headers).await.unwrap();

        assert_eq!(buffer, b"host: localhost:8443\r\n\r\n");
    }

    #[tokio::test]
    async fn text_response_sets_matching_content_length() {
        let mut buffer = Vec::new();
        let response = text_response(StatusCode::Ok, "hello");

        write_response(&mut buffer, &response).await.unwrap();

        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "HTTP/1.1 200 OK\r\ncontent-length: 5\r\ncontent-type: text/plain\r\n\r\nhello"
        );
    }
}
