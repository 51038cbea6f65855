use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::{
    CRLF, find_crlf,
    headers::Headers,
    request_line::{RequestLine, parse_request_line},
};

/// Upper bound for the request line plus header section when no other limit is given.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

/// HTTP versions this server answers.
const SUPPORTED_VERSIONS: [&str; 2] = ["1.1", "1.0"];

/// Representation of a HTTP request with request line, headers and body
///
/// Includes a parse state to keep track of the progress of the parsing
#[derive(Debug)]
pub struct Request {
    /// The state of the parser.
    parse_state: ParseState,
    /// A custom struct representing the request line.
    pub request_line: RequestLine,
    /// A custom struct representing a list of headers.
    pub headers: Headers,
    /// Announced `content-length`, zero when absent.
    content_length: usize,
    /// Number of body bytes read and discarded so far. The body is drained, never stored.
    pub body_length: usize,
}

/// Represents the different stages of the parser.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum ParseState {
    /// The parser was initialized.
    Initialized,
    /// The parser is parsing headers.
    RequestStateParsingHeaders,
    /// The parser is parsing the body.
    ParseBody,
    /// The parser finished parsing.
    Done,
}

/// Represents the kind of error that can occur during request parsing
#[derive(Error, Debug)]
pub enum HttpError {
    /// The request contains an unsupported / invalid HTTP version
    #[error("unsupported HTTP version: {0}")]
    UnsupportedVersion(String),

    /// The request method is not a valid token.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The request line does not follow the RFC standard.
    #[error("request line is malformed")]
    MalformedRequestLine,

    /// The header does not follow the RFC standard.
    #[error("header is malformed")]
    MalformedHeader,

    /// The headers are well formed but contradict each other or are missing required values.
    #[error("headers are invalid")]
    InvalidHeaders,

    /// The request line and headers exceed the allowed size.
    #[error("request header section exceeds {0} bytes")]
    HeadersTooLarge(usize),

    /// The request line is not valid UTF-8.
    #[error("request line is not valid UTF-8")]
    InvalidEncoding,

    /// The parser unexpectedly reached an end of file.
    #[error("unexpected end of file")]
    UnexpectedEOF,

    /// The passed body length does not match the header specification.
    #[error("body length does not match header")]
    InvalidBodyLength,

    /// The client did not deliver a complete request in time.
    #[error("timed out waiting for the request")]
    Timeout,

    /// There was a generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// There was an error parsing a string to an integer.
    #[error("Parsing error: {0}")]
    ParseError(#[from] std::num::ParseIntError),

    /// An internal invariant was violated.
    /// This is most likely used as a safety net to catch errors that logically should not be able to happen.
    #[error("Internal invariant violated")]
    InternalInvariantViolated,
}

/// Parses the contents of a reader to a Request
///
/// The reader may be of any type that implements `AsyncRead`. At most `max_header_bytes`
/// are buffered before the header section has to be complete. The body is read in bounded chunks
/// and discarded, so memory use does not depend on the announced `content-length`.
///
/// # Errors
///
/// Throws a `HttpError` if the request was not valid.
///
/// This is related to the parsed data from the buffer containing RFC-incompatible formatting.
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_header_bytes: usize,
) -> Result<Request, HttpError> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut temp = [0u8; 1024];
    let mut header_bytes = 0;
    let mut request = Request {
        parse_state: ParseState::Initialized,
        request_line: RequestLine::default(),
        headers: Headers::new(),
        content_length: 0,
        body_length: 0,
    };

    loop {
        if request.parse_state == ParseState::Done {
            return Ok(request);
        }

        let state_before = request.parse_state;
        let parsed = request.parse(&buffer)?;
        if state_before != ParseState::ParseBody {
            header_bytes += parsed;
        }
        if parsed > 0 {
            buffer.drain(0..parsed);
            continue;
        }

        if request.parse_state == ParseState::Done {
            return Ok(request);
        }

        if request.parse_state != ParseState::ParseBody
            && header_bytes + buffer.len() > max_header_bytes
        {
            return Err(HttpError::HeadersTooLarge(max_header_bytes));
        }

        let read = reader.read(&mut temp).await?;
        if read == 0 {
            return Err(HttpError::UnexpectedEOF);
        }

        buffer.extend_from_slice(&temp[..read]);
    }
}

impl Request {
    /// Parses passed byte data.
    ///
    /// Returns the size of the parsed data.
    ///
    /// # Errors
    ///
    /// Throws an `HttpError` if the parsing fails.
    ///
    /// This is related to the parsed data from the buffer containing RFC-incompatible formatting.
    fn parse(&mut self, data: &[u8]) -> Result<usize, HttpError> {
        match self.parse_state {
            ParseState::Initialized => {
                let Some(line_end) = find_crlf(data) else {
                    return Ok(0);
                };
                let line = std::str::from_utf8(&data[..line_end + CRLF.len()])
                    .map_err(|_| HttpError::InvalidEncoding)?;

                let (request_line_result, request_line_size) = parse_request_line(line)?;
                let request_line = request_line_result.ok_or(HttpError::InternalInvariantViolated)?;
                if !SUPPORTED_VERSIONS.contains(&request_line.http_version.as_str()) {
                    return Err(HttpError::UnsupportedVersion(request_line.http_version));
                }
                self.parse_state = ParseState::RequestStateParsingHeaders;
                self.request_line = request_line;
                Ok(request_line_size)
            }
            ParseState::RequestStateParsingHeaders => {
                let (header_size, done) = self.headers.parse_header(data)?;
                if done {
                    if self.headers.duplicate_headers() {
                        return Err(HttpError::InvalidHeaders);
                    }
                    self.content_length = content_length(&self.headers)?;
                    self.parse_state = if self.content_length == 0 {
                        ParseState::Done
                    } else {
                        ParseState::ParseBody
                    };
                }
                Ok(header_size)
            }
            ParseState::ParseBody => {
                let remaining = self.content_length - self.body_length;
                if data.len() > remaining {
                    return Err(HttpError::InvalidBodyLength);
                }

                self.body_length += data.len();

                if self.body_length == self.content_length {
                    self.parse_state = ParseState::Done;
                }
                Ok(data.len())
            }
            ParseState::Done => {
                if !data.is_empty() {
                    return Err(HttpError::InvalidBodyLength);
                }
                Ok(0)
            }
        }
    }
}

/// The announced body length. `content-length` must be `1*DIGIT`; a sign or any other character is rejected.
fn content_length(headers: &Headers) -> Result<usize, HttpError> {
    let Some(value) = headers.get("content-length") else {
        return Ok(0);
    };

    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(HttpError::InvalidHeaders);
    }
    Ok(value.parse()?)
}
