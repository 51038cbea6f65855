use crate::http::{headers::is_token_char, request::HttpError};

/// A Http Request Line representation with method, target and http version
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequestLine {
    /// The method of the parsed request
    pub method: String,
    /// The target endpoint of the request
    pub request_target: String,
    /// The HTTP version used in the request, without the `HTTP/` prefix
    pub http_version: String,
}

/// Parses a passed string into a Request Line Struct
///
/// Returns an Optional Request Line in case the passed string did not contain the entire line
/// Returns the size of the parsed data to differentiate between unfinished parsing and completion.
///
/// Any method token is accepted; whether the version is supported is decided by the caller.
///
/// # Errors
///
/// Throws an `Http Error` if the parsed request line is invalid.
///
/// This is related to the parsed data from the buffer containing RFC-incompatible formatting.
pub fn parse_request_line(request: &str) -> Result<(Option<RequestLine>, usize), HttpError> {
    const CRLF_LEN: usize = 2;

    let Some((first, _rest)) = request.split_once("\r\n") else {
        return Ok((None, 0));
    };

    let parts: Vec<&str> = first.split(' ').collect();
    let [method, request_target, version] = parts.as_slice() else {
        return Err(HttpError::MalformedRequestLine);
    };

    if request_target.is_empty() {
        return Err(HttpError::MalformedRequestLine);
    }

    let http_version = version
        .strip_prefix("HTTP/")
        .ok_or(HttpError::MalformedRequestLine)?;

    if method.is_empty() || !method.chars().all(is_token_char) {
        return Err(HttpError::InvalidMethod((*method).to_string()));
    }

    let line_length = first.len() + CRLF_LEN;

    Ok((
        Some(RequestLine {
            method: (*method).to_string(),
            request_target: (*request_target).to_string(),
            http_version: http_version.to_string(),
        }),
        line_length,
    ))
}
