use std::collections::BTreeMap;

use crate::http::{CRLF, find_crlf, request::HttpError};

/// A `BTreeMap` of two strings representing key, value pairs used in HTTP Headers.
///
/// Keys are kept sorted so that serialising the same headers always yields the same bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// Returns a new, empty `Headers` struct
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a new entry into the Headers struct by passing both key and value
    ///
    /// # Examples
    /// ```
    /// let mut headers = tls_endpoint::http::headers::Headers::new();
    /// headers.insert("content-type", "text/plain");
    /// ```
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Retrieves the value of a specified key.
    ///
    /// Returns None if the specified key was not found in the header.
    ///
    /// # Examples
    /// ```
    /// let mut headers = tls_endpoint::http::headers::Headers::new();
    /// headers.insert("host", "localhost");
    /// assert_eq!(headers.get("host"), Some("localhost"));
    /// ```
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Appends a key / value pair into the Header.
    ///
    /// # Examples
    /// ```
    /// let mut headers = tls_endpoint::http::headers::Headers::new();
    /// headers.insert("accept", "text/html");
    /// headers.append("accept", "text/plain");
    /// assert_eq!(headers.get("accept"), Some("text/html, text/plain"));
    /// ```
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        if let Some(existing) = self.0.get_mut(&key) {
            if !existing.is_empty() {
                existing.push_str(", ");
            }
            existing.push_str(&value);
        } else {
            self.0.insert(key, value);
        }
    }

    /// Iterates over the headers in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns the length of the Headers, that being the raw amount of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validates critical headers not appearing multiple times.
    #[must_use]
    pub fn duplicate_headers(&self) -> bool {
        const CRITICAL_HEADERS: [&str; 4] =
            ["host", "content-length", "transfer-encoding", "connection"];

        CRITICAL_HEADERS
            .iter()
            .any(|header| self.get(header).is_some_and(|value| value.contains(", ")))
    }

    /// Parses every complete header line at the start of the data.
    ///
    /// Returns the number of bytes consumed, so an incomplete trailing line stays in the caller's buffer,
    /// and whether the empty line terminating the header section was reached. Nothing after that line is looked at.
    ///
    /// # Errors
    ///
    /// Returns an `HttpError` if parsing the header fails.
    ///
    /// This is related to the parsed data from the buffer containing RFC-incompatible formatting.
    pub fn parse_header(&mut self, data: &[u8]) -> Result<(usize, bool), HttpError> {
        let mut consumed = 0;

        while let Some(line_end) = find_crlf(&data[consumed..]) {
            let line = &data[consumed..consumed + line_end];
            consumed += line_end + CRLF.len();

            if line.is_empty() {
                return Ok((consumed, true));
            }
            self.create_header_from_line(line)?;
        }

        Ok((consumed, false))
    }

    fn create_header_from_line(&mut self, line: &[u8]) -> Result<(), HttpError> {
        let line = line.trim_ascii();
        let colon = line
            .iter()
            .position(|&byte| byte == b':')
            .ok_or(HttpError::MalformedHeader)?;
        let name = &line[..colon];
        let value = line[colon + 1..].trim_ascii();

        if name.is_empty() || !name.iter().all(|&byte| is_token_char(char::from(byte))) {
            return Err(HttpError::MalformedHeader);
        }
        if value.iter().any(|&byte| is_control_byte(byte)) {
            return Err(HttpError::MalformedHeader);
        }

        // token characters are ASCII
        let key: String = name
            .iter()
            .map(|&byte| char::from(byte.to_ascii_lowercase()))
            .collect();

        if key == "host" && value.is_empty() {
            return Err(HttpError::InvalidHeaders);
        }

        self.append(key, decode_field_value(value));
        Ok(())
    }
}

/// Decodes a field value as UTF-8, falling back to ISO-8859-1 for `obs-text` bytes.
fn decode_field_value(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(value) => value.to_owned(),
        Err(_) => value.iter().copied().map(char::from).collect(),
    }
}

/// Control characters other than horizontal tab are not allowed in field values.
const fn is_control_byte(byte: u8) -> bool {
    (byte < 0x20 && byte != b'\t') || byte == 0x7f
}

/// Whether the passed character is a `tchar` according to <https://www.rfc-editor.org/rfc/rfc9110#section-5.6.2>
pub(crate) const fn is_token_char(c: char) -> bool {
    if c.is_ascii_alphanumeric() {
        return true;
    }

    matches!(
        c,
        '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
    )
}
