use crate::http::{
    request::{HttpError, Request},
    response::{Response, StatusCode, text_response},
};

/// Body sent in answer to every request.
pub const GREETING: &str = "Secure connection established";

/// A trait that determines the response to each request.
pub trait Handler: Send + Sync {
    /// Produces the response for a fully parsed request.
    ///
    /// # Errors
    /// Throws an `HttpError` if processing the request fails; the connection is then closed without a response.
    fn call(&self, req: &Request) -> impl Future<Output = Result<Response, HttpError>> + Send;
}

/// The handler used by the binary: answers any method on any path with `200 OK` and [`GREETING`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SecureGreeting;

impl Handler for SecureGreeting {
    async fn call(&self, _req: &Request) -> Result<Response, HttpError> {
        Ok(text_response(StatusCode::Ok, GREETING))
    }
}
