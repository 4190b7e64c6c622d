use crate::response::Response;

/// A client-facing error, carried as a body plus an HTTP status code.
///
/// Everything the coercion and binding layers can signal to a caller is one
/// of these; programmer errors (binder misconfiguration) panic instead.
#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    body: String,
    code: u16,
}

impl Error {
    pub fn new(body: String, code: u16) -> Self {
        Self { body, code }
    }

    pub fn body(&self) -> &String {
        &self.body
    }

    pub fn code(&self) -> &u16 {
        &self.code
    }

    /// True for 400-class errors, which propagate out of coercion unchanged.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn missing_argument(name: &str) -> Self {
        Self::new(format!("Missing argument '{}'", name), 400)
    }

    pub fn wrong_type(name: &str) -> Self {
        Self::new(format!("Argument '{}' is the wrong type!", name), 400)
    }

    pub fn bad_format(name: &str) -> Self {
        Self::new(format!("Badly formatted parameter '{}'", name), 400)
    }

    pub fn validation_failed(name: &str) -> Self {
        Self::new(format!("Validation check on '{}' failed", name), 400)
    }

    pub fn no_parameters() -> Self {
        Self::new("No request parameters found!".to_owned(), 400)
    }

    pub fn not_found() -> Self {
        Self::new("Not Found".to_owned(), 404)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.body, self.code)
    }
}

impl std::error::Error for Error {}

impl From<Error> for Response<String> {
    fn from(val: Error) -> Self {
        Response::builder()
            .status(val.code)
            .body(val.body)
    }
}
