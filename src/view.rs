use std::pin::Pin;

use futures::Future;
use regex::Regex;

use crate::{error::Error, request::Request, response::Response};

/// Per-segment subpath predicate.
///
/// A subpath matches only when it has exactly as many segments as there
/// are patterns and every segment matches its pattern in order. Patterns
/// are compiled once, at construction.
pub struct Subpath {
    patterns: Vec<Regex>,
}

impl Subpath {
    /// Build from fnmatch-style globs (`*`, `?`, `[...]`).
    pub fn globs<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| Regex::new(&glob_to_regex(pattern.as_ref())))
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    /// Build from regexes, each anchored to the whole segment.
    pub fn regexes<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| Regex::new(&format!("^(?:{})$", pattern.as_ref())))
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches<S: AsRef<str>>(&self, subpath: &[S]) -> bool {
        subpath.len() == self.patterns.len()
            && self
                .patterns
                .iter()
                .zip(subpath)
                .all(|(pattern, segment)| pattern.is_match(segment.as_ref()))
    }

    pub fn matches_request<T>(&self, request: &Request<T>) -> bool {
        self.matches(request.subpath())
    }
}

fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut pattern = String::from("^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            '[' => {
                // A '!' or ']' right after the bracket is part of the class.
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '!' || chars[j] == ']') {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    pattern.push_str("\\[");
                } else {
                    let inner: String = chars[i + 1..j].iter().collect();
                    pattern.push('[');
                    match inner.strip_prefix('!') {
                        Some(negated) => {
                            pattern.push('^');
                            pattern.push_str(&negated.replace('\\', "\\\\"));
                        }
                        None => pattern.push_str(&inner.replace('\\', "\\\\")),
                    }
                    pattern.push(']');
                    i = j;
                }
            }
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }
    pattern.push('$');
    pattern
}

type ViewFuture = Pin<Box<dyn Future<Output = Result<Response<String>, Error>> + Send>>;

/// Wrap a handler so that requests without a trailing slash are redirected
/// to the slashed path, query string preserved.
pub fn addslash<F, Fut>(handler: F) -> impl Fn(Request<String>) -> ViewFuture
where
    F: Fn(Request<String>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<String>, Error>> + Send + 'static,
{
    move |request: Request<String>| {
        let handler = handler.clone();
        Box::pin(async move {
            let path = request.uri().path();
            if !path.ends_with('/') {
                let location = match request.uri().query() {
                    Some(query) => format!("{}/?{}", path, query),
                    None => format!("{}/", path),
                };
                return Ok(Response::builder()
                    .status(302)
                    .header("Location", location)
                    .body(String::with_capacity(0)));
            }
            handler(request).await
        })
    }
}
