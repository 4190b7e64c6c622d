use serde_json::{Map, Value};

pub type Method = http::Method;
pub type Uri = http::Uri;
pub type HttpRequest<T> = http::Request<T>;
pub type HttpBuilder = http::request::Builder;
pub type HttpHeaderName = http::HeaderName;
pub type HttpHeaderValue = http::HeaderValue;
pub type HttpHeaderMap<HeaderValue> = http::HeaderMap<HeaderValue>;

/// Subpath segments left over after route matching, carried in extensions
/// so predicates can see them without the routing layer being involved.
#[derive(Clone, Debug)]
struct SubpathSegments(Vec<String>);

pub struct Request<T>(HttpRequest<T>);

impl Request<()> {
    pub fn builder() -> Builder {
        Builder {
            builder: HttpBuilder::new(),
        }
    }
}

impl<T> Request<T> {
    pub fn new(value: T) -> Self {
        Self(HttpRequest::new(value))
    }

    pub fn body(&self) -> &T {
        self.0.body()
    }

    pub fn method(&self) -> &Method {
        self.0.method()
    }

    pub fn uri(&self) -> &Uri {
        self.0.uri()
    }

    pub fn headers(&self) -> &HttpHeaderMap<HttpHeaderValue> {
        self.0.headers()
    }

    pub fn from_inner(req: HttpRequest<T>) -> Self {
        Self(req)
    }

    /// Record the trailing path segments matched past the view's name.
    pub fn set_subpath(&mut self, segments: Vec<String>) {
        self.0
            .extensions_mut()
            .insert(SubpathSegments(segments));
    }

    pub fn subpath(&self) -> &[String] {
        self.0
            .extensions()
            .get::<SubpathSegments>()
            .map(|segments| segments.0.as_slice())
            .unwrap_or(&[])
    }

    /// Decoded query-string pairs, JSON-string valued. Later duplicates of
    /// a key overwrite earlier ones.
    pub fn query_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        if let Some(query) = self.0.uri().query() {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                params.insert(key.into_owned(), Value::String(value.into_owned()));
            }
        }
        params
    }

    /// Whether the request body is declared as JSON.
    pub fn is_json(&self) -> bool {
        self.0
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false)
    }
}

impl Request<String> {
    /// Decode the body as a JSON object. Anything that is not an object is
    /// rejected, matching what a parameter source can hold.
    pub fn json_body(&self) -> Result<Map<String, Value>, serde_json::Error> {
        serde_json::from_str::<Map<String, Value>>(self.0.body())
    }
}

pub struct Builder {
    pub builder: HttpBuilder,
}

impl Builder {
    pub fn uri<T>(self, uri: T) -> Self
    where
        Uri: TryFrom<T>,
        <Uri as TryFrom<T>>::Error: Into<http::Error>,
    {
        Self {
            builder: self.builder.uri(uri),
        }
    }

    pub fn body<T>(self, body: T) -> Request<T> {
        Request(
            self.builder
                .body(body)
                .unwrap(),
        )
    }

    pub fn method(self, method: Method) -> Self {
        Self {
            builder: self.builder.method(method),
        }
    }

    pub fn header<K, V>(self, key: K, value: V) -> Self
    where
        HttpHeaderName: TryFrom<K>,
        <HttpHeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HttpHeaderValue: TryFrom<V>,
        <HttpHeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        Self {
            builder: self
                .builder
                .header(key, value),
        }
    }
}

impl<T> From<Request<T>> for http::Request<T> {
    fn from(value: Request<T>) -> Self {
        value.0
    }
}
