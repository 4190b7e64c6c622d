pub type HttpResponse<T> = http::Response<T>;
pub type HttpHeaderName = http::HeaderName;
pub type HttpHeaderValue = http::HeaderValue;

pub struct Response<T> {
    response: HttpResponse<T>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Response<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.response.fmt(f)
    }
}

impl Response<()> {
    pub fn builder() -> Builder {
        Builder {
            builder: http::response::Builder::new(),
        }
    }
}

impl<T> Response<T> {
    pub fn new(value: T) -> Self {
        Self {
            response: HttpResponse::new(value),
        }
    }

    pub fn body(&self) -> &T {
        self.response.body()
    }

    pub fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    pub fn headers(&self) -> &http::HeaderMap<HttpHeaderValue> {
        self.response.headers()
    }

    pub fn from_inner(response: HttpResponse<T>) -> Self {
        Self { response }
    }
}

impl<T> From<Response<T>> for http::Response<T> {
    fn from(value: Response<T>) -> Self {
        value.response
    }
}

pub struct Builder {
    builder: http::response::Builder,
}

impl Builder {
    pub fn status(self, status: u16) -> Self {
        Self {
            builder: self.builder.status(status),
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

    pub fn body<T>(self, body: T) -> Response<T> {
        Response {
            response: self
                .builder
                .body(body)
                .unwrap(),
        }
    }
}
