use serde_json::{Map, Value};

use crate::{
    coerce::{coerce, ParamValue, TypeDescriptor},
    error::Error,
    request::Request,
};

/// The parameters a request carries, plus whether structured values still
/// need JSON decoding (query-style sources) or arrived pre-decoded (JSON
/// bodies).
#[derive(Debug)]
pub struct ParamSource {
    pub params: Map<String, Value>,
    pub needs_decode: bool,
}

impl ParamSource {
    /// Resolve the source for a request: the JSON body when the content
    /// type says so, query pairs otherwise. An unreadable body is an empty
    /// source when `allow_missing`, and `No request parameters found!`
    /// when it is not.
    pub fn from_request(request: &Request<String>, allow_missing: bool) -> Result<Self, Error> {
        if request.is_json() {
            match request.json_body() {
                Ok(params) => {
                    tracing::trace!(count = params.len(), "parameters from json body");
                    Ok(Self { params, needs_decode: false })
                }
                Err(_) if allow_missing => Ok(Self { params: Map::new(), needs_decode: false }),
                Err(_) => Err(Error::no_parameters()),
            }
        } else {
            let params = request.query_params();
            tracing::trace!(count = params.len(), "parameters from query string");
            Ok(Self { params, needs_decode: true })
        }
    }
}

/// Pull one named parameter out of a source and coerce it.
pub fn param_from_source(
    request: &Request<String>,
    source: &ParamSource,
    name: &str,
    descriptor: Option<&TypeDescriptor>,
) -> Result<Option<ParamValue>, Error> {
    match source.params.get(name) {
        Some(raw) => coerce(request, name, raw.clone(), descriptor, source.needs_decode).map(Some),
        None => Ok(None),
    }
}

impl Request<String> {
    /// Access one request parameter, coerced to `descriptor`. Fails with a
    /// missing-argument error when absent.
    pub fn param(
        &self,
        name: &str,
        descriptor: Option<&TypeDescriptor>,
    ) -> Result<ParamValue, Error> {
        let source = ParamSource::from_request(self, false)?;
        param_from_source(self, &source, name, descriptor)?
            .ok_or_else(|| Error::missing_argument(name))
    }

    /// Like [`Request::param`] but falling back to `default` when absent.
    pub fn param_or(
        &self,
        name: &str,
        default: ParamValue,
        descriptor: Option<&TypeDescriptor>,
    ) -> Result<ParamValue, Error> {
        let source = ParamSource::from_request(self, true)?;
        Ok(param_from_source(self, &source, name, descriptor)?.unwrap_or(default))
    }
}
