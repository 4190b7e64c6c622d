use std::{collections::HashMap, pin::Pin, sync::Arc};

use futures::Future;
use serde_json::{Map, Value};

use crate::{
    coerce::{coerce, ParamValue, TypeDescriptor},
    error::Error,
    params::ParamSource,
    request::Request,
    response::Response,
};

type Validator = Arc<dyn Fn(&ParamValue) -> bool + Send + Sync>;

#[derive(Clone)]
struct ParamSpec {
    name: String,
    required: bool,
    descriptor: Option<TypeDescriptor>,
    validator: Option<Validator>,
}

/// The per-handler parameter specification, built once up front.
///
/// Misusing the builder (duplicate names, typing an undeclared parameter)
/// is a programmer error and panics immediately rather than surfacing at
/// request time.
#[derive(Clone, Default)]
pub struct Binder {
    specs: Vec<ParamSpec>,
    allow_extra: bool,
}

impl Binder {
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            allow_extra: false,
        }
    }

    /// Declare a parameter the request must supply.
    pub fn required(self, name: &str) -> Self {
        self.declare(name, true)
    }

    /// Declare a parameter the handler has its own fallback for. An absent
    /// optional is simply left out of the bound set.
    pub fn optional(self, name: &str) -> Self {
        self.declare(name, false)
    }

    fn declare(mut self, name: &str, required: bool) -> Self {
        if self.specs.iter().any(|spec| spec.name == name) {
            panic!("Argument '{}' declared twice on the binder", name);
        }
        self.specs.push(ParamSpec {
            name: name.to_owned(),
            required,
            descriptor: None,
            validator: None,
        });
        self
    }

    /// Attach a coercion type to a declared parameter.
    pub fn with_type(mut self, name: &str, descriptor: TypeDescriptor) -> Self {
        self.spec_mut(name).descriptor = Some(descriptor);
        self
    }

    /// Attach a validation predicate, run after coercion.
    pub fn with_validator<F>(mut self, name: &str, validator: F) -> Self
    where
        F: Fn(&ParamValue) -> bool + Send + Sync + 'static,
    {
        self.spec_mut(name).validator = Some(Arc::new(validator));
        self
    }

    /// Forward unconsumed request parameters verbatim into
    /// [`BoundArgs::extra`].
    pub fn allow_extra(mut self) -> Self {
        self.allow_extra = true;
        self
    }

    fn spec_mut(&mut self, name: &str) -> &mut ParamSpec {
        match self.specs.iter_mut().find(|spec| spec.name == name) {
            Some(spec) => spec,
            None => panic!(
                "Argument '{}' specified on the binder, but never declared",
                name
            ),
        }
    }

    pub fn declared_names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.name.as_str())
    }

    /// Resolve the request's parameter source and coerce every declared
    /// parameter. The handler body never sees a partially valid set: the
    /// first failure aborts the whole call.
    pub fn bind(&self, request: &Request<String>) -> Result<BoundArgs, Error> {
        let required_count = self.specs.iter().filter(|spec| spec.required).count();
        let source = ParamSource::from_request(request, required_count == 0)?;
        let mut pool = source.params;
        let mut args = BoundArgs::new();

        for spec in &self.specs {
            // Multi-parameter types bypass single-value lookup: the nested
            // binder consumes every parameter it declares.
            if let Some(TypeDescriptor::Nested(nested)) = &spec.descriptor {
                let bound = nested.bind(request)?;
                pool.remove(&spec.name);
                for name in nested.declared_names() {
                    pool.remove(name);
                }
                let value = ParamValue::Nested(bound);
                self.validate(spec, &value)?;
                args.insert(&spec.name, value);
                continue;
            }

            match pool.remove(&spec.name) {
                Some(raw) => {
                    let value = coerce(
                        request,
                        &spec.name,
                        raw,
                        spec.descriptor.as_ref(),
                        source.needs_decode,
                    )?;
                    self.validate(spec, &value)?;
                    args.insert(&spec.name, value);
                }
                None if spec.required => return Err(Error::missing_argument(&spec.name)),
                None => {}
            }
        }

        if self.allow_extra {
            args.extra = pool;
        }
        Ok(args)
    }

    fn validate(&self, spec: &ParamSpec, value: &ParamValue) -> Result<(), Error> {
        match &spec.validator {
            Some(validator) if !validator(value) => Err(Error::validation_failed(&spec.name)),
            _ => Ok(()),
        }
    }

    /// Wrap a handler with this binder, producing the two explicit entry
    /// points ([`BoundHandler::dispatch`] and [`BoundHandler::call_direct`]).
    pub fn handler<C, F, Fut>(self, handler: F) -> BoundHandler<C>
    where
        F: Fn(C, Request<String>, BoundArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<String>, Error>> + Send + 'static,
    {
        BoundHandler {
            binder: self,
            handler: Box::new(move |context, request, args| {
                Box::pin(handler(context, request, args))
            }),
        }
    }
}

/// The fully resolved keyword-argument set a handler receives.
#[derive(Clone, Debug, Default)]
pub struct BoundArgs {
    values: HashMap<String, ParamValue>,
    extra: Map<String, Value>,
}

impl BoundArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: ParamValue) {
        self.values.insert(name.to_owned(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Unconsumed request parameters, verbatim, when the binder allows
    /// extras.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_int)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_float)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ParamValue::as_bool)
    }

    pub fn list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(ParamValue::as_list)
    }

    pub fn dict(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name).and_then(ParamValue::as_dict)
    }

    pub fn set(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(ParamValue::as_set)
    }

    pub fn datetime(&self, name: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        self.get(name).and_then(ParamValue::as_datetime)
    }

    pub fn date(&self, name: &str) -> Option<chrono::NaiveDate> {
        self.get(name).and_then(ParamValue::as_date)
    }

    pub fn duration(&self, name: &str) -> Option<std::time::Duration> {
        self.get(name).and_then(ParamValue::as_duration)
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(ParamValue::as_raw)
    }

    pub fn custom<T: 'static>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(ParamValue::downcast_ref)
    }

    pub fn nested(&self, name: &str) -> Option<&BoundArgs> {
        self.get(name).and_then(ParamValue::as_nested)
    }
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response<String>, Error>> + Send>>;
type BoxedBoundHandler<C> =
    Box<dyn Fn(C, Request<String>, BoundArgs) -> HandlerFuture + Send + Sync>;

/// A handler paired with its binder.
///
/// Framework-driven calls go through [`dispatch`](Self::dispatch); tests
/// and other direct callers use [`call_direct`](Self::call_direct), which
/// touches nothing.
pub struct BoundHandler<C> {
    binder: Binder,
    handler: BoxedBoundHandler<C>,
}

impl<C> BoundHandler<C> {
    /// Resolve the request's parameters and invoke the handler. The
    /// context and request are passed through verbatim; on a binding
    /// failure the handler never runs.
    pub async fn dispatch(
        &self,
        context: C,
        request: Request<String>,
    ) -> Result<Response<String>, Error> {
        let args = match self.binder.bind(&request) {
            Ok(args) => args,
            Err(err) => {
                tracing::debug!(error = %err, "binding failed");
                return Err(err);
            }
        };
        (self.handler)(context, request, args).await
    }

    /// Invoke the handler with the given arguments unmodified. No source
    /// resolution, no coercion.
    pub async fn call_direct(
        &self,
        context: C,
        request: Request<String>,
        args: BoundArgs,
    ) -> Result<Response<String>, Error> {
        (self.handler)(context, request, args).await
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use serde_json::json;

    use super::{Binder, BoundArgs, BoundHandler};
    use crate::{
        coerce::{ParamValue, TypeDescriptor},
        error::Error,
        request::Request,
        response::Response,
    };

    fn query_request(uri: &str) -> Request<String> {
        Request::builder().uri(uri).body(String::with_capacity(0))
    }

    fn json_request(body: serde_json::Value) -> Request<String> {
        Request::builder()
            .header("Content-Type", "application/json")
            .body(body.to_string())
    }

    #[test]
    fn test_missing_required_parameter() {
        let binder = Binder::new().required("foo");
        let error = binder.bind(&query_request("/?bar=1")).unwrap_err();
        assert_eq!(error.body(), "Missing argument 'foo'");
    }

    #[test]
    fn test_absent_optional_is_left_out() {
        let binder = Binder::new().optional("bar");
        let args = binder.bind(&query_request("/")).unwrap();

        assert!(!args.contains("bar"));
        // The handler's own fallback applies untouched.
        assert_eq!(args.str("bar").unwrap_or("baz"), "baz");
    }

    #[test]
    fn test_query_roundtrip_of_structured_value() {
        let binder = Binder::new()
            .required("tags")
            .with_type("tags", TypeDescriptor::List);
        let args = binder
            .bind(&query_request("/?tags=%5B1%2C2%2C3%5D"))
            .unwrap();
        assert_eq!(args.list("tags"), Some(&[json!(1), json!(2), json!(3)][..]));
    }

    #[test]
    fn test_json_body_is_not_double_decoded() {
        let binder = Binder::new()
            .required("field")
            .with_type("field", TypeDescriptor::List);
        let args = binder.bind(&json_request(json!({"field": [1, 2, 3]}))).unwrap();
        assert_eq!(args.list("field"), Some(&[json!(1), json!(2), json!(3)][..]));
    }

    #[test]
    fn test_untyped_parameters_pass_through_raw() {
        let binder = Binder::new().required("name");
        let args = binder.bind(&query_request("/?name=spork")).unwrap();
        assert_eq!(args.raw("name"), Some(&json!("spork")));
    }

    #[test]
    fn test_validator_rejection() {
        let binder = Binder::new()
            .required("count")
            .with_type("count", TypeDescriptor::Int)
            .with_validator("count", |value| value.as_int().is_some_and(|n| n > 0));

        let args = binder.bind(&query_request("/?count=3")).unwrap();
        assert_eq!(args.int("count"), Some(3));

        let error = binder.bind(&query_request("/?count=-1")).unwrap_err();
        assert_eq!(error.body(), "Validation check on 'count' failed");
    }

    #[test]
    fn test_catch_all_forwards_unconsumed_parameters() {
        let binder = Binder::new().required("name").allow_extra();
        let args = binder
            .bind(&query_request("/?name=spork&color=red&size=9"))
            .unwrap();

        assert!(args.contains("name"));
        assert_eq!(args.extra().get("color"), Some(&json!("red")));
        assert_eq!(args.extra().get("size"), Some(&json!("9")));
        assert!(!args.extra().contains_key("name"));
    }

    #[test]
    fn test_unconsumed_parameters_dropped_without_catch_all() {
        let binder = Binder::new().required("name");
        let args = binder.bind(&query_request("/?name=spork&color=red")).unwrap();
        assert!(args.extra().is_empty());
    }

    #[test]
    fn test_nested_binder_consumes_its_parameters_atomically() {
        let window = Binder::new()
            .required("start")
            .with_type("start", TypeDescriptor::DateTime)
            .required("end")
            .with_type("end", TypeDescriptor::DateTime);
        let binder = Binder::new()
            .required("window")
            .with_type("window", TypeDescriptor::nested(window))
            .allow_extra();

        let args = binder
            .bind(&query_request("/?start=1500000000&end=1500003600&other=1"))
            .unwrap();

        let window = args.nested("window").unwrap();
        assert_eq!(window.datetime("start").unwrap().timestamp(), 1_500_000_000);
        assert_eq!(window.datetime("end").unwrap().timestamp(), 1_500_003_600);
        // Consumed by the nested binder, so not forwarded as extras.
        assert!(!args.extra().contains_key("start"));
        assert!(!args.extra().contains_key("end"));
        assert_eq!(args.extra().get("other"), Some(&json!("1")));
    }

    #[test]
    fn test_nested_parameter_name_is_consumed_too() {
        let window = Binder::new()
            .required("start")
            .with_type("start", TypeDescriptor::Int)
            .required("end")
            .with_type("end", TypeDescriptor::Int);
        let binder = Binder::new()
            .required("window")
            .with_type("window", TypeDescriptor::nested(window))
            .allow_extra();

        // A literal 'window' request parameter is consumed by the outer
        // declaration, not forwarded as an extra.
        let args = binder
            .bind(&query_request("/?start=1&end=2&window=literal"))
            .unwrap();
        assert!(args.nested("window").is_some());
        assert!(!args.extra().contains_key("window"));
    }

    #[test]
    fn test_empty_required_set_tolerates_missing_source() {
        let binder = Binder::new().optional("anything");
        let request = Request::builder()
            .header("Content-Type", "application/json")
            .body("not json".to_owned());
        let args = binder.bind(&request).unwrap();
        assert!(!args.contains("anything"));
    }

    #[test]
    fn test_required_set_demands_a_source() {
        let binder = Binder::new().required("anything");
        let request = Request::builder()
            .header("Content-Type", "application/json")
            .body("not json".to_owned());
        let error = binder.bind(&request).unwrap_err();
        assert_eq!(error.body(), "No request parameters found!");
    }

    #[test]
    #[should_panic(expected = "never declared")]
    fn test_typing_an_undeclared_parameter_panics() {
        let _ = Binder::new()
            .required("foo")
            .with_type("bar", TypeDescriptor::Int);
    }

    #[test]
    #[should_panic(expected = "declared twice")]
    fn test_duplicate_declaration_panics() {
        let _ = Binder::new().required("foo").optional("foo");
    }

    fn handler_probe() -> (BoundHandler<()>, Arc<AtomicBool>) {
        let invoked = Arc::new(AtomicBool::new(false));
        let seen = invoked.clone();
        let handler = Binder::new()
            .required("count")
            .with_type("count", TypeDescriptor::Int)
            .with_validator("count", |value| value.as_int().is_some_and(|n| n > 0))
            .handler(move |_ctx: (), _request, args: BoundArgs| {
                let seen = seen.clone();
                async move {
                    seen.store(true, Ordering::SeqCst);
                    Ok(Response::new(args.int("count").unwrap_or(0).to_string()))
                }
            });
        (handler, invoked)
    }

    #[tokio::test]
    async fn test_dispatch_resolves_and_invokes() {
        let (handler, invoked) = handler_probe();
        let response = handler.dispatch((), query_request("/?count=3")).await.unwrap();

        assert!(invoked.load(Ordering::SeqCst));
        assert_eq!(response.body(), "3");
    }

    #[tokio::test]
    async fn test_dispatch_failure_never_reaches_the_handler() {
        let (handler, invoked) = handler_probe();

        let error = handler.dispatch((), query_request("/")).await.unwrap_err();
        assert_eq!(error.body(), "Missing argument 'count'");

        let error = handler.dispatch((), query_request("/?count=-2")).await.unwrap_err();
        assert_eq!(error.body(), "Validation check on 'count' failed");

        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_call_direct_bypasses_binding() {
        let (handler, invoked) = handler_probe();

        // No 'count' on the request and no coercion: whatever args the
        // caller built are handed over untouched.
        let mut args = BoundArgs::new();
        args.insert("count", ParamValue::Int(7));
        let response = handler
            .call_direct((), query_request("/"), args)
            .await
            .unwrap();

        assert!(invoked.load(Ordering::SeqCst));
        assert_eq!(response.body(), "7");
    }

    #[tokio::test]
    async fn test_handler_errors_pass_through_dispatch() {
        let handler = Binder::new().handler(|_ctx: (), _request, _args| async {
            Err::<Response<String>, _>(Error::new("teapot".into(), 418))
        });
        let error = handler.dispatch((), query_request("/")).await.unwrap_err();
        assert_eq!(*error.code(), 418);
    }
}
