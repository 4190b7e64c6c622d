use std::collections::BTreeSet;

use crate::request::{HttpHeaderName, HttpHeaderValue, Request};

pub type AuthHeader = (HttpHeaderName, HttpHeaderValue);

/// One way of establishing who a request belongs to.
pub trait AuthenticationPolicy: Send + Sync {
    /// The authenticated userid, checked against whatever persistent store
    /// backs the policy, or `None`.
    fn authenticated_userid(&self, request: &Request<String>) -> Option<String>;

    /// The userid claimed by the request alone, with no store check.
    fn unauthenticated_userid(&self, request: &Request<String>) -> Option<String>;

    /// Userid plus every group the current user belongs to, including
    /// system groups.
    fn effective_principals(&self, request: &Request<String>) -> Vec<String>;

    /// Response headers that remember `principal` on later requests.
    fn remember(&self, request: &Request<String>, principal: &str) -> Vec<AuthHeader>;

    /// Response headers that forget the current user.
    fn forget(&self, request: &Request<String>) -> Vec<AuthHeader>;
}

/// Auth policy backed by multiple other policies.
///
/// Authentication is checked against each contained policy in order; the
/// first non-`None` userid wins. Principals are merged.
#[derive(Default)]
pub struct MixedAuthenticationPolicy {
    policies: Vec<Box<dyn AuthenticationPolicy>>,
}

impl MixedAuthenticationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: Box<dyn AuthenticationPolicy>) -> Self {
        self.policies.push(policy);
        self
    }

    /// Add another authentication policy.
    pub fn add_policy(&mut self, policy: Box<dyn AuthenticationPolicy>) {
        self.policies.push(policy);
    }
}

impl AuthenticationPolicy for MixedAuthenticationPolicy {
    fn authenticated_userid(&self, request: &Request<String>) -> Option<String> {
        self.policies
            .iter()
            .find_map(|policy| policy.authenticated_userid(request))
    }

    fn unauthenticated_userid(&self, request: &Request<String>) -> Option<String> {
        self.policies
            .iter()
            .find_map(|policy| policy.unauthenticated_userid(request))
    }

    fn effective_principals(&self, request: &Request<String>) -> Vec<String> {
        let mut principals = BTreeSet::new();
        for policy in &self.policies {
            principals.extend(policy.effective_principals(request));
        }
        principals.into_iter().collect()
    }

    fn remember(&self, request: &Request<String>, principal: &str) -> Vec<AuthHeader> {
        self.policies
            .iter()
            .flat_map(|policy| policy.remember(request, principal))
            .collect()
    }

    fn forget(&self, request: &Request<String>) -> Vec<AuthHeader> {
        self.policies
            .iter()
            .flat_map(|policy| policy.forget(request))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthHeader, AuthenticationPolicy, MixedAuthenticationPolicy};
    use crate::request::{HttpHeaderValue, Request};

    struct HeaderPolicy {
        header: &'static str,
        group: &'static str,
    }

    impl AuthenticationPolicy for HeaderPolicy {
        fn authenticated_userid(&self, request: &Request<String>) -> Option<String> {
            self.unauthenticated_userid(request)
        }

        fn unauthenticated_userid(&self, request: &Request<String>) -> Option<String> {
            request
                .headers()
                .get(self.header)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        }

        fn effective_principals(&self, request: &Request<String>) -> Vec<String> {
            let mut principals = vec!["system.Everyone".to_owned()];
            if let Some(userid) = self.authenticated_userid(request) {
                principals.push(userid);
                principals.push(self.group.to_owned());
            }
            principals
        }

        fn remember(&self, _request: &Request<String>, principal: &str) -> Vec<AuthHeader> {
            vec![(
                http::HeaderName::from_static("set-cookie"),
                HttpHeaderValue::from_str(&format!("{}={}", self.header, principal)).unwrap(),
            )]
        }

        fn forget(&self, _request: &Request<String>) -> Vec<AuthHeader> {
            vec![(
                http::HeaderName::from_static("set-cookie"),
                HttpHeaderValue::from_str(&format!("{}=", self.header)).unwrap(),
            )]
        }
    }

    fn mixed() -> MixedAuthenticationPolicy {
        MixedAuthenticationPolicy::new()
            .with_policy(Box::new(HeaderPolicy { header: "x-token", group: "group:token" }))
            .with_policy(Box::new(HeaderPolicy { header: "x-basic", group: "group:basic" }))
    }

    #[test]
    fn test_first_policy_with_a_userid_wins() {
        let policy = mixed();

        let request = Request::builder()
            .header("x-basic", "basil")
            .body(String::with_capacity(0));
        assert_eq!(policy.authenticated_userid(&request), Some("basil".into()));

        let request = Request::builder()
            .header("x-token", "tom")
            .header("x-basic", "basil")
            .body(String::with_capacity(0));
        assert_eq!(policy.authenticated_userid(&request), Some("tom".into()));
        assert_eq!(policy.unauthenticated_userid(&request), Some("tom".into()));
    }

    #[test]
    fn test_no_policy_matches() {
        let policy = mixed();
        let request = Request::builder().body(String::with_capacity(0));
        assert_eq!(policy.authenticated_userid(&request), None);
    }

    #[test]
    fn test_principals_are_merged_and_deduplicated() {
        let policy = mixed();
        let request = Request::builder()
            .header("x-token", "tom")
            .header("x-basic", "basil")
            .body(String::with_capacity(0));

        let principals = policy.effective_principals(&request);
        assert!(principals.contains(&"tom".to_owned()));
        assert!(principals.contains(&"basil".to_owned()));
        assert!(principals.contains(&"group:token".to_owned()));
        assert!(principals.contains(&"group:basic".to_owned()));
        assert_eq!(
            principals
                .iter()
                .filter(|p| *p == "system.Everyone")
                .count(),
            1
        );
    }

    #[test]
    fn test_remember_and_forget_concatenate() {
        let policy = mixed();
        let request = Request::builder().body(String::with_capacity(0));

        let remembered = policy.remember(&request, "tom");
        assert_eq!(remembered.len(), 2);
        assert_eq!(remembered[0].1, "x-token=tom");
        assert_eq!(remembered[1].1, "x-basic=tom");

        assert_eq!(policy.forget(&request).len(), 2);
    }

    #[test]
    fn test_add_policy_appends() {
        let mut policy = MixedAuthenticationPolicy::new();
        let request = Request::builder()
            .header("x-token", "tom")
            .body(String::with_capacity(0));
        assert_eq!(policy.authenticated_userid(&request), None);

        policy.add_policy(Box::new(HeaderPolicy { header: "x-token", group: "group:token" }));
        assert_eq!(policy.authenticated_userid(&request), Some("tom".into()));
    }
}
