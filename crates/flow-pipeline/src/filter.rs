use http::Method;

/// Route of the login endpoint the pipeline intercepts by default.
pub const DEFAULT_TARGET_ROUTE: &str = "/MajorLogin";

/// Decides which flows the interceptor acts on: `POST` requests whose path
/// contains the target route. Everything else passes through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFilter {
    route: String,
}

impl RouteFilter {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        *method == Method::POST && path.contains(self.route.as_str())
    }
}

impl Default for RouteFilter {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_ROUTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_to_login_route_matches() {
        let filter = RouteFilter::default();
        assert!(filter.matches(&Method::POST, "/MajorLogin"));
    }

    #[test]
    fn route_may_appear_anywhere_in_path() {
        let filter = RouteFilter::default();
        assert!(filter.matches(&Method::POST, "/api/v2/MajorLogin?region=eu"));
    }

    #[test]
    fn other_methods_do_not_match() {
        let filter = RouteFilter::default();
        for method in [Method::GET, Method::PUT, Method::DELETE, Method::OPTIONS] {
            assert!(!filter.matches(&method, "/MajorLogin"), "{method} matched");
        }
    }

    #[test]
    fn other_paths_do_not_match() {
        let filter = RouteFilter::default();
        assert!(!filter.matches(&Method::POST, "/MajorRegister"));
        assert!(!filter.matches(&Method::POST, "/majorlogin"));
        assert!(!filter.matches(&Method::POST, "/"));
    }

    #[test]
    fn custom_route() {
        let filter = RouteFilter::new("/auth/token");
        assert_eq!(filter.route(), "/auth/token");
        assert!(filter.matches(&Method::POST, "/auth/token"));
        assert!(!filter.matches(&Method::POST, "/MajorLogin"));
    }
}
