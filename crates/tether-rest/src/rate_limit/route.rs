//! Rate limit identifiers derived from a request's method and path

use reqwest::Method;

/// The rate limit identity of a request, computed before it is sent.
///
/// `bucket_key` groups requests that are likely to share a server-side
/// bucket (same method and same minor path shape); `rate_limit_key`
/// narrows that to one top-level resource instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePath {
    /// Uppercase HTTP method name, kept for relaying to remote services
    pub method: String,
    /// Endpoint path relative to the API base, no leading slash
    pub url: String,
    /// Method plus minor path parameters, shared across resource instances
    pub bucket_key: String,
    /// `{major type}-{major id}-{bucket key}`, unique per resource instance
    pub rate_limit_key: String,
}

impl RoutePath {
    #[must_use]
    pub fn new(method: &Method, url: &str) -> Self {
        let url = url.strip_prefix('/').unwrap_or(url).to_owned();

        let mut segments = url.split('/');
        let major_type = segments.next().unwrap_or_default();
        let major_id = segments.next().unwrap_or_default();

        let bucket_key = Self::bucket_key(method, segments);
        let rate_limit_key = format!("{major_type}-{major_id}-{bucket_key}");

        Self {
            method: method.as_str().to_owned(),
            url,
            bucket_key,
            rate_limit_key,
        }
    }

    /// Joins the method abbreviation with abbreviated minor path
    /// parameters. Ids and unrecognized segments are dropped so that
    /// e.g. `guilds/1/members/2` and `guilds/1/members/3` collide.
    fn bucket_key<'a>(method: &Method, minor_params: impl Iterator<Item = &'a str>) -> String {
        let mut parts = Vec::new();

        match *method {
            Method::GET => parts.push("ge"),
            Method::POST => parts.push("p"),
            Method::PATCH => parts.push("u"),
            Method::DELETE => parts.push("d"),
            _ => {}
        }

        for param in minor_params {
            match param {
                "members" => parts.push("m"),
                "guilds" => parts.push("gu"),
                "channels" => parts.push("c"),
                _ => {}
            }
        }

        parts.join("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_slash_stripped() {
        let route = RoutePath::new(&Method::GET, "/channels/123");
        assert_eq!(route.url, "channels/123");
    }

    #[test]
    fn test_bucket_key_from_method_and_minors() {
        let route = RoutePath::new(&Method::GET, "guilds/1/members/2");
        assert_eq!(route.bucket_key, "ge-m");

        let route = RoutePath::new(&Method::PATCH, "guilds/1/channels");
        assert_eq!(route.bucket_key, "u-c");
    }

    #[test]
    fn test_rate_limit_key_scoped_to_major_resource() {
        let a = RoutePath::new(&Method::GET, "guilds/1/members/2");
        let b = RoutePath::new(&Method::GET, "guilds/1/members/3");
        let c = RoutePath::new(&Method::GET, "guilds/9/members/2");

        // same guild, different member: one rate limit state
        assert_eq!(a.rate_limit_key, "guilds-1-ge-m");
        assert_eq!(a.rate_limit_key, b.rate_limit_key);

        // different guild: separate state, shared bucket shape
        assert_ne!(a.rate_limit_key, c.rate_limit_key);
        assert_eq!(a.bucket_key, c.bucket_key);
    }

    #[test]
    fn test_ids_do_not_leak_into_bucket_key() {
        let route = RoutePath::new(&Method::DELETE, "channels/42/messages/7");
        assert_eq!(route.bucket_key, "d");
        assert_eq!(route.rate_limit_key, "channels-42-d");
    }
}
