use lambda_http::http::header::{HeaderValue, VARY};
use lambda_http::{Body, Response};

/// Origin to echo back. `allowed` is `*` or a comma-separated list; a
/// request from an unlisted origin gets the first entry.
pub fn cors_origin(allowed: &str, request_origin: Option<&str>) -> String {
    if allowed.trim() == "*" {
        return "*".to_string();
    }
    let mut origins = allowed.split(',').map(str::trim).filter(|o| !o.is_empty());
    let first = origins.clone().next().unwrap_or_default().to_string();
    match request_origin {
        Some(origin) if origins.any(|o| o == origin) => origin.to_string(),
        _ => first,
    }
}

pub fn with_cors_headers(mut resp: Response<Body>, allowed: &str, request_origin: Option<&str>) -> Response<Body> {
    let origin = cors_origin(allowed, request_origin);
    let headers = resp.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        HeaderValue::from_str(&origin).unwrap_or_else(|_| HeaderValue::from_static("*")),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type,Authorization,X-User-Id"),
    );
    if origin != "*" {
        headers.append(VARY, HeaderValue::from_static("Origin"));
    }
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_origins_are_echoed() {
        let allowed = "https://aivana.app, http://localhost:3000";
        assert_eq!(cors_origin(allowed, Some("http://localhost:3000")), "http://localhost:3000");
        assert_eq!(cors_origin(allowed, Some("https://evil.test")), "https://aivana.app");
        assert_eq!(cors_origin("*", Some("https://evil.test")), "*");
    }

    #[test]
    fn headers_are_attached() {
        let resp = with_cors_headers(Response::new(Body::Empty), "https://aivana.app", None);
        assert_eq!(resp.headers()["Access-Control-Allow-Origin"], "https://aivana.app");
        assert_eq!(resp.headers()[VARY], "Origin");
    }
}
