use axum::{
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};

pub const LOGIN_URL: &str = "/login/";
pub const LOGIN_REDIRECT_URL: &str = "/supermarkets/";

/// Plain `302 Found`, the status browsers follow with a GET after a form post.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

pub fn login_redirect(next: &str) -> String {
    format!("{LOGIN_URL}?next={}", quote_path(next))
}

/// Percent-encodes a path for a query value, leaving `/` readable.
pub fn quote_path(path: &str) -> String {
    urlencoding::encode(path).replace("%2F", "/")
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}
