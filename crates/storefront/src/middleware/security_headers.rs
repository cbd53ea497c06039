//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! The policy is locked down except where branding needs it: Google Fonts
//! stylesheets and font files, and admin-configured `https:` logo and
//! favicon images.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

/// Content Security Policy for every page.
pub const CONTENT_SECURITY_POLICY_VALUE: &str = "default-src 'none'; \
     script-src 'self'; \
     style-src 'self' https://fonts.googleapis.com; \
     font-src 'self' https://fonts.gstatic.com; \
     img-src 'self' https:; \
     connect-src 'self'; \
     frame-src 'none'; \
     object-src 'none'; \
     base-uri 'self'; \
     form-action 'self'; \
     frame-ancestors 'none'; \
     upgrade-insecure-requests";

const PERMISSIONS_POLICY: &str = "accelerometer=(), \
     autoplay=(), \
     camera=(), \
     display-capture=(), \
     geolocation=(), \
     gyroscope=(), \
     magnetometer=(), \
     microphone=(), \
     payment=(), \
     usb=(), \
     xr-spatial-tracking=()";

/// Add security headers to all responses.
///
/// Responses that already set `Cache-Control` (the branding stylesheet)
/// keep it; everything else is `no-store`.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY_VALUE),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(PERMISSIONS_POLICY),
    );

    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );
    // Google Fonts does not send CORP headers.
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("credentialless"),
    );
    headers.insert(
        HeaderName::from_static("x-dns-prefetch-control"),
        HeaderValue::from_static("off"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_allows_google_fonts_only() {
        assert!(CONTENT_SECURITY_POLICY_VALUE.contains("style-src 'self' https://fonts.googleapis.com;"));
        assert!(CONTENT_SECURITY_POLICY_VALUE.contains("font-src 'self' https://fonts.gstatic.com;"));
        assert!(CONTENT_SECURITY_POLICY_VALUE.contains("script-src 'self';"));
    }
}
