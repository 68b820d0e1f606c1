//! Classify HTTP status and curl errors into retry classes.

use super::error::FetchError;
use super::policy::ErrorClass;

/// Classify an HTTP status code. 429 and 503 are the service's rate-limit
/// answers; other 5xx are retryable; every other status is permanent.
pub fn classify_http_status(code: u32) -> ErrorClass {
    match code {
        429 | 503 => ErrorClass::Throttled,
        500..=599 => ErrorClass::Http5xx(code as u16),
        _ => ErrorClass::Permanent,
    }
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> ErrorClass {
    if e.is_operation_timedout() {
        return ErrorClass::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorClass::Connection;
    }
    ErrorClass::Permanent
}

/// Classify a fetch attempt error.
pub fn classify(e: &FetchError) -> ErrorClass {
    match e {
        FetchError::Curl(ce) => classify_curl_error(ce),
        FetchError::Http(code) => classify_http_status(*code),
        FetchError::PartialTransfer { .. } => ErrorClass::Connection,
        FetchError::Storage(_) | FetchError::Aborted(_) => ErrorClass::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_and_503_throttled() {
        assert_eq!(classify_http_status(429), ErrorClass::Throttled);
        assert_eq!(classify_http_status(503), ErrorClass::Throttled);
    }

    #[test]
    fn http_5xx_retryable() {
        assert_eq!(classify_http_status(500), ErrorClass::Http5xx(500));
        assert_eq!(classify_http_status(502), ErrorClass::Http5xx(502));
        assert!(classify_http_status(504).is_transient());
    }

    #[test]
    fn http_4xx_permanent() {
        assert_eq!(classify_http_status(404), ErrorClass::Permanent);
        assert_eq!(classify_http_status(403), ErrorClass::Permanent);
        assert_eq!(classify_http_status(410), ErrorClass::Permanent);
    }

    #[test]
    fn short_body_is_transient_and_storage_is_not() {
        let short = FetchError::PartialTransfer {
            expected: 100,
            received: 40,
        };
        assert!(classify(&short).is_transient());
        let disk = FetchError::Storage(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        ));
        assert_eq!(classify(&disk), ErrorClass::Permanent);
    }

    #[test]
    fn curl_timeout_and_connect_errors() {
        // CURLE_OPERATION_TIMEDOUT = 28, CURLE_COULDNT_CONNECT = 7, CURLE_URL_MALFORMAT = 3
        assert_eq!(classify_curl_error(&curl::Error::new(28)), ErrorClass::Timeout);
        assert_eq!(classify_curl_error(&curl::Error::new(7)), ErrorClass::Connection);
        assert_eq!(classify_curl_error(&curl::Error::new(3)), ErrorClass::Permanent);
    }
}
