//! Error Taxonomy & Classifier: converts raw fetcher error messages into a
//! bounded variant space. Classification is a pure, deterministic function
//! over keyword sets — the implementation mirrors the teacher crate's own
//! `retry::classify` in shape, but classifies by message content rather
//! than HTTP status, since `MediaFetcher` surfaces only strings.

use std::fmt;

/// The closed set of error variants the Download Service can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Network,
    Authentication,
    Format,
    Extraction,
    Cancelled,
    Other,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchErrorKind::Network => "network",
            FetchErrorKind::Authentication => "authentication",
            FetchErrorKind::Format => "format",
            FetchErrorKind::Extraction => "extraction",
            FetchErrorKind::Cancelled => "cancelled",
            FetchErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

const NETWORK_KEYWORDS: &[&str] = &["network", "connection", "timeout", "unreachable"];
const AUTH_KEYWORDS: &[&str] = &["login", "private", "members-only"];
const FORMAT_KEYWORDS: &[&str] = &["format", "quality", "unavailable"];

/// Classify a raw fetcher error message. Pure and deterministic: the same
/// message always yields the same kind. Cancellation is classified
/// separately by the caller (the worker body knows directly when it
/// observed its own cancellation token) rather than by message content.
pub fn classify(message: &str) -> FetchErrorKind {
    let lower = message.to_lowercase();
    if NETWORK_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        FetchErrorKind::Network
    } else if AUTH_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        FetchErrorKind::Authentication
    } else if FORMAT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        FetchErrorKind::Format
    } else {
        FetchErrorKind::Extraction
    }
}

/// Structured context logged alongside a classified error, per the design
/// spec's "{task_id, url, operation}" requirement.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub task_id: crate::model::TaskId,
    pub url: String,
    pub operation: &'static str,
}

/// Classify and log in one call, returning the classified kind.
pub fn classify_and_log(message: &str, context: &ErrorContext) -> FetchErrorKind {
    let kind = classify(message);
    tracing::warn!(
        task_id = context.task_id,
        url = %context.url,
        operation = context.operation,
        kind = %kind,
        message = %message,
        "fetch error classified"
    );
    kind
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_keywords() {
        assert_eq!(classify("Connection reset by peer"), FetchErrorKind::Network);
        assert_eq!(classify("request timeout"), FetchErrorKind::Network);
        assert_eq!(classify("host unreachable"), FetchErrorKind::Network);
    }

    #[test]
    fn authentication_keywords() {
        assert_eq!(classify("please login to continue"), FetchErrorKind::Authentication);
        assert_eq!(classify("this video is private"), FetchErrorKind::Authentication);
        assert_eq!(classify("members-only content"), FetchErrorKind::Authentication);
    }

    #[test]
    fn format_keywords() {
        assert_eq!(classify("requested format not available"), FetchErrorKind::Format);
        assert_eq!(classify("quality unsupported"), FetchErrorKind::Format);
        assert_eq!(classify("stream unavailable"), FetchErrorKind::Format);
    }

    #[test]
    fn unmatched_falls_back_to_extraction() {
        assert_eq!(classify("unexpected token in html"), FetchErrorKind::Extraction);
    }

    #[test]
    fn classification_is_case_insensitive_and_deterministic() {
        assert_eq!(classify("NETWORK ERROR"), classify("network error"));
        assert_eq!(classify("same message"), classify("same message"));
    }
}
