//! Custom Extractors
//!
//! Axum extractors for request headers the handlers pass to services.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header::ACCEPT_LANGUAGE, request::Parts},
};

/// Locale used when the client sends no `Accept-Language`.
pub const DEFAULT_LOCALE: &str = "en";

/// Preferred locale from the `Accept-Language` header.
///
/// Only the first language tag is kept; quality values are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptLanguage(pub String);

impl AcceptLanguage {
    fn parse(raw: &str) -> Option<String> {
        raw.split(',')
            .next()
            .and_then(|tag| tag.split(';').next())
            .map(str::trim)
            .filter(|tag| !tag.is_empty() && *tag != "*")
            .map(str::to_string)
    }
}

impl<S> FromRequestParts<S> for AcceptLanguage
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let locale = parts
            .headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::parse)
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        Ok(AcceptLanguage(locale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use test_case::test_case;

    #[test_case("fr-FR,fr;q=0.9,en;q=0.8", "fr-FR")]
    #[test_case("de;q=0.7", "de")]
    #[test_case("*", "en")]
    #[test_case("", "en")]
    #[tokio::test]
    async fn test_first_tag_wins(header: &str, expected: &str) {
        let (mut parts, _) = Request::builder()
            .header(ACCEPT_LANGUAGE, header)
            .body(())
            .unwrap()
            .into_parts();
        let AcceptLanguage(locale) = AcceptLanguage::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(locale, expected);
    }
}
