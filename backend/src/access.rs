//! Who is calling: the capability that gates moderation.
//!
//! Handlers take a [`Capability`] argument; actix resolves it from the
//! `X-Admin-Token` header against the token configured at startup.

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use std::convert::Infallible;
use std::future::{ready, Ready};
use subtle::ConstantTimeEq;

pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Public,
    Admin,
}

impl Capability {
    pub fn is_admin(self) -> bool {
        self == Capability::Admin
    }
}

/// The configured admin token, registered as app data. `None` means nobody is admin.
#[derive(Debug, Clone, Default)]
pub struct AdminToken(Option<String>);

impl AdminToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.is_empty()))
    }

    pub fn grant(&self, presented: Option<&str>) -> Capability {
        let (Some(expected), Some(given)) = (&self.0, presented) else {
            return Capability::Public;
        };
        if bool::from(expected.as_bytes().ct_eq(given.as_bytes())) {
            Capability::Admin
        } else {
            Capability::Public
        }
    }
}

impl FromRequest for Capability {
    type Error = Infallible;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let presented = req
            .headers()
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        let capability = req
            .app_data::<web::Data<AdminToken>>()
            .map(|token| token.grant(presented))
            .unwrap_or(Capability::Public);
        ready(Ok(capability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    async fn resolve(token: Option<&str>, header: Option<&str>) -> Capability {
        let mut req = TestRequest::default()
            .app_data(web::Data::new(AdminToken::new(token.map(str::to_string))));
        if let Some(value) = header {
            req = req.insert_header((ADMIN_TOKEN_HEADER, value));
        }
        let (req, mut payload) = req.to_http_parts();
        Capability::from_request(&req, &mut payload).await.unwrap()
    }

    #[actix_web::test]
    async fn matching_token_grants_admin() {
        assert_eq!(resolve(Some("s3cret"), Some("s3cret")).await, Capability::Admin);
    }

    #[actix_web::test]
    async fn wrong_or_missing_header_is_public() {
        assert_eq!(resolve(Some("s3cret"), Some("guess")).await, Capability::Public);
        assert_eq!(resolve(Some("s3cret"), None).await, Capability::Public);
    }

    #[test]
    fn grant_compares_whole_tokens() {
        let token = AdminToken::new(Some("s3cret".to_string()));
        assert_eq!(token.grant(Some("s3cret")), Capability::Admin);
        assert_eq!(token.grant(Some("s3cre")), Capability::Public);
        assert_eq!(token.grant(Some("s3cret!")), Capability::Public);
        assert_eq!(token.grant(Some("S3CRET")), Capability::Public);
        assert_eq!(token.grant(None), Capability::Public);
    }

    #[actix_web::test]
    async fn no_configured_token_means_no_admin() {
        assert_eq!(resolve(None, Some("")).await, Capability::Public);
        assert_eq!(resolve(Some(""), Some("")).await, Capability::Public);
    }
}
