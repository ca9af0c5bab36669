//! OpenAPI document for the gateway's HTTP surface.

use utoipa::OpenApi;

use super::handlers;
use super::handlers::auth::types::{
    ErrorResponse, ExchangeRequest, MagicLinkRequest, MessageResponse, RestartResponse,
    SignupRequest, UserResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::signup::signup,
        handlers::auth::magic_link::request_magic_link,
        handlers::auth::magic_link::validate_magic_token,
        handlers::auth::magic_link::exchange_magic_token,
        handlers::oauth::whoop_authorize,
        handlers::settings::restart,
    ),
    components(schemas(
        SignupRequest,
        UserResponse,
        MagicLinkRequest,
        MessageResponse,
        ExchangeRequest,
        RestartResponse,
        ErrorResponse,
    )),
    tags(
        (name = "auth", description = "Signup and magic-link login"),
        (name = "oauth", description = "Provider OAuth redirects"),
        (name = "gateway", description = "Operational endpoints")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_all_routes() {
        let doc = openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/health",
            "/auth/signup",
            "/auth/request-magic-link",
            "/auth/validate-magic-token",
            "/auth/exchange-magic-token",
            "/oauth/whoop",
            "/settings/restart",
        ] {
            assert!(paths.contains_key(path), "missing path: {path}");
        }
    }
}
