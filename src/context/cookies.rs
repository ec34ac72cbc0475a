//! Cookie transport for identity directives

use crate::config::CookieConfig;
use crate::context::types::CookieDirective;
use crate::identity::IdentityKind;
use axum::http::{header, HeaderMap, HeaderValue};

/// Read a cookie value from the request headers; empty values count as absent
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` header value for a directive
pub fn set_cookie_value(directive: &CookieDirective, config: &CookieConfig) -> String {
    match directive {
        CookieDirective::ClearPersona => format!(
            "{}=; Path={}; Max-Age=0",
            config.persona_cookie, config.path
        ),
        CookieDirective::SetIdentity { id, kind } => {
            let name = match kind {
                IdentityKind::Persona => &config.persona_cookie,
                IdentityKind::Profile => &config.profile_cookie,
            };
            format!(
                "{}={}; Path={}; Max-Age={}",
                name,
                id,
                config.path,
                config.max_age_secs()
            )
        }
    }
}

/// Append a `Set-Cookie` header per directive
pub fn apply_directives(
    headers: &mut HeaderMap,
    directives: &[CookieDirective],
    config: &CookieConfig,
) {
    for directive in directives {
        match HeaderValue::from_str(&set_cookie_value(directive, config)) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(?directive, "Skipping unencodable cookie: {}", e),
        }
    }
}
