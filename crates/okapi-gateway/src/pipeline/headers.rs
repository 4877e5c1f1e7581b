//! Inbound header handling: token normalisation, tenant resolution, the
//! module selector and request decoration.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use okapi_kernel::proxy::headers;
use okapi_kernel::{GatewayError, GatewayResult, Headers, ModuleId};
use uuid::Uuid;

/// Reconcile `X-Okapi-Token` with `Authorization: Bearer`.
///
/// Both present and different is a user error.  A bearer token alone is
/// moved into `X-Okapi-Token`.  `Authorization` is dropped whenever it
/// carried the token.
pub fn normalize_token(headers: &mut Headers) -> GatewayResult<()> {
    let bearer = headers
        .get(headers::AUTHORIZATION)
        .and_then(|v| bearer_token(v))
        .map(str::to_string);
    let Some(bearer) = bearer else {
        return Ok(());
    };
    match headers.get(headers::TOKEN) {
        Some(token) if token != &bearer => {
            return Err(GatewayError::user(
                "X-Okapi-Token is not equal to Authorization token",
            ));
        }
        Some(_) => {}
        None => {
            headers.insert(headers::TOKEN.to_string(), bearer);
        }
    }
    headers.remove(headers::AUTHORIZATION);
    Ok(())
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(char::is_whitespace)?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Tenant of the request: `X-Okapi-Tenant`, else the `tenant` claim of the
/// token.  The header is filled in when the claim was used.
pub fn resolve_tenant(headers: &mut Headers) -> GatewayResult<String> {
    if let Some(tenant) = headers.get(headers::TENANT).filter(|t| !t.is_empty()) {
        return Ok(tenant.clone());
    }
    let tenant = headers
        .get(headers::TOKEN)
        .and_then(|token| tenant_claim(token))
        .ok_or_else(|| GatewayError::forbidden("Missing Tenant"))?;
    headers.insert(headers::TENANT.to_string(), tenant.clone());
    Ok(tenant)
}

/// `tenant` claim of a JWT.  The signature is not checked; that is the
/// business of auth filters.
pub fn tenant_claim(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("tenant")?.as_str().map(str::to_string)
}

/// Remove and parse `X-Okapi-Module-Id`.  It never reaches a module.
pub fn take_selector(headers: &mut Headers) -> GatewayResult<Option<ModuleId>> {
    match headers.remove(headers::MODULE_ID) {
        Some(raw) => ModuleId::parse(raw.trim())
            .map(Some)
            .map_err(|e| GatewayError::user(format!("Invalid {}: {e}", headers::MODULE_ID))),
        None => Ok(None),
    }
}

/// Add a fresh request id (appended to an inbound one) and the gateway URL.
pub fn decorate(headers: &mut Headers, okapi_url: &str) {
    let id = Uuid::new_v4().simple().to_string();
    let request_id = match headers.get(headers::REQUEST_ID) {
        Some(existing) if !existing.is_empty() => format!("{existing};{id}"),
        _ => id,
    };
    headers.insert(headers::REQUEST_ID.to_string(), request_id);
    headers.insert(headers::URL.to_string(), okapi_url.to_string());
}
