//! Source authentication (§3 data model, component C4).
//!
//! Every variant resolves its secret material from `${ENV_VAR}`
//! references at fetch time rather than config-load time, so credentials
//! never sit in the in-memory configuration snapshot. SigV4 is
//! hand-rolled rather than pulled from an AWS SDK: `AwsSig` signs
//! arbitrary HTTP requests against `Remote`/`Fallback` sources, not just
//! S3 API calls, which an SDK client doesn't support.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::origin::AuthConfig;
use crate::error::ProxyError;

type HmacSha256 = Hmac<Sha256>;

fn resolve_env(var_name: &str) -> Result<String, ProxyError> {
    std::env::var(var_name)
        .map_err(|_| ProxyError::Config(format!("environment variable '{var_name}' is not set")))
}

/// Apply an auth configuration to an outbound request, returning the
/// headers and query parameters to attach.
pub struct AppliedAuth {
    pub headers: Vec<(String, String)>,
    pub query_params: Vec<(String, String)>,
}

pub fn apply(
    auth: &AuthConfig,
    method: &str,
    url: &str,
    body: &[u8],
) -> Result<AppliedAuth, ProxyError> {
    match auth {
        AuthConfig::Bearer { token_var } => {
            let token = resolve_env(token_var)?;
            Ok(AppliedAuth {
                headers: vec![("authorization".to_string(), format!("Bearer {token}"))],
                query_params: vec![],
            })
        }
        AuthConfig::Header { headers } => {
            let mut resolved = Vec::with_capacity(headers.len());
            for (name, value_template) in headers {
                resolved.push((name.clone(), expand_env_template(value_template)?));
            }
            Ok(AppliedAuth {
                headers: resolved,
                query_params: vec![],
            })
        }
        AuthConfig::Query { params } => {
            let mut resolved = Vec::with_capacity(params.len());
            for (name, value_template) in params {
                resolved.push((name.clone(), expand_env_template(value_template)?));
            }
            Ok(AppliedAuth {
                headers: vec![],
                query_params: resolved,
            })
        }
        AuthConfig::Basic { user_var, pass_var } => {
            use base64::Engine;
            let user = resolve_env(user_var)?;
            let pass = resolve_env(pass_var)?;
            let credentials = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
            Ok(AppliedAuth {
                headers: vec![("authorization".to_string(), format!("Basic {credentials}"))],
                query_params: vec![],
            })
        }
        AuthConfig::AwsSig {
            access_key_var,
            secret_key_var,
            region,
            service,
        } => {
            let access_key = resolve_env(access_key_var)?;
            let secret_key = resolve_env(secret_key_var)?;
            let headers = sign_sigv4(&access_key, &secret_key, region, service, method, url, body)?;
            Ok(AppliedAuth {
                headers,
                query_params: vec![],
            })
        }
    }
}

/// Expand `${ENV_VAR}` references in a single auth value template.
fn expand_env_template(template: &str) -> Result<String, ProxyError> {
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static pattern");
    let mut err = None;
    let expanded = re.replace_all(template, |caps: &regex::Captures| match resolve_env(&caps[1]) {
        Ok(v) => v,
        Err(e) => {
            err = Some(e);
            String::new()
        }
    });
    match err {
        Some(e) => Err(e),
        None => Ok(expanded.into_owned()),
    }
}

/// Minimal AWS SigV4 signing of a single request: canonical request,
/// string-to-sign, derived signing key, and an `Authorization` header.
/// Signs the host, x-amz-date, and x-amz-content-sha256 headers — enough
/// for a GET against an S3-compatible object endpoint.
fn sign_sigv4(
    access_key: &str,
    secret_key: &str,
    region: &str,
    service: &str,
    method: &str,
    url: &str,
    body: &[u8],
) -> Result<Vec<(String, String)>, ProxyError> {
    let parsed = url::Url::parse(url).map_err(|e| ProxyError::Internal(format!("invalid source URL: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| ProxyError::Internal("source URL has no host".to_string()))?;
    let path = if parsed.path().is_empty() { "/" } else { parsed.path() };

    let now = chrono::Utc::now();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = now.format("%Y%m%d").to_string();
    let date_stamp = date_stamp.as_str();

    let payload_hash = hex::encode(Sha256::digest(body));
    let canonical_headers = format!(
        "host:{host}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n"
    );
    let signed_headers = "host;x-amz-content-sha256;x-amz-date";
    let canonical_query = parsed.query().unwrap_or("");

    let canonical_request = format!(
        "{method}\n{path}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    );

    let credential_scope = format!("{date_stamp}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{credential_scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signing_key = derive_signing_key(secret_key, date_stamp, region, service);
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    let authorization = format!(
        "AWS4-HMAC-SHA256 Credential={access_key}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}"
    );

    Ok(vec![
        ("x-amz-date".to_string(), amz_date),
        ("x-amz-content-sha256".to_string(), payload_hash),
        ("authorization".to_string(), authorization),
    ])
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}
