//! ZATCA CSID API client and response types.
use base64ct::{Base64, Encoding};
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use x509_cert::request::CertReq;

use crate::{
    certificate::{CertificateError, SigningCertificate},
    config::{with_trailing_slash, Config, EnvironmentType, BASE_URL_ENV},
    csr::ToBase64String,
};
use std::marker::PhantomData;

/// Errors returned by the ZATCA API client.
#[derive(Error, Debug)]
pub enum ZatcaError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid response from ZATCA: {0}")]
    InvalidResponse(String),
    #[error("Request rejected by ZATCA: {}", describe_messages(.0))]
    Rejected(Vec<ValidationMessage>),
    #[error("Unauthorized: {0:?}")]
    Unauthorized(UnauthorizedResponse),
    #[error("Server error: {0:?}")]
    ServerError(ServerErrorResponse),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Client state error: {0}")]
    ClientState(String),
}

fn describe_messages(messages: &[ValidationMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            format!(
                "{}: {}",
                m.code().unwrap_or("unknown"),
                m.message().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Marker trait for API token scope, either Compliance (CCSID) or Production (PCSID).
pub trait TokenScope {}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// Compliance (CCSID) token scope.
pub struct Compliance;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// Production (PCSID) token scope.
pub struct Production;
impl TokenScope for Compliance {}
impl TokenScope for Production {}

/// ZATCA CSID client.
///
/// The base URL is, in order: [`Config::with_base_url`], the `TAWQI_ZATCA_BASE_URL`
/// environment variable, then the environment's gateway.
///
/// # Examples
/// ```rust,no_run
/// use tawqi_core::api::{ZatcaClient, ZatcaError};
/// use tawqi_core::config::Config;
///
/// let client = ZatcaClient::new(Config::default())?;
/// # let _ = client;
/// # Ok::<(), ZatcaError>(())
/// ```
#[derive(Debug)]
pub struct ZatcaClient {
    config: Config,
    client: Client,
    base_url: String,
}

/// Validation message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationMessage {
    #[serde(rename = "type", default)]
    message_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl ValidationMessage {
    pub fn message_type(&self) -> Option<&str> {
        self.message_type.as_deref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

/// Unauthorized response body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnauthorizedResponse {
    timestamp: Option<i64>,
    status: Option<u16>,
    error: Option<String>,
    message: Option<String>,
}

impl UnauthorizedResponse {
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Server error response body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerErrorResponse {
    category: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

impl ServerErrorResponse {
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// CSID credentials used for API calls.
/// Obtained from [post_csr_for_ccsid][ZatcaClient::post_csr_for_ccsid],
/// [post_ccsid_for_pcsid][ZatcaClient::post_ccsid_for_pcsid] or
/// [renew_csid][ZatcaClient::renew_csid], or constructed manually.
///
/// # Examples
/// ```rust
/// use tawqi_core::api::{CsidCredentials, Compliance};
/// use tawqi_core::config::EnvironmentType;
///
/// let creds = CsidCredentials::<Compliance>::new(
///     EnvironmentType::NonProduction,
///     Some(1234567890123),
///     "TUlJQ1BUQ0NBZU9nQXdJQkFnS",
///     "Dehvg1fc8GF6Jwt5bOxXwC6en",
/// );
/// assert!(creds.authorization_header().starts_with("Basic "));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CsidCredentials<T> {
    env: EnvironmentType,
    request_id: Option<u64>,
    binary_security_token: String,
    secret: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> CsidCredentials<T> {
    /// Create credential bundle for ZATCA requests.
    pub fn new(
        env: EnvironmentType,
        request_id: Option<u64>,
        binary_security_token: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            env,
            request_id,
            binary_security_token: binary_security_token.into(),
            secret: secret.into(),
            _marker: PhantomData,
        }
    }

    pub fn env(&self) -> EnvironmentType {
        self.env
    }

    pub fn request_id(&self) -> Option<u64> {
        self.request_id
    }

    pub fn binary_security_token(&self) -> &str {
        &self.binary_security_token
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// `Basic base64(binarySecurityToken:secret)`
    pub fn authorization_header(&self) -> String {
        let pair = format!("{}:{}", self.binary_security_token, self.secret);
        format!("Basic {}", Base64::encode_string(pair.as_bytes()))
    }

    /// The issued certificate carried in the binary security token.
    pub fn certificate(&self) -> Result<SigningCertificate, CertificateError> {
        SigningCertificate::from_binary_security_token(&self.binary_security_token)
    }
}

impl<T> std::fmt::Debug for CsidCredentials<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsidCredentials")
            .field("env", &self.env)
            .field("request_id", &self.request_id)
            .field("binary_security_token", &self.binary_security_token)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CsidResponseBody {
    #[serde(rename = "requestID")]
    request_id: Option<u64>,
    #[serde(rename = "binarySecurityToken")]
    binary_security_token: String,
    secret: String,
    #[serde(rename = "dispositionMessage")]
    disposition_message: Option<String>,
    #[serde(default)]
    warnings: Option<Vec<ValidationMessage>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RenewalResponseBody {
    Direct(CsidResponseBody),
    Wrapped { value: CsidResponseBody },
}

#[derive(Debug, Deserialize)]
struct RejectionBody {
    #[serde(default)]
    errors: Option<Vec<ValidationMessage>>,
}

// Public API
impl ZatcaClient {
    /// Create a new API client using the provided configuration.
    ///
    /// # Errors
    /// Returns [`ZatcaError::Http`] if the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, ZatcaError> {
        let client = Client::builder().build().map_err(ZatcaError::Http)?;
        let base_url = match std::env::var(BASE_URL_ENV) {
            Ok(value) if !config.has_base_url_override() && !value.trim().is_empty() => {
                with_trailing_slash(value.trim().to_string())
            }
            _ => config.base_url(),
        };
        log::debug!(
            "ZATCA client for {} using {base_url}",
            config.env().as_str()
        );

        Ok(Self {
            config,
            client,
            base_url,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request a compliance CSID by submitting a CSR with the portal OTP.
    /// See [ZATCA
    /// documentation](https://sandbox.zatca.gov.sa/IntegrationSandbox/complianceCert-api) for more details.
    ///
    /// # Errors
    /// Returns [`ZatcaError`] if the request fails or the response cannot be parsed.
    pub async fn post_csr_for_ccsid(
        &self,
        csr: &CertReq,
        otp: &str,
    ) -> Result<CsidCredentials<Compliance>, ZatcaError> {
        let csr_payload = csr_payload(csr)?;
        let request = self
            .request(self.client.post(self.build_endpoint("compliance")))
            .header("OTP", otp)
            .json(&csr_payload);

        let payload = self.send(request, false).await?;
        Ok(self.credentials(payload))
    }

    /// Request a production CSID using a compliance CSID previously obtained from
    /// [post_csr_for_ccsid][ZatcaClient::post_csr_for_ccsid].
    /// See [ZATCA documentation](https://sandbox.zatca.gov.sa/Integration/request-api) for more details.
    ///
    /// # Errors
    /// Returns [`ZatcaError`] if the request fails or the compliance CSID is missing data.
    pub async fn post_ccsid_for_pcsid(
        &self,
        ccsid: &CsidCredentials<Compliance>,
    ) -> Result<CsidCredentials<Production>, ZatcaError> {
        self.ensure_env(ccsid)?;
        let request_id = ccsid
            .request_id()
            .ok_or_else(|| ZatcaError::ClientState("Missing compliance request_id".into()))?;
        let payload = serde_json::json!({
            "compliance_request_id": request_id,
        });

        let request = self
            .request(self.client.post(self.build_endpoint("production/csids")))
            .header(header::AUTHORIZATION, ccsid.authorization_header())
            .json(&payload);

        let payload = self.send(request, false).await?;
        Ok(self.credentials(payload))
    }

    /// Renew a production CSID by submitting a new CSR.
    /// See [ZATCA documentation](https://sandbox.zatca.gov.sa/Integration/renewal-api) for more details.
    ///
    /// # Errors
    /// Returns [`ZatcaError`] if the request fails or the response cannot be parsed.
    pub async fn renew_csid(
        &self,
        pcsid: &CsidCredentials<Production>,
        csr: &CertReq,
        otp: &str,
        accept_language: Option<&str>,
    ) -> Result<CsidCredentials<Production>, ZatcaError> {
        self.ensure_env(pcsid)?;
        let csr_payload = csr_payload(csr)?;
        let language = match accept_language {
            Some("ar") => "ar",
            _ => "en",
        };
        let request = self
            .request(self.client.patch(self.build_endpoint("production/csids")))
            .header("OTP", otp)
            .header(header::ACCEPT_LANGUAGE, language)
            .header(header::AUTHORIZATION, pcsid.authorization_header())
            .json(&csr_payload);

        let payload = self.send(request, true).await?;
        Ok(self.credentials(payload))
    }
}

// Private API
impl ZatcaClient {
    fn build_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    fn ensure_env<T>(&self, creds: &CsidCredentials<T>) -> Result<(), ZatcaError> {
        if creds.env() != self.config.env() {
            return Err(ZatcaError::ClientState("CSID environment mismatch".into()));
        }
        Ok(())
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(header::ACCEPT, "application/json")
            .header("Accept-Version", "V2")
    }

    fn credentials<T>(&self, payload: CsidResponseBody) -> CsidCredentials<T> {
        if let Some(message) = payload.disposition_message.as_deref() {
            log::info!("ZATCA disposition: {message}");
        }
        for warning in payload.warnings.iter().flatten() {
            log::warn!(
                "ZATCA warning {}: {}",
                warning.code().unwrap_or("unknown"),
                warning.message().unwrap_or_default()
            );
        }
        CsidCredentials::new(
            self.config.env(),
            payload.request_id,
            payload.binary_security_token,
            payload.secret,
        )
    }

    /// Send and map the status. Renewal answers `428` with a usable body.
    async fn send(
        &self,
        request: RequestBuilder,
        renewal: bool,
    ) -> Result<CsidResponseBody, ZatcaError> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ZatcaError::NetworkError(e.to_string())
            } else {
                ZatcaError::Http(e)
            }
        })?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() || (renewal && status == StatusCode::PRECONDITION_REQUIRED) {
            let parsed: RenewalResponseBody = serde_json::from_str(&body)
                .map_err(|e| ZatcaError::InvalidResponse(format!("Invalid response: {e}")))?;
            return Ok(match parsed {
                RenewalResponseBody::Direct(value) => value,
                RenewalResponseBody::Wrapped { value } => value,
            });
        }

        if status == StatusCode::UNAUTHORIZED {
            let parsed = serde_json::from_str::<UnauthorizedResponse>(&body).unwrap_or_else(|_| {
                UnauthorizedResponse {
                    timestamp: None,
                    status: Some(401),
                    error: Some("Unauthorized".into()),
                    message: Some(body.clone()),
                }
            });
            return Err(ZatcaError::Unauthorized(parsed));
        }

        if status.is_server_error() {
            let parsed = serde_json::from_str::<ServerErrorResponse>(&body).unwrap_or_else(|_| {
                ServerErrorResponse {
                    category: None,
                    code: Some("ServerError".into()),
                    message: Some(body.clone()),
                }
            });
            return Err(ZatcaError::ServerError(parsed));
        }

        if let Ok(RejectionBody {
            errors: Some(errors),
        }) = serde_json::from_str::<RejectionBody>(&body)
        {
            if !errors.is_empty() {
                return Err(ZatcaError::Rejected(errors));
            }
        }

        Err(ZatcaError::InvalidResponse(format!(
            "status {status}: {body}"
        )))
    }
}

fn csr_payload(csr: &CertReq) -> Result<serde_json::Value, ZatcaError> {
    let encoded_csr = csr
        .to_pem_base64_string()
        .map_err(|e| ZatcaError::ClientState(e.to_string()))?;
    Ok(serde_json::json!({ "csr": encoded_csr }))
}
