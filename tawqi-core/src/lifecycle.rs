//! Compliance, production and renewal sequencing for a device's CSIDs.
use std::{fmt, future::Future};

use thiserror::Error;
use x509_cert::request::CertReq;

use crate::{
    api::{Compliance, CsidCredentials, Production, ZatcaClient, ZatcaError},
    config::EnvironmentType,
    csr::{generate_csr, CsrError, GeneratedCsr, IdentityProfile},
};

/// The authority's certificate endpoints.
pub trait CsidAuthority {
    fn environment(&self) -> EnvironmentType;

    fn request_compliance_csid(
        &self,
        csr: &CertReq,
        otp: &str,
    ) -> impl Future<Output = Result<CsidCredentials<Compliance>, ZatcaError>> + Send;

    fn request_production_csid(
        &self,
        ccsid: &CsidCredentials<Compliance>,
    ) -> impl Future<Output = Result<CsidCredentials<Production>, ZatcaError>> + Send;

    fn renew_production_csid(
        &self,
        pcsid: &CsidCredentials<Production>,
        csr: &CertReq,
        otp: &str,
    ) -> impl Future<Output = Result<CsidCredentials<Production>, ZatcaError>> + Send;
}

impl CsidAuthority for ZatcaClient {
    fn environment(&self) -> EnvironmentType {
        self.config().env()
    }

    fn request_compliance_csid(
        &self,
        csr: &CertReq,
        otp: &str,
    ) -> impl Future<Output = Result<CsidCredentials<Compliance>, ZatcaError>> + Send {
        self.post_csr_for_ccsid(csr, otp)
    }

    fn request_production_csid(
        &self,
        ccsid: &CsidCredentials<Compliance>,
    ) -> impl Future<Output = Result<CsidCredentials<Production>, ZatcaError>> + Send {
        self.post_ccsid_for_pcsid(ccsid)
    }

    fn renew_production_csid(
        &self,
        pcsid: &CsidCredentials<Production>,
        csr: &CertReq,
        otp: &str,
    ) -> impl Future<Output = Result<CsidCredentials<Production>, ZatcaError>> + Send {
        self.renew_csid(pcsid, csr, otp, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    ComplianceCsid,
    ProductionCsid,
    Renewal,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LifecycleStage::ComplianceCsid => "compliance CSID request",
            LifecycleStage::ProductionCsid => "production CSID request",
            LifecycleStage::Renewal => "production CSID renewal",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Csr(#[from] CsrError),
    #[error("{stage} failed: {source}")]
    Api {
        stage: LifecycleStage,
        #[source]
        source: ZatcaError,
    },
}

/// Result of a full onboarding.
#[derive(Debug)]
pub struct OnboardedDevice {
    pub csr: GeneratedCsr,
    pub compliance: CsidCredentials<Compliance>,
    pub production: CsidCredentials<Production>,
}

/// Result of a renewal; the new key replaces the old one.
#[derive(Debug)]
pub struct RenewedDevice {
    pub csr: GeneratedCsr,
    pub production: CsidCredentials<Production>,
}

/// Drives the CSID exchanges in order. Holds no key material between calls.
#[derive(Debug)]
pub struct CertificateLifecycle<A> {
    authority: A,
}

impl<A: CsidAuthority> CertificateLifecycle<A> {
    pub fn new(authority: A) -> Self {
        Self { authority }
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    /// New CSR, then compliance CSID with `otp`, then production CSID.
    ///
    /// The CSR template follows the authority's environment, not `profile.production`.
    pub async fn onboard(
        &self,
        profile: &IdentityProfile,
        otp: &str,
    ) -> Result<OnboardedDevice, LifecycleError> {
        let csr = self.generate_for_environment(profile)?;

        log::info!("requesting compliance CSID for '{}'", profile.common_name);
        let compliance = self
            .authority
            .request_compliance_csid(csr.request(), otp)
            .await
            .map_err(|source| LifecycleError::Api {
                stage: LifecycleStage::ComplianceCsid,
                source,
            })?;

        log::info!(
            "requesting production CSID for compliance request {:?}",
            compliance.request_id()
        );
        let production = self
            .authority
            .request_production_csid(&compliance)
            .await
            .map_err(|source| LifecycleError::Api {
                stage: LifecycleStage::ProductionCsid,
                source,
            })?;

        log::info!("device '{}' onboarded", profile.common_name);
        Ok(OnboardedDevice {
            csr,
            compliance,
            production,
        })
    }

    /// New CSR, renewed with the current production CSID and `otp`.
    pub async fn renew(
        &self,
        current: &CsidCredentials<Production>,
        profile: &IdentityProfile,
        otp: &str,
    ) -> Result<RenewedDevice, LifecycleError> {
        let csr = self.generate_for_environment(profile)?;

        log::info!("renewing production CSID for '{}'", profile.common_name);
        let production = self
            .authority
            .renew_production_csid(current, csr.request(), otp)
            .await
            .map_err(|source| LifecycleError::Api {
                stage: LifecycleStage::Renewal,
                source,
            })?;

        Ok(RenewedDevice { csr, production })
    }

    fn generate_for_environment(
        &self,
        profile: &IdentityProfile,
    ) -> Result<GeneratedCsr, LifecycleError> {
        let production = self.authority.environment().is_production();
        if profile.production != production {
            log::debug!("using production={production} template for this environment");
        }
        let profile = IdentityProfile {
            production,
            ..profile.clone()
        };
        Ok(generate_csr(&profile)?)
    }
}
