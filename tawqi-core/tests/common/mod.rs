use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use k256::ecdsa::{DerSignature, SigningKey};
use tawqi_core::certificate::SigningCertificate;
use tawqi_core::csr::{IdentityProfile, SerialDescriptor};
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::Encode;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;

#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[allow(dead_code)]
pub fn sample_profile() -> IdentityProfile {
    IdentityProfile {
        organization_identifier: "312345678901233".into(),
        serial: SerialDescriptor::new("TST", "TST", "ed22f1d8-e6a2-1118-9b58-d9a8f11e445f"),
        common_name: "TST-886431145-312345678901233".into(),
        country_name: "SA".into(),
        organization_name: "Maximum Speed Tech Supply LTD".into(),
        organization_unit_name: "Riyadh Branch".into(),
        address: "RRRD2929".into(),
        invoice_type: 1100,
        business_category: "Supply activities".into(),
        production: false,
    }
}

/// Self-signed certificate with serial `0x1F` for `key`.
#[allow(dead_code)]
pub fn self_signed_certificate(key: &SigningKey) -> SigningCertificate {
    let serial_number = SerialNumber::new(&[0x1f]).expect("serial");
    let validity = Validity::from_now(Duration::from_secs(3600)).expect("validity");
    let subject = Name::from_str("CN=Test CA,O=Tawqi,C=SA").expect("subject");
    let spki = SubjectPublicKeyInfoOwned::from_key(*key.verifying_key()).expect("spki");

    let builder =
        CertificateBuilder::new(Profile::Root, serial_number, validity, subject, spki, key)
            .expect("builder");
    let certificate = builder.build::<DerSignature>().expect("certificate");
    let der = certificate.to_der().expect("certificate der");
    SigningCertificate::from_der(&der).expect("signing certificate")
}
