use std::{collections::HashMap, fmt, io::Read, str::FromStr};

use thiserror::Error;

use super::CsrError;
use crate::sanitize::{sanitize, SanitizeError};

pub(crate) const DEFAULT_COUNTRY: &str = "SA";
/// Standard and simplified invoices.
pub(crate) const DEFAULT_INVOICE_TYPE: u32 = 1100;
const MAX_INVOICE_TYPE: u32 = 9999;

/// Identity fields carried by a CSR.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityField {
    OrganizationIdentifier,
    SerialNumber,
    CommonName,
    CountryName,
    OrganizationName,
    OrganizationUnitName,
    Address,
    InvoiceType,
    BusinessCategory,
}

impl IdentityField {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityField::OrganizationIdentifier => "organization_identifier",
            IdentityField::SerialNumber => "serial_number",
            IdentityField::CommonName => "common_name",
            IdentityField::CountryName => "country_name",
            IdentityField::OrganizationName => "organization_name",
            IdentityField::OrganizationUnitName => "organization_unit_name",
            IdentityField::Address => "location_address",
            IdentityField::InvoiceType => "invoice_type",
            IdentityField::BusinessCategory => "industry_business_category",
        }
    }

    /// Key used by the SDK's `csr-config.properties` files.
    pub fn property_key(&self) -> &'static str {
        match self {
            IdentityField::OrganizationIdentifier => "csr.organization.identifier",
            IdentityField::SerialNumber => "csr.serial.number",
            IdentityField::CommonName => "csr.common.name",
            IdentityField::CountryName => "csr.country.name",
            IdentityField::OrganizationName => "csr.organization.name",
            IdentityField::OrganizationUnitName => "csr.organization.unit.name",
            IdentityField::Address => "csr.location.address",
            IdentityField::InvoiceType => "csr.invoice.type",
            IdentityField::BusinessCategory => "csr.industry.business.category",
        }
    }

    const ALL: [IdentityField; 9] = [
        IdentityField::CommonName,
        IdentityField::SerialNumber,
        IdentityField::OrganizationIdentifier,
        IdentityField::OrganizationUnitName,
        IdentityField::OrganizationName,
        IdentityField::CountryName,
        IdentityField::InvoiceType,
        IdentityField::Address,
        IdentityField::BusinessCategory,
    ];
}

impl fmt::Display for IdentityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a field-level problem.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    Missing,
    Empty,
    InvalidFormat,
    OutOfRange,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IssueKind::Missing => "missing",
            IssueKind::Empty => "empty",
            IssueKind::InvalidFormat => "invalid format",
            IssueKind::OutOfRange => "out of range",
        };
        f.write_str(text)
    }
}

impl From<SanitizeError> for IssueKind {
    fn from(err: SanitizeError) -> Self {
        match err {
            SanitizeError::Empty => IssueKind::Empty,
            SanitizeError::NoPermittedCharacters { .. } => IssueKind::InvalidFormat,
        }
    }
}

/// Single validation issue, with the raw value that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: IdentityField,
    pub kind: IssueKind,
    pub value: String,
}

/// Every problem found in an identity profile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("identity profile validation failed: {}", describe(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn fields(&self) -> Vec<IdentityField> {
        self.issues.iter().map(|issue| issue.field).collect()
    }
}

fn describe(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{} is {} ('{}')", issue.field, issue.kind, issue.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// EGS unit serial: solution name, model and device serial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialDescriptor {
    pub solution: String,
    pub model: String,
    pub serial: String,
}

impl SerialDescriptor {
    pub fn new(
        solution: impl Into<String>,
        model: impl Into<String>,
        serial: impl Into<String>,
    ) -> Self {
        Self {
            solution: solution.into(),
            model: model.into(),
            serial: serial.into(),
        }
    }

    /// `1-{solution}|2-{model}|3-{serial}` with each component sanitized.
    pub fn render(&self) -> Result<String, SanitizeError> {
        Ok(format!(
            "1-{}|2-{}|3-{}",
            sanitize(&self.solution)?,
            sanitize(&self.model)?,
            sanitize(&self.serial)?
        ))
    }
}

impl FromStr for SerialDescriptor {
    type Err = IssueKind;

    /// Parse the SDK form `1-solution|2-model|3-serial`.
    fn from_str(value: &str) -> Result<Self, IssueKind> {
        let parts: Vec<&str> = value.trim().split('|').collect();
        let [solution, model, serial] = parts[..] else {
            return Err(IssueKind::InvalidFormat);
        };
        let strip = |part: &str, prefix: &str| {
            part.trim()
                .strip_prefix(prefix)
                .map(str::to_string)
                .ok_or(IssueKind::InvalidFormat)
        };
        Ok(Self {
            solution: strip(solution, "1-")?,
            model: strip(model, "2-")?,
            serial: strip(serial, "3-")?,
        })
    }
}

/// Taxpayer/device identity bound into a CSR.
///
/// # Examples
/// ```rust
/// use tawqi_core::csr::{IdentityProfile, SerialDescriptor};
///
/// let profile = IdentityProfile {
///     organization_identifier: "312345678901233".into(),
///     serial: SerialDescriptor::new("TST", "TST", "ed22f1d8-e6a2-1118-9b58-d9a8f11e445f"),
///     common_name: "TST-886431145-312345678901233".into(),
///     country_name: "SA".into(),
///     organization_name: "Maximum Speed Tech Supply LTD".into(),
///     organization_unit_name: "Riyadh Branch".into(),
///     address: "RRRD2929".into(),
///     invoice_type: 1100,
///     business_category: "Supply activities".into(),
///     production: false,
/// };
/// assert!(profile.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProfile {
    pub organization_identifier: String,
    pub serial: SerialDescriptor,
    pub common_name: String,
    pub country_name: String,
    pub organization_name: String,
    pub organization_unit_name: String,
    pub address: String,
    pub invoice_type: u32,
    pub business_category: String,
    /// Selects the production code-signing template.
    pub production: bool,
}

/// Profile values after sanitization, ready to be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedProfile {
    pub organization_identifier: String,
    pub serial_number: String,
    pub common_name: String,
    pub country_name: String,
    pub organization_name: String,
    pub organization_unit_name: String,
    pub address: String,
    pub title: String,
    pub business_category: String,
    pub production: bool,
}

impl IdentityProfile {
    /// Validate every field, reporting all problems together.
    ///
    /// # Errors
    /// Returns [`ValidationError`] listing each offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validated().map(|_| ())
    }

    /// Sanitized values ready for encoding, or every validation issue.
    pub(crate) fn validated(&self) -> Result<ValidatedProfile, ValidationError> {
        let mut issues = Vec::new();
        let mut check = |field: IdentityField, raw: String, result: Result<String, IssueKind>| {
            result
                .map_err(|kind| {
                    issues.push(ValidationIssue {
                        field,
                        kind,
                        value: raw,
                    })
                })
                .ok()
        };

        let organization_identifier = check(
            IdentityField::OrganizationIdentifier,
            self.organization_identifier.clone(),
            check_organization_identifier(&self.organization_identifier),
        );
        let serial_number = check(
            IdentityField::SerialNumber,
            format!(
                "1-{}|2-{}|3-{}",
                self.serial.solution, self.serial.model, self.serial.serial
            ),
            self.serial.render().map_err(IssueKind::from),
        );
        let common_name = check(
            IdentityField::CommonName,
            self.common_name.clone(),
            check_text(&self.common_name),
        );
        let country_name = check(
            IdentityField::CountryName,
            self.country_name.clone(),
            check_country(&self.country_name),
        );
        let organization_name = check(
            IdentityField::OrganizationName,
            self.organization_name.clone(),
            check_text(&self.organization_name),
        );
        let organization_unit_name = check(
            IdentityField::OrganizationUnitName,
            self.organization_unit_name.clone(),
            check_text(&self.organization_unit_name),
        );
        let address = check(
            IdentityField::Address,
            self.address.clone(),
            check_text(&self.address),
        );
        let title = check(
            IdentityField::InvoiceType,
            self.invoice_type.to_string(),
            check_invoice_type(self.invoice_type).map(|code| format!("{code:04}")),
        );
        let business_category = check(
            IdentityField::BusinessCategory,
            self.business_category.clone(),
            check_text(&self.business_category),
        );

        match (
            organization_identifier,
            serial_number,
            common_name,
            country_name,
            organization_name,
            organization_unit_name,
            address,
            title,
            business_category,
        ) {
            (
                Some(organization_identifier),
                Some(serial_number),
                Some(common_name),
                Some(country_name),
                Some(organization_name),
                Some(organization_unit_name),
                Some(address),
                Some(title),
                Some(business_category),
            ) => Ok(ValidatedProfile {
                organization_identifier,
                serial_number,
                common_name,
                country_name,
                organization_name,
                organization_unit_name,
                address,
                title,
                business_category,
                production: self.production,
            }),
            _ => Err(ValidationError::new(issues)),
        }
    }

    /// Read a profile from the SDK's `csr-config.properties` format.
    ///
    /// # Examples
    /// ```rust
    /// use tawqi_core::csr::IdentityProfile;
    ///
    /// let props = "\
    /// csr.common.name=TST-886431145-399999999900003
    /// csr.serial.number=1-TST|2-TST|3-ed22f1d8-e6a2-1118-9b58-d9a8f11e445f
    /// csr.organization.identifier=399999999900003
    /// csr.organization.unit.name=Riyadh Branch
    /// csr.organization.name=Maximum Speed Tech Supply LTD
    /// csr.country.name=SA
    /// csr.invoice.type=1100
    /// csr.location.address=RRRD2929
    /// csr.industry.business.category=Supply activities
    /// ";
    /// let profile = IdentityProfile::from_properties(props.as_bytes(), false)?;
    /// assert_eq!(profile.serial.model, "TST");
    /// # Ok::<(), tawqi_core::csr::CsrError>(())
    /// ```
    ///
    /// # Errors
    /// Returns [`CsrError::PropertiesRead`] for malformed input,
    /// [`CsrError::MissingRequiredFields`] naming every absent key, and
    /// [`CsrError::Validation`] for values that cannot be parsed.
    pub fn from_properties<R: Read>(reader: R, production: bool) -> Result<Self, CsrError> {
        let map = java_properties::read(reader)
            .map_err(|source| CsrError::PropertiesRead { source })?;

        let missing: Vec<IdentityField> = IdentityField::ALL
            .into_iter()
            .filter(|field| lookup(&map, *field).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(CsrError::MissingRequiredFields(missing));
        }
        let value = |field: IdentityField| lookup(&map, field).unwrap_or_default();

        let mut issues = Vec::new();
        let serial_raw = value(IdentityField::SerialNumber);
        let serial = serial_raw
            .parse::<SerialDescriptor>()
            .map_err(|kind| {
                issues.push(ValidationIssue {
                    field: IdentityField::SerialNumber,
                    kind,
                    value: serial_raw.clone(),
                })
            })
            .ok();
        let invoice_type_raw = value(IdentityField::InvoiceType);
        let invoice_type = invoice_type_raw
            .trim()
            .parse::<u32>()
            .map_err(|_| {
                issues.push(ValidationIssue {
                    field: IdentityField::InvoiceType,
                    kind: IssueKind::InvalidFormat,
                    value: invoice_type_raw.clone(),
                })
            })
            .ok();

        let (Some(serial), Some(invoice_type)) = (serial, invoice_type) else {
            return Err(ValidationError::new(issues).into());
        };

        Ok(Self {
            organization_identifier: value(IdentityField::OrganizationIdentifier),
            serial,
            common_name: value(IdentityField::CommonName),
            country_name: value(IdentityField::CountryName),
            organization_name: value(IdentityField::OrganizationName),
            organization_unit_name: value(IdentityField::OrganizationUnitName),
            address: value(IdentityField::Address),
            invoice_type,
            business_category: value(IdentityField::BusinessCategory),
            production,
        })
    }
}

fn lookup(map: &HashMap<String, String>, field: IdentityField) -> Option<String> {
    map.get(field.property_key())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `3` + 13 digits + `3`.
pub(crate) fn check_organization_identifier(value: &str) -> Result<String, IssueKind> {
    let value = value.trim();
    if value.is_empty() {
        return Err(IssueKind::Empty);
    }
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 15
        && bytes.iter().all(u8::is_ascii_digit)
        && bytes[0] == b'3'
        && bytes[14] == b'3';
    if !well_formed {
        return Err(IssueKind::InvalidFormat);
    }
    Ok(value.to_string())
}

pub(crate) fn check_country(value: &str) -> Result<String, IssueKind> {
    let value = value.trim();
    if value.is_empty() {
        return Err(IssueKind::Empty);
    }
    if value.chars().count() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(IssueKind::InvalidFormat);
    }
    Ok(value.to_ascii_uppercase())
}

pub(crate) fn check_invoice_type(code: u32) -> Result<u32, IssueKind> {
    if code > MAX_INVOICE_TYPE {
        return Err(IssueKind::OutOfRange);
    }
    Ok(code)
}

pub(crate) fn check_text(value: &str) -> Result<String, IssueKind> {
    sanitize(value).map_err(IssueKind::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> IdentityProfile {
        IdentityProfile {
            organization_identifier: "312345678901233".into(),
            serial: SerialDescriptor::new("TST", "TST", "ed22f1d8-e6a2-1118-9b58-d9a8f11e445f"),
            common_name: "TST-886431145-312345678901233".into(),
            country_name: "sa".into(),
            organization_name: "Maximum Speed Tech Supply LTD".into(),
            organization_unit_name: "Riyadh Branch".into(),
            address: "RRRD2929".into(),
            invoice_type: 100,
            business_category: "Supply activities".into(),
            production: false,
        }
    }

    #[test]
    fn organization_identifier_boundaries() {
        assert!(check_organization_identifier("312345678901233").is_ok());
        assert_eq!(
            check_organization_identifier("31234567890123"),
            Err(IssueKind::InvalidFormat)
        );
        assert_eq!(
            check_organization_identifier("412345678901234"),
            Err(IssueKind::InvalidFormat)
        );
        assert_eq!(
            check_organization_identifier("31234567890123a"),
            Err(IssueKind::InvalidFormat)
        );
        assert_eq!(check_organization_identifier(" "), Err(IssueKind::Empty));
    }

    #[test]
    fn country_is_upper_cased() {
        assert_eq!(check_country(" sa ").unwrap(), "SA");
        assert_eq!(check_country("SAU"), Err(IssueKind::InvalidFormat));
        assert_eq!(check_country("S1"), Err(IssueKind::InvalidFormat));
    }

    #[test]
    fn invoice_type_range() {
        assert_eq!(check_invoice_type(0), Ok(0));
        assert_eq!(check_invoice_type(9999), Ok(9999));
        assert_eq!(check_invoice_type(10000), Err(IssueKind::OutOfRange));
    }

    #[test]
    fn validate_sanitizes_and_pads() {
        let validated = profile().validated().expect("valid profile");
        assert_eq!(validated.country_name, "SA");
        assert_eq!(validated.title, "0100");
        assert_eq!(
            validated.serial_number,
            "1-TST|2-TST|3-ed22f1d8-e6a2-1118-9b58-d9a8f11e445f"
        );
    }

    #[test]
    fn validate_reports_every_issue() {
        let mut bad = profile();
        bad.organization_identifier = "412345678901234".into();
        bad.country_name = "SAU".into();
        bad.address = "  ".into();
        bad.invoice_type = 12_000;
        bad.serial.model = "!!".into();

        let err = bad.validate().expect_err("invalid profile");
        let fields = err.fields();
        assert_eq!(err.issues.len(), 5);
        assert!(fields.contains(&IdentityField::OrganizationIdentifier));
        assert!(fields.contains(&IdentityField::CountryName));
        assert!(fields.contains(&IdentityField::Address));
        assert!(fields.contains(&IdentityField::InvoiceType));
        assert!(fields.contains(&IdentityField::SerialNumber));
        assert!(err.to_string().contains("412345678901234"));
    }

    #[test]
    fn serial_descriptor_parses_sdk_form() {
        let parsed: SerialDescriptor = "1-TST|2-Model X|3-abc".parse().unwrap();
        assert_eq!(parsed, SerialDescriptor::new("TST", "Model X", "abc"));
        assert_eq!(
            "1-TST|2-TST".parse::<SerialDescriptor>(),
            Err(IssueKind::InvalidFormat)
        );
        assert_eq!(
            "TST|TST|TST".parse::<SerialDescriptor>(),
            Err(IssueKind::InvalidFormat)
        );
    }

    #[test]
    fn properties_report_all_missing_keys() {
        let props = "csr.common.name=TST\ncsr.country.name=SA\n";
        match IdentityProfile::from_properties(props.as_bytes(), false) {
            Err(CsrError::MissingRequiredFields(fields)) => {
                assert_eq!(fields.len(), 7);
                assert!(fields.contains(&IdentityField::OrganizationIdentifier));
                assert!(fields.contains(&IdentityField::BusinessCategory));
                assert!(!fields.contains(&IdentityField::CommonName));
            }
            other => panic!("expected missing fields, got {other:?}"),
        }
    }
}
