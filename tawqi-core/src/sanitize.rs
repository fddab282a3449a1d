//! Normalization of free-text identity fields before they are embedded in ASN.1.
use thiserror::Error;

/// Errors returned by [`sanitize`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("identity field is empty")]
    Empty,
    #[error("identity field '{input}' contains no permitted characters")]
    NoPermittedCharacters { input: String },
}

/// Trim `text` and drop every character that is not alphanumeric, whitespace, `-` or `_`.
///
/// # Examples
/// ```rust
/// use tawqi_core::sanitize::sanitize;
///
/// assert_eq!(sanitize("  Solution@Name! ")?, "SolutionName");
/// # Ok::<(), tawqi_core::sanitize::SanitizeError>(())
/// ```
///
/// # Errors
/// Returns [`SanitizeError::Empty`] for blank input and
/// [`SanitizeError::NoPermittedCharacters`] when nothing survives the filter.
pub fn sanitize(text: &str) -> Result<String, SanitizeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SanitizeError::Empty);
    }

    let cleaned: String = trimmed.chars().filter(|c| is_permitted(*c)).collect();
    if cleaned.is_empty() {
        return Err(SanitizeError::NoPermittedCharacters {
            input: text.to_string(),
        });
    }
    Ok(cleaned)
}

fn is_permitted(c: char) -> bool {
    c.is_alphanumeric() || c.is_whitespace() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_special_characters() {
        assert_eq!(sanitize("Solution@Name!").unwrap(), "SolutionName");
        assert_eq!(sanitize("Riyadh Branch").unwrap(), "Riyadh Branch");
        assert_eq!(
            sanitize("ed22f1d8-e6a2_1118").unwrap(),
            "ed22f1d8-e6a2_1118"
        );
    }

    #[test]
    fn keeps_non_ascii_letters() {
        assert_eq!(sanitize("شركة (الرياض)").unwrap(), "شركة الرياض");
    }

    #[test]
    fn rejects_blank_input() {
        assert_eq!(sanitize("   "), Err(SanitizeError::Empty));
        assert_eq!(sanitize(""), Err(SanitizeError::Empty));
    }

    #[test]
    fn rejects_input_with_nothing_permitted() {
        assert!(matches!(
            sanitize("@@!!"),
            Err(SanitizeError::NoPermittedCharacters { .. })
        ));
    }

    #[test]
    fn filtering_happens_after_trimming() {
        assert_eq!(sanitize("Name !").unwrap(), "Name ");
        assert_eq!(sanitize("@@ !!").unwrap(), " ");
    }
}
