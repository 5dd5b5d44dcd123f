//! Centralized validation and helper functions.

/// Longest INFO key accepted as an output column
pub const MAX_INFO_KEY_LENGTH: usize = 256;

/// Returns true if the allele is a plain nucleotide sequence (A, C, G, T, N; any case).
///
/// # Examples
///
/// ```
/// use vcf_annotator::utils::validation::is_nucleotide_sequence;
///
/// assert!(is_nucleotide_sequence("ACGTN"));
/// assert!(is_nucleotide_sequence("acgt"));
/// assert!(!is_nucleotide_sequence("<DEL>"));
/// assert!(!is_nucleotide_sequence(""));
/// ```
#[must_use]
pub fn is_nucleotide_sequence(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N'))
}

/// Returns true for the symbolic allele notations VCF defines:
/// `<ID>` tokens, the `*` overlapping-deletion marker and breakends.
#[must_use]
pub fn is_symbolic_allele(s: &str) -> bool {
    (s.starts_with('<') && s.ends_with('>') && s.len() > 2)
        || s == "*"
        || s.contains('[')
        || s.contains(']')
        || (s.len() > 1 && (s.starts_with('.') || s.ends_with('.')))
}

/// Returns true if the allele is neither a nucleotide sequence nor a known
/// symbolic form. Such alleles are still accepted but are worth a warning.
#[must_use]
pub fn is_unusual_allele(s: &str) -> bool {
    !is_nucleotide_sequence(s) && !is_symbolic_allele(s)
}

/// Replace characters that would break a tab-separated row.
#[must_use]
pub fn sanitize_field(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains(['\t', '\n', '\r']) {
        std::borrow::Cow::Owned(value.replace(['\t', '\n', '\r'], " "))
    } else {
        std::borrow::Cow::Borrowed(value)
    }
}

/// Validation errors for user-supplied column options
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Empty column name")]
    EmptyName,
    #[error("Column name too long: exceeds {MAX_INFO_KEY_LENGTH} characters")]
    NameTooLong,
    #[error("Invalid column name '{0}': only letters, digits, '_' and '.' are allowed")]
    InvalidName(String),
}

/// Validate an INFO key or column prefix supplied on the command line.
///
/// # Errors
///
/// Returns `ValidationError::EmptyName` if the name is empty,
/// `ValidationError::NameTooLong` if it exceeds the limit, or
/// `ValidationError::InvalidName` if it contains characters that are not
/// allowed in a VCF INFO key.
pub fn validate_column_name(name: &str) -> Result<&str, ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.len() > MAX_INFO_KEY_LENGTH {
        return Err(ValidationError::NameTooLong);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(name)
}
