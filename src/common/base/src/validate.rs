use std::collections::HashSet;

use crate::error::ValidationError;
use crate::point::Tags;

/// Characters accepted in every metric name, tag key and tag value besides letters and digits.
pub const DEFAULT_SPECIAL_CHARS: &str = "-_./";

/// validate_string ensures `s` is non-empty and only holds letters, digits, `-_./` or one of
/// the `allowed_special` characters.
pub fn validate_string(what: &str, s: &str, allowed_special: &str) -> Result<(), ValidationError> {
    if s.is_empty() {
        return Err(ValidationError::InvalidString {
            what: what.to_string(),
            value: s.to_string(),
            reason: "empty string".to_string(),
        });
    }

    for c in s.chars() {
        if c.is_alphanumeric() || DEFAULT_SPECIAL_CHARS.contains(c) {
            continue;
        }
        if !c.is_control() && allowed_special.contains(c) {
            continue;
        }
        return Err(ValidationError::InvalidString {
            what: what.to_string(),
            value: s.to_string(),
            reason: format!("illegal character {:?}", c),
        });
    }

    Ok(())
}

/// check_metric_and_tags validates the cardinality and characters of a series identity.
pub fn check_metric_and_tags(
    metric: &str,
    tags: &Tags,
    max_tags: usize,
    allowed_special: &str,
) -> Result<(), ValidationError> {
    if tags.is_empty() {
        return Err(ValidationError::NoTags(metric.to_string()));
    } else if tags.len() > max_tags {
        return Err(ValidationError::TooManyTags {
            count: tags.len(),
            max: max_tags,
        });
    }

    validate_string("metric name", metric, allowed_special)?;

    let mut seen = HashSet::with_capacity(tags.len());
    for tag in tags.iter() {
        validate_string(
            &format!("tag name with value [{}]", tag.value),
            &tag.key,
            allowed_special,
        )?;
        validate_string(
            &format!("tag value with key [{}]", tag.key),
            &tag.value,
            allowed_special,
        )?;
        if !seen.insert(tag.key.as_str()) {
            return Err(ValidationError::DuplicateTag(tag.key.clone()));
        }
    }

    Ok(())
}
