//! Text checks applied before anything reaches the entity store.

use super::error::{SocialError, SocialResult};

/// Reject text that would change under strict HTML escaping.
///
/// Any `<`, `>` or `&` counts as markup, so stored text can be rendered
/// verbatim.
pub fn plain_text(field: &'static str, value: &str) -> SocialResult<()> {
    if value.contains(['<', '>', '&']) {
        return Err(SocialError::validation(field, "must not include HTML!"));
    }
    Ok(())
}

/// Markup-free and not blank.
pub fn required_text(field: &'static str, value: &str) -> SocialResult<()> {
    if value.trim().is_empty() {
        return Err(SocialError::validation(field, "must not be empty"));
    }
    plain_text(field, value)
}

pub fn username(value: &str) -> SocialResult<()> {
    required_text("username", value)?;
    if value.len() > 30 {
        return Err(SocialError::validation(
            "username",
            "must be at most 30 characters",
        ));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(SocialError::validation(
            "username",
            "may only contain letters, digits, '_' and '.'",
        ));
    }
    Ok(())
}

pub fn email(value: &str) -> SocialResult<()> {
    required_text("email", value)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(SocialError::validation("email", "must be a valid email address")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_caption_passes() {
        assert!(plain_text("caption", "hello").is_ok());
        assert!(plain_text("caption", "").is_ok());
    }

    #[test]
    fn markup_is_rejected() {
        let err = plain_text("caption", "<script>x</script>").unwrap_err();
        assert!(matches!(err, SocialError::Validation { field: "caption", .. }));
        assert!(plain_text("body", "fish & chips").is_err());
        assert!(plain_text("body", "1 > 0").is_err());
    }

    #[test]
    fn usernames_are_restricted() {
        assert!(username("jane.doe_1").is_ok());
        assert!(username("").is_err());
        assert!(username("has space").is_err());
        assert!(username(&"a".repeat(31)).is_err());
    }

    #[test]
    fn emails_need_domain() {
        assert!(email("a@b.co").is_ok());
        assert!(email("nobody").is_err());
        assert!(email("@b.co").is_err());
    }
}
