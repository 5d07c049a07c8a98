//! Local input checks run before any request leaves the client.

use shared::protocol::{NewOpportunity, ProfileUpdate, UserConfig};
use url::Url;

use crate::error::ClientError;

/// `local@domain.tld` with no whitespace and a single `@`.
pub fn validate_email(raw: &str) -> Result<String, ClientError> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(ClientError::validation("Please enter your email address"));
    }
    let invalid = || ClientError::validation("Please enter a valid email address");
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let has_inner_dot = domain
        .char_indices()
        .any(|(idx, ch)| ch == '.' && idx > 0 && idx + 1 < domain.len());
    if !has_inner_dot {
        return Err(invalid());
    }
    Ok(email.to_string())
}

pub fn validate_code(raw: &str) -> Result<String, ClientError> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(ClientError::validation("Please enter the code from your email"));
    }
    Ok(code.to_string())
}

/// Trims every field and checks the required ones.
pub fn validate_new_opportunity(input: &NewOpportunity) -> Result<NewOpportunity, ClientError> {
    let url = input.url.trim();
    let title = input.title.trim();
    let company_name = input.company_name.trim();
    if url.is_empty() {
        return Err(ClientError::validation("Please enter a job URL"));
    }
    if title.is_empty() {
        return Err(ClientError::validation("Please enter a job title"));
    }
    if company_name.is_empty() {
        return Err(ClientError::validation("Please enter a company name"));
    }
    Url::parse(url).map_err(|_| ClientError::validation("Please enter a valid URL"))?;

    let optional = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    Ok(NewOpportunity {
        url: url.to_string(),
        title: title.to_string(),
        company_name: company_name.to_string(),
        location: optional(&input.location),
        notes: optional(&input.notes),
    })
}

pub fn validate_user_config(config: &UserConfig) -> Result<(), ClientError> {
    if !(0..=100).contains(&config.digest_threshold) {
        return Err(ClientError::validation(
            "Digest threshold must be between 0 and 100",
        ));
    }
    Ok(())
}

/// Trims the display name; a blank name is rejected rather than sent.
pub fn validate_profile_update(update: &ProfileUpdate) -> Result<ProfileUpdate, ClientError> {
    let name = match update.name.as_deref().map(str::trim) {
        Some("") => return Err(ClientError::validation("Please enter a name")),
        other => other.map(str::to_string),
    };
    Ok(ProfileUpdate { name })
}
