// Consent evaluation and record construction.

use chrono::Utc;

use crate::types::ConsentRecord;

/// Whether an existing consent for this client already covers every
/// requested scope.
pub fn has_consent(
    existing: &[ConsentRecord],
    client_id: &str,
    requested_scopes: &[String],
) -> bool {
    existing.iter().any(|c| {
        c.client_id == client_id && requested_scopes.iter().all(|s| c.scopes.contains(s))
    })
}

/// Build a new consent record.
pub fn build_consent(
    user_id: &str,
    client_id: &str,
    scopes: &[String],
    reference_id: Option<&str>,
) -> ConsentRecord {
    let now = Utc::now();
    ConsentRecord {
        id: nanoid::nanoid!(),
        client_id: client_id.to_string(),
        user_id: user_id.to_string(),
        scopes: scopes.to_vec(),
        reference_id: reference_id.map(String::from),
        created_at: now,
        updated_at: now,
    }
}

/// Remove "consent" from a prompt list so a resumed authorize call does not
/// loop back into the consent page. Returns None when nothing remains.
pub fn strip_consent_prompt(prompt: Option<&str>) -> Option<String> {
    let remaining: Vec<&str> = prompt?
        .split_whitespace()
        .filter(|p| *p != "consent")
        .collect();
    if remaining.is_empty() {
        None
    } else {
        Some(remaining.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn consent_covers_subset() {
        let consent = build_consent("u1", "c1", &scopes(&["openid", "profile"]), None);
        assert!(has_consent(&[consent.clone()], "c1", &scopes(&["openid"])));
        assert!(has_consent(
            &[consent.clone()],
            "c1",
            &scopes(&["openid", "profile"])
        ));
        assert!(!has_consent(&[consent], "c1", &scopes(&["openid", "email"])));
    }

    #[test]
    fn no_consent_rows() {
        assert!(!has_consent(&[], "c1", &scopes(&["openid"])));
    }

    #[test]
    fn consent_is_per_client() {
        let consent = build_consent("u1", "c1", &scopes(&["openid"]), None);
        assert!(!has_consent(&[consent], "c2", &scopes(&["openid"])));
    }

    #[test]
    fn strip_consent_from_prompt() {
        assert_eq!(
            strip_consent_prompt(Some("login consent")).as_deref(),
            Some("login")
        );
        assert_eq!(strip_consent_prompt(Some("consent")), None);
        assert_eq!(strip_consent_prompt(None), None);
        assert_eq!(
            strip_consent_prompt(Some("select_account")).as_deref(),
            Some("select_account")
        );
    }
}
