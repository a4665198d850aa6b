use crate::domain::{Identification, IdentificationType, Strategy, TypedId, User};

/// One available first-factor option surfaced to the client, with the
/// identification it would apply to and a (possibly masked) identifier
/// (spec §4.6.2).
#[derive(Clone, Debug, PartialEq)]
pub struct FirstFactorOption {
    pub strategy: Strategy,
    pub identification_id: Option<TypedId>,
    pub safe_identifier: Option<String>,
}

fn mask(identifier: &str, is_supplied: bool) -> String {
    if is_supplied {
        return identifier.to_owned();
    }
    match identifier.split_once('@') {
        Some((local, domain)) => {
            let visible: String = local.chars().take(1).collect();
            format!("{visible}{}@{domain}", "*".repeat(local.len().saturating_sub(1).max(1)))
        }
        None => {
            let keep = identifier.len().saturating_sub(4);
            format!("{}{}", "*".repeat(keep), &identifier[keep..])
        }
    }
}

/// Enumerates the factors available to `user` given their identifications
/// (spec §4.6.2). `supplied_identifier` is the identifier string the caller
/// signed in with, if any — it is shown unmasked.
pub fn enumerate_first_factors(
    user: &User,
    identifications: &[Identification],
    supplied_identifier: Option<&str>,
    clerk_js_version_at_least_reset_minimum: bool,
) -> Vec<FirstFactorOption> {
    let mut options = Vec::new();

    if user.password_digest.is_some() {
        options.push(FirstFactorOption {
            strategy: Strategy::Password,
            identification_id: None,
            safe_identifier: None,
        });
    }
    if user.totp_enabled {
        options.push(FirstFactorOption {
            strategy: Strategy::Totp,
            identification_id: None,
            safe_identifier: None,
        });
    }
    if user.backup_code_enabled {
        options.push(FirstFactorOption {
            strategy: Strategy::BackupCode,
            identification_id: None,
            safe_identifier: None,
        });
    }

    let mut has_passkey = false;
    for ident in identifications {
        let is_supplied = supplied_identifier.is_some_and(|s| ident.identifier.as_deref() == Some(s));
        let safe_identifier = ident.identifier.as_deref().map(|i| mask(i, is_supplied));
        match ident.kind {
            IdentificationType::EmailAddress => {
                options.push(FirstFactorOption {
                    strategy: Strategy::EmailCode,
                    identification_id: Some(ident.id.clone()),
                    safe_identifier: safe_identifier.clone(),
                });
                options.push(FirstFactorOption {
                    strategy: Strategy::EmailLink,
                    identification_id: Some(ident.id.clone()),
                    safe_identifier,
                });
            }
            IdentificationType::PhoneNumber => options.push(FirstFactorOption {
                strategy: Strategy::PhoneCode,
                identification_id: Some(ident.id.clone()),
                safe_identifier,
            }),
            IdentificationType::Web3Wallet => options.push(FirstFactorOption {
                strategy: Strategy::Web3Signature,
                identification_id: Some(ident.id.clone()),
                safe_identifier,
            }),
            IdentificationType::OauthProvider => options.push(FirstFactorOption {
                strategy: Strategy::OauthCallback,
                identification_id: Some(ident.id.clone()),
                safe_identifier,
            }),
            IdentificationType::Passkey => has_passkey = true,
            IdentificationType::Saml | IdentificationType::Username => {}
        }
    }
    if has_passkey {
        options.push(FirstFactorOption {
            strategy: Strategy::Passkey,
            identification_id: None,
            safe_identifier: None,
        });
    }

    if clerk_js_version_at_least_reset_minimum && user.password_digest.is_some() {
        let reset_target = supplied_identifier
            .and_then(|s| identifications.iter().find(|i| i.identifier.as_deref() == Some(s)))
            .or_else(|| identifications.iter().find(|i| Some(&i.id) == user.primary_email_identification_id.as_ref()))
            .or_else(|| identifications.iter().find(|i| Some(&i.id) == user.primary_phone_identification_id.as_ref()));

        if let Some(target) = reset_target {
            let strategy = match target.kind {
                IdentificationType::PhoneNumber => Strategy::ResetPasswordPhoneCode,
                _ => Strategy::ResetPasswordEmailCode,
            };
            options.push(FirstFactorOption {
                strategy,
                identification_id: Some(target.id.clone()),
                safe_identifier: target.identifier.as_deref().map(|i| mask(i, false)),
            });
        }
    }

    options
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::{IdentificationStatus, Tristate};
    use chrono::Utc;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: TypedId::new("user_1"),
            instance_id: TypedId::new("ins_1"),
            password_digest: Some("hashed".into()),
            password_enabled: true,
            two_factor_enabled: false,
            totp_enabled: false,
            backup_code_enabled: false,
            primary_email_identification_id: None,
            primary_phone_identification_id: None,
            primary_web3_wallet_identification_id: None,
            first_name: None,
            last_name: None,
            username: None,
            image_url: None,
            locked_until: None,
            failed_verification_attempts: 0,
            public_metadata: serde_json::Value::Null,
            private_metadata: serde_json::Value::Null,
            unsafe_metadata: serde_json::Value::Null,
            external_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn email_identification() -> Identification {
        let now = Utc::now();
        Identification {
            id: TypedId::new("idn_1"),
            instance_id: TypedId::new("ins_1"),
            user_id: Some(TypedId::new("user_1")),
            kind: IdentificationType::EmailAddress,
            identifier: Some("a@b.co".into()),
            status: IdentificationStatus::Verified,
            verification_id: None,
            target_identification_id: None,
            requires_verification: Tristate::Required,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_user_gets_password_factor() {
        let options = enumerate_first_factors(&user(), &[], None, false);
        assert!(options.iter().any(|o| o.strategy == Strategy::Password));
    }

    #[test]
    fn supplied_identifier_is_shown_unmasked() {
        let idn = email_identification();
        let options = enumerate_first_factors(&user(), std::slice::from_ref(&idn), Some("a@b.co"), false);
        let email_code = options.iter().find(|o| o.strategy == Strategy::EmailCode).unwrap();
        assert_eq!(email_code.safe_identifier.as_deref(), Some("a@b.co"));
    }

    #[test]
    fn other_identifications_are_masked() {
        let idn = email_identification();
        let options = enumerate_first_factors(&user(), std::slice::from_ref(&idn), None, false);
        let email_code = options.iter().find(|o| o.strategy == Strategy::EmailCode).unwrap();
        assert_ne!(email_code.safe_identifier.as_deref(), Some("a@b.co"));
    }
}
