use crate::domain::{SignUp, SignUpAttribute};
use crate::error::CoreError;

fn looks_like_email(value: &str) -> bool {
    value.contains('@')
}

fn looks_like_phone(value: &str) -> bool {
    value.starts_with('+') || value.chars().all(|c| c.is_ascii_digit())
}

/// Validates and stamps one progressive attribute onto a `SignUp` (spec
/// §4.7 "Progressive attribute intake"). `email_address_or_phone_number`
/// disambiguates by pattern and is rejected if the caller also submitted
/// `email_address`/`phone_number` directly for the same attempt.
pub fn add_to_sign_up(mut sign_up: SignUp, attribute: SignUpAttribute, value: &str) -> Result<SignUp, CoreError> {
    match attribute {
        SignUpAttribute::EmailAddress => {
            if !looks_like_email(value) {
                return Err(CoreError::FormInvalidEmailAddress(value.to_owned()));
            }
            sign_up.email_address = Some(value.to_owned());
        }
        SignUpAttribute::PhoneNumber => {
            if !looks_like_phone(value) {
                return Err(CoreError::FormInvalidParameterValue("phone_number".into()));
            }
            sign_up.phone_number = Some(value.to_owned());
        }
        SignUpAttribute::EmailAddressOrPhoneNumber => {
            if sign_up.email_address.is_some() || sign_up.phone_number.is_some() {
                return Err(CoreError::FormInvalidParameterValue("email_address_or_phone_number".into()));
            }
            if looks_like_email(value) {
                sign_up.email_address = Some(value.to_owned());
            } else if looks_like_phone(value) {
                sign_up.phone_number = Some(value.to_owned());
            } else {
                return Err(CoreError::FormInvalidParameterValue("email_address_or_phone_number".into()));
            }
        }
        SignUpAttribute::Username => {
            if value.trim().is_empty() {
                return Err(CoreError::FormNilParameter("username".into()));
            }
            sign_up.username = Some(value.to_owned());
        }
        SignUpAttribute::Web3Wallet => sign_up.web3_wallet = Some(value.to_owned()),
        SignUpAttribute::Password => {
            if value.is_empty() {
                return Err(CoreError::FormNilParameter("password".into()));
            }
            sign_up.password_digest = Some(value.to_owned());
        }
        SignUpAttribute::FirstName => sign_up.first_name = Some(value.to_owned()),
        SignUpAttribute::LastName => sign_up.last_name = Some(value.to_owned()),
    }
    Ok(sign_up)
}

/// Which attributes still need a value before Finalize can run, given the
/// set the instance requires.
pub fn missing_required_attributes(sign_up: &SignUp, required: &[SignUpAttribute]) -> Vec<SignUpAttribute> {
    required
        .iter()
        .copied()
        .filter(|attribute| match attribute {
            SignUpAttribute::EmailAddress | SignUpAttribute::EmailAddressOrPhoneNumber => {
                sign_up.email_address.is_none() && sign_up.phone_number.is_none()
            }
            SignUpAttribute::PhoneNumber => sign_up.phone_number.is_none(),
            SignUpAttribute::Username => sign_up.username.is_none(),
            SignUpAttribute::Web3Wallet => sign_up.web3_wallet.is_none(),
            SignUpAttribute::Password => sign_up.password_digest.is_none(),
            SignUpAttribute::FirstName => sign_up.first_name.is_none(),
            SignUpAttribute::LastName => sign_up.last_name.is_none(),
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;
    use crate::domain::TypedId;

    fn sign_up() -> SignUp {
        SignUp::new(TypedId::new("sup_1"), TypedId::new("ins_1"), TypedId::new("client_1"), Duration::minutes(10))
    }

    #[test]
    fn email_address_or_phone_number_rejects_double_submission() {
        let mut su = sign_up();
        su.email_address = Some("a@b.co".into());
        assert!(add_to_sign_up(su, SignUpAttribute::EmailAddressOrPhoneNumber, "+15551234567").is_err());
    }

    #[test]
    fn email_address_or_phone_number_disambiguates_by_pattern() {
        let su = add_to_sign_up(sign_up(), SignUpAttribute::EmailAddressOrPhoneNumber, "a@b.co").unwrap();
        assert_eq!(su.email_address.as_deref(), Some("a@b.co"));
    }

    #[test]
    fn invalid_email_is_rejected() {
        assert!(add_to_sign_up(sign_up(), SignUpAttribute::EmailAddress, "not-an-email").is_err());
    }

    #[test]
    fn missing_required_attributes_reports_unset_fields() {
        let su = sign_up();
        let missing = missing_required_attributes(&su, &[SignUpAttribute::EmailAddress, SignUpAttribute::Password]);
        assert_eq!(missing, vec![SignUpAttribute::EmailAddress, SignUpAttribute::Password]);
    }
}
