use url::Url;

use crate::error::CoreError;

use super::resolver::etld_plus_one;

/// Validates a redirect URL against the set of domains associated with an
/// instance (spec §4.3 "Redirect-URL validation"): parse the URL, require a
/// host, compute its eTLD+1, and check for an association; if none, walk up
/// subdomain levels (at most three) looking for a match.
pub fn validate_redirect_url(redirect_url: &str, associated_domains: &[String], production: bool) -> Result<Url, CoreError> {
    if !production {
        // Development is permissive: only require the URL to parse.
        return Url::parse(redirect_url)
            .map_err(|_| CoreError::FormInvalidParameterValue("redirect_url".into()));
    }

    let url = Url::parse(redirect_url).map_err(|_| CoreError::FormInvalidParameterValue("redirect_url".into()))?;
    let host = url
        .host_str()
        .ok_or_else(|| CoreError::FormInvalidParameterValue("redirect_url".into()))?
        .to_owned();

    let base = etld_plus_one(&host);
    if associated_domains.iter().any(|d| d == &base || d == &host) {
        return Ok(url);
    }

    // Walk up at most three subdomain levels looking for a match.
    let labels: Vec<&str> = host.split('.').collect();
    for depth in 1..=3 {
        if labels.len() <= depth {
            break;
        }
        let candidate = labels[labels.len() - depth - 1..].join(".");
        if associated_domains.iter().any(|d| d == &candidate) {
            return Ok(url);
        }
    }

    Err(CoreError::FormInvalidParameterValue("redirect_url".into()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exact_domain_match_passes() {
        let domains = vec!["app.example.com".to_string()];
        assert!(validate_redirect_url("https://app.example.com/callback", &domains, true).is_ok());
    }

    #[test]
    fn nested_subdomain_within_three_levels_passes() {
        let domains = vec!["example.com".to_string()];
        assert!(validate_redirect_url("https://a.b.example.com/callback", &domains, true).is_ok());
    }

    #[test]
    fn unrelated_domain_fails() {
        let domains = vec!["example.com".to_string()];
        assert!(validate_redirect_url("https://evil.com/callback", &domains, true).is_err());
    }

    #[test]
    fn development_is_permissive() {
        let domains: Vec<String> = vec![];
        assert!(validate_redirect_url("http://localhost:3000", &domains, false).is_ok());
    }
}
