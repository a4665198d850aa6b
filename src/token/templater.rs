use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::RngCore;
use serde_json::{Map, Value};

use crate::domain::JwtTemplate;
use crate::error::CoreError;

use super::shortcodes::{resolve_path, TemplateContext};

/// The shortcode execution engine (spec §4.4). Walks a claims template JSON
/// tree substituting `{{ }}` shortcodes, then layers Clerk's default claims
/// on top.
pub struct TokenTemplater;


impl TokenTemplater {
    /// Executes `template.claims` against `ctx`, rejecting a user-supplied
    /// `aud` of the literal string `"clerk"` (spec §4.4 "Reserved claims"),
    /// then overlays the default claim set. Default claims override any
    /// user-provided entry with the same name; `exp`/`nbf` are only emitted
    /// (and only then override) when the template's lifetime/clock-skew are
    /// positive, and `azp` only when `origin` is non-empty and not the
    /// literal string `"null"`.
    pub fn execute(
        template: &JwtTemplate,
        ctx: &TemplateContext,
        issuer: &str,
        origin: Option<&str>,
    ) -> Result<Map<String, Value>, CoreError> {
        if let Some(Value::String(aud)) = template.claims.get("aud") {
            if aud.trim().eq_ignore_ascii_case("clerk") {
                return Err(CoreError::ErrReservedAud);
            }
        }

        let substituted = Self::substitute_value(ctx, &template.claims);
        let mut claims = match substituted {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let now = Utc::now().timestamp();
        claims.insert("sub".into(), Value::String(ctx.user.as_ref().map(|u| u.id.clone()).unwrap_or_default()));
        claims.insert("iat".into(), Value::from(now));
        claims.insert("iss".into(), Value::String(issuer.to_owned()));
        if template.lifetime_seconds > 0 {
            claims.insert("exp".into(), Value::from(now + template.lifetime_seconds));
        }
        if template.clock_skew_seconds > 0 {
            claims.insert("nbf".into(), Value::from(now - template.clock_skew_seconds));
        }
        claims.insert("jti".into(), Value::String(new_jti()));
        if let Some(azp) = origin {
            if !azp.is_empty() && azp != "null" {
                claims.insert("azp".into(), Value::String(azp.to_owned()));
            }
        }

        Ok(claims)
    }

    /// Signs executed claims as a compact JWT, using the template's own
    /// signing key when configured (custom signing algorithm), falling back
    /// to the instance key with a `kid` header otherwise.
    pub fn sign(
        claims: &Map<String, Value>,
        key: &EncodingKey,
        algorithm: jsonwebtoken::Algorithm,
        kid: Option<&str>,
    ) -> Result<String, CoreError> {
        let mut header = Header::new(algorithm);
        header.kid = kid.map(str::to_owned);
        encode(&header, claims, key).map_err(|e| CoreError::Unexpected(e.to_string()))
    }

    fn substitute_value(ctx: &TemplateContext, value: &Value) -> Value {
        match value {
            Value::String(s) => substitute_string(ctx, s),
            Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), Self::substitute_value(ctx, v))).collect()),
            Value::Array(items) => Value::Array(items.iter().map(|v| Self::substitute_value(ctx, v)).collect()),
            other => other.clone(),
        }
    }
}

fn new_jti() -> String {
    let mut bytes = [0u8; 10];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Finds non-overlapping `{{ ... }}` spans in `s`, returning
/// `(start_byte, end_byte, inner_text)` for each.
fn find_shortcodes(s: &str) -> Vec<(usize, usize, String)> {
    let mut spans = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            if let Some(rel_end) = s[i + 2..].find("}}") {
                let end = i + 2 + rel_end + 2;
                let inner = s[i + 2..i + 2 + rel_end].trim().to_owned();
                spans.push((i, end, inner));
                i = end;
                continue;
            }
        }
        i += 1;
    }
    spans
}

fn substitute_string(ctx: &TemplateContext, s: &str) -> Value {
    let shortcodes = find_shortcodes(s);
    if shortcodes.is_empty() {
        return Value::String(s.to_owned());
    }

    if shortcodes.len() == 1 && shortcodes[0].0 == 0 && shortcodes[0].1 == s.len() {
        return evaluate_shortcode(ctx, &shortcodes[0].2);
    }

    let mut result = String::new();
    let mut last = 0;
    for (start, end, inner) in shortcodes {
        result.push_str(&s[last..start]);
        let value = evaluate_shortcode(ctx, &inner);
        result.push_str(&stringify_for_interpolation(&value));
        last = end;
    }
    result.push_str(&s[last..]);
    Value::String(result)
}

fn stringify_for_interpolation(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Splits a `||`-joined coalescing expression outside of single-quoted
/// literals.
fn split_operands(inner: &str) -> Vec<&str> {
    let mut operands = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    let bytes = inner.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'|' if !in_quote && i + 1 < bytes.len() && bytes[i + 1] == b'|' => {
                operands.push(inner[start..i].trim());
                i += 1;
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    operands.push(inner[start..].trim());
    operands
}

fn parse_operand(ctx: &TemplateContext, operand: &str) -> Value {
    if operand.len() >= 2 && operand.starts_with('\'') && operand.ends_with('\'') {
        return Value::String(operand[1..operand.len() - 1].to_owned());
    }
    match operand {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(i) = operand.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = operand.parse::<f64>() {
        return Value::from(f);
    }
    resolve_path(ctx, operand)
}

fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

fn evaluate_shortcode(ctx: &TemplateContext, inner: &str) -> Value {
    let operands = split_operands(inner);
    let mut last = Value::Null;
    for operand in operands {
        let value = parse_operand(ctx, operand);
        if is_truthy(&value) {
            return value;
        }
        last = value;
    }
    last
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::token::shortcodes::UserClaimsData;
    use serde_json::json;

    fn template(claims: Map<String, Value>) -> JwtTemplate {
        JwtTemplate {
            id: crate::domain::TypedId::new("tmpl_1"),
            instance_id: crate::domain::TypedId::new("ins_1"),
            name: "test".into(),
            claims: Value::Object(claims),
            lifetime_seconds: 60,
            clock_skew_seconds: 5,
            signing_key: None,
            signing_algorithm: None,
        }
    }

    fn ctx_with_alice() -> TemplateContext {
        TemplateContext {
            user: Some(UserClaimsData {
                id: "user_1".into(),
                username: Some("alice".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn pure_shortcode_preserves_type() {
        let mut claims = Map::new();
        claims.insert("email_verified".into(), json!("{{user.email_verified}}"));
        let tmpl = template(claims);
        let ctx = ctx_with_alice();
        let result = TokenTemplater::execute(&tmpl, &ctx, "https://issuer.example", None).unwrap();
        assert_eq!(result.get("email_verified"), Some(&Value::Bool(false)));
    }

    #[test]
    fn coalescing_falls_through_to_literal_default() {
        let mut claims = Map::new();
        claims.insert("name".into(), json!("{{user.full_name||user.username||'friend'}}"));
        let tmpl = template(claims);
        let ctx = ctx_with_alice();
        let result = TokenTemplater::execute(&tmpl, &ctx, "https://issuer.example", None).unwrap();
        assert_eq!(result.get("name"), Some(&json!("alice")));
    }

    #[test]
    fn coalescing_falls_through_to_number_literal() {
        let mut claims = Map::new();
        claims.insert("count".into(), json!("{{nonexistent||42}}"));
        let tmpl = template(claims);
        let ctx = TemplateContext::default();
        let result = TokenTemplater::execute(&tmpl, &ctx, "https://issuer.example", None).unwrap();
        assert_eq!(result.get("count"), Some(&json!(42)));
    }

    #[test]
    fn interpolated_string_dequotes_embedded_values() {
        let mut claims = Map::new();
        claims.insert("greeting".into(), json!("hello {{user.username}}!"));
        let tmpl = template(claims);
        let ctx = ctx_with_alice();
        let result = TokenTemplater::execute(&tmpl, &ctx, "https://issuer.example", None).unwrap();
        assert_eq!(result.get("greeting"), Some(&json!("hello alice!")));
    }

    #[test]
    fn reserved_aud_clerk_is_rejected() {
        let mut claims = Map::new();
        claims.insert("aud".into(), json!("clerk"));
        let tmpl = template(claims);
        let ctx = TemplateContext::default();
        let result = TokenTemplater::execute(&tmpl, &ctx, "https://issuer.example", None);
        assert!(matches!(result, Err(CoreError::ErrReservedAud)));
    }

    #[test]
    fn default_claims_are_always_present() {
        let tmpl = template(Map::new());
        let ctx = ctx_with_alice();
        let result = TokenTemplater::execute(&tmpl, &ctx, "https://issuer.example", Some("https://app.example")).unwrap();
        for key in ["sub", "iat", "iss", "exp", "nbf", "jti", "azp"] {
            assert!(result.contains_key(key), "missing default claim {key}");
        }
    }
}
