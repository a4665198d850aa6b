use serde_json::Value;

/// Per-entity data a template execution can draw `{{ }}` shortcodes from
/// (spec §4.4 "Available exact shortcodes"). `metadata` holds the
/// precomputed metadata blob (e.g. `{"public_metadata": {...}}`) that
/// metadata-path shortcodes (`user.public_metadata.foo.bar`) traverse.
#[derive(Clone, Debug, Default)]
pub struct UserClaimsData {
    pub id: String,
    pub external_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub primary_email_address: Option<String>,
    pub primary_phone_number: Option<String>,
    pub primary_web3_wallet: Option<String>,
    pub image_url: Option<String>,
    pub has_image: bool,
    pub email_verified: bool,
    pub phone_number_verified: bool,
    pub username: Option<String>,
    pub two_factor_enabled: bool,
    pub organizations: Value,
    pub metadata: Value,
}

impl UserClaimsData {
    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (None, None) => None,
            (first, last) => {
                let joined = [first.as_deref(), last.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                if joined.is_empty() {
                    None
                } else {
                    Some(joined)
                }
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrgClaimsData {
    pub id: String,
    pub role: Option<String>,
    pub name: String,
    pub slug: Option<String>,
    pub image_url: Option<String>,
    pub has_image: bool,
    pub metadata: Value,
}

#[derive(Clone, Debug, Default)]
pub struct OrgMembershipClaimsData {
    pub permissions: Value,
    pub metadata: Value,
}

#[derive(Clone, Debug, Default)]
pub struct SessionClaimsData {
    pub actor: Value,
    pub metadata: Value,
}

#[derive(Clone, Debug, Default)]
pub struct TemplateContext {
    pub user: Option<UserClaimsData>,
    pub org: Option<OrgClaimsData>,
    pub org_membership: Option<OrgMembershipClaimsData>,
    pub session: Option<SessionClaimsData>,
}

fn opt_string(v: &Option<String>) -> Value {
    match v {
        Some(s) => Value::String(s.clone()),
        None => Value::Null,
    }
}

/// Resolves a dotted shortcode path (e.g. `user.id`,
/// `user.public_metadata.foo.bar`) against the context. Unknown namespaces,
/// unknown exact fields, and missing metadata keys all resolve to
/// `Value::Null` rather than erroring, so that coalescing (`||`) can fall
/// through to a default.
pub fn resolve_path(ctx: &TemplateContext, path: &str) -> Value {
    let mut parts = path.splitn(2, '.');
    let namespace = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();

    match namespace {
        "user" => ctx.user.as_ref().map(|u| resolve_user(u, rest)).unwrap_or(Value::Null),
        "org" => ctx.org.as_ref().map(|o| resolve_org(o, rest)).unwrap_or(Value::Null),
        "org_membership" => ctx
            .org_membership
            .as_ref()
            .map(|m| resolve_org_membership(m, rest))
            .unwrap_or(Value::Null),
        "session" => ctx.session.as_ref().map(|s| resolve_session(s, rest)).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn resolve_metadata_path(metadata: &Value, rest: &str) -> Option<Value> {
    if !rest.starts_with("public_metadata") && !rest.starts_with("private_metadata") && !rest.starts_with("unsafe_metadata") {
        return None;
    }
    let mut cursor = metadata;
    for segment in rest.split('.') {
        cursor = cursor.get(segment)?;
    }
    Some(cursor.clone())
}

fn resolve_user(user: &UserClaimsData, field: &str) -> Value {
    match field {
        "id" => Value::String(user.id.clone()),
        "external_id" => opt_string(&user.external_id),
        "first_name" => opt_string(&user.first_name),
        "last_name" => opt_string(&user.last_name),
        "full_name" => opt_string(&user.full_name()),
        "created_at" => Value::from(user.created_at),
        "updated_at" => Value::from(user.updated_at),
        "primary_email_address" => opt_string(&user.primary_email_address),
        "primary_phone_number" => opt_string(&user.primary_phone_number),
        "primary_web3_wallet" => opt_string(&user.primary_web3_wallet),
        "image_url" => opt_string(&user.image_url),
        "has_image" => Value::Bool(user.has_image),
        "email_verified" => Value::Bool(user.email_verified),
        "phone_number_verified" => Value::Bool(user.phone_number_verified),
        "username" => opt_string(&user.username),
        "two_factor_enabled" => Value::Bool(user.two_factor_enabled),
        "organizations" => user.organizations.clone(),
        other => resolve_metadata_path(&user.metadata, other).unwrap_or(Value::Null),
    }
}

fn resolve_org(org: &OrgClaimsData, field: &str) -> Value {
    match field {
        "id" => Value::String(org.id.clone()),
        "role" => opt_string(&org.role),
        "name" => Value::String(org.name.clone()),
        "slug" => opt_string(&org.slug),
        "image_url" => opt_string(&org.image_url),
        "has_image" => Value::Bool(org.has_image),
        other => resolve_metadata_path(&org.metadata, other).unwrap_or(Value::Null),
    }
}

fn resolve_org_membership(membership: &OrgMembershipClaimsData, field: &str) -> Value {
    match field {
        "permissions" => membership.permissions.clone(),
        other => resolve_metadata_path(&membership.metadata, other).unwrap_or(Value::Null),
    }
}

fn resolve_session(session: &SessionClaimsData, field: &str) -> Value {
    match field {
        "actor" => session.actor.clone(),
        other => {
            if let Some(rest) = other.strip_prefix("actor.") {
                let mut cursor = &session.actor;
                for segment in rest.split('.') {
                    match cursor.get(segment) {
                        Some(v) => cursor = v,
                        None => return Value::Null,
                    }
                }
                cursor.clone()
            } else {
                resolve_metadata_path(&session.metadata, other).unwrap_or(Value::Null)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_name_falls_back_to_null_when_unset() {
        let user = UserClaimsData {
            id: "user_1".into(),
            username: Some("alice".into()),
            ..Default::default()
        };
        assert_eq!(resolve_user(&user, "full_name"), Value::Null);
        assert_eq!(resolve_user(&user, "username"), json!("alice"));
    }

    #[test]
    fn public_metadata_path_traverses_nested_object() {
        let user = UserClaimsData {
            id: "user_1".into(),
            metadata: json!({"public_metadata": {"foo": {"bar": "baz"}}}),
            ..Default::default()
        };
        assert_eq!(resolve_user(&user, "public_metadata.foo.bar"), json!("baz"));
    }
}
