use crate::model::Request;

/// True when no key is configured or the request carries `Bearer <key>`.
pub fn is_authorized(req: &Request, api_key: Option<&str>) -> bool {
    let Some(api_key) = api_key else {
        return true;
    };
    req.header("authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == api_key)
}
