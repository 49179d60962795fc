use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use crate::cache::token::Token;
use crate::config::sources::{Expiration, ResponseConfig};

/// Extract the bearer value and its expiry from a JSON response body.
///
/// `now` anchors relative `expires_in` values.
pub fn parse_token(body: &str, response: &ResponseConfig, now: DateTime<Utc>) -> Result<Token> {
    let json: Value = serde_json::from_str(body).map_err(|e| anyhow!("body is not valid JSON: {}", e))?;

    let value = json[&response.token_field]
        .as_str()
        .ok_or_else(|| anyhow!("body field '{}' not found or not a string", response.token_field))?
        .to_owned();

    let valid_until = match &response.expiration {
        Expiration::ExpiresIn { field } => {
            let seconds = get_i64(&json, field)?;
            TimeDelta::try_seconds(seconds)
                .and_then(|ttl| now.checked_add_signed(ttl))
                .ok_or_else(|| anyhow!("'{}' out of range: {}", field, seconds))?
        }
        Expiration::ExpiresAt { field } => {
            let ts = get_i64(&json, field)?;
            DateTime::from_timestamp(ts, 0).ok_or_else(|| anyhow!("'{}' out of range: {}", field, ts))?
        }
    };

    Ok(Token::new(value, valid_until))
}

/// Numbers and numeric strings are both accepted
fn get_i64(json: &Value, field: &str) -> Result<i64> {
    match &json[field] {
        Value::Number(n) => n.as_i64().ok_or_else(|| anyhow!("'{}' is not an integer", field)),
        Value::String(s) => s.trim().parse::<i64>().map_err(|e| anyhow!("'{}' is not an integer: {}", field, e)),
        Value::Null => Err(anyhow!("body field '{}' not found", field)),
        other => Err(anyhow!("'{}' has unsupported type: {}", field, other)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_relative_expiry() {
        let now = Utc::now();
        let token = parse_token(r#"{"access_token":"abc","expires_in":3600}"#, &ResponseConfig::default(), now).unwrap();

        assert_eq!(token.value, "abc");
        assert_eq!(token.valid_until, now + TimeDelta::seconds(3600));
    }

    #[test]
    fn parses_absolute_expiry_from_string() {
        let cfg = ResponseConfig {
            token_field: "token".into(),
            expiration: Expiration::ExpiresAt { field: "exp".into() },
        };
        let token = parse_token(r#"{"token":"t","exp":"1700000000"}"#, &cfg, Utc::now()).unwrap();

        assert_eq!(token.valid_until.timestamp(), 1_700_000_000);
    }

    #[test]
    fn rejects_missing_fields() {
        let cfg = ResponseConfig::default();
        let err = parse_token(r#"{"expires_in":10}"#, &cfg, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("access_token"));

        let err = parse_token(r#"{"access_token":"x"}"#, &cfg, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("expires_in"));

        assert!(parse_token("not json", &cfg, Utc::now()).is_err());
    }
}
