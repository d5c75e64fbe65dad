//! Data handed to a verb: a query string for GET, a body for everything else.

use std::collections::BTreeMap;

use serde::Serialize;
use url::form_urlencoded;

use crate::engine::RequestBody;
use crate::errors::RequestError;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Name/value pairs, url-encoded as a query string or form body.
    Form(Vec<(String, String)>),
    /// Sent verbatim. For GET it must already be a query string.
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl Payload {
    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Payload::Form(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn json<T: Serialize>(value: &T) -> Result<Self, RequestError> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|e| RequestError::Configuration(format!("payload is not serializable: {e}")))
    }

    /// Renders the payload as a query string (without the leading `?`).
    pub(crate) fn to_query(&self) -> Result<String, RequestError> {
        match self {
            Payload::Form(pairs) => Ok(form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .finish()),
            Payload::Text(s) => Ok(s.trim_start_matches('?').to_string()),
            Payload::Bytes(b) => std::str::from_utf8(b)
                .map(|s| s.trim_start_matches('?').to_string())
                .map_err(|_| RequestError::Configuration("query payload is not valid UTF-8".into())),
            Payload::Json(_) => Err(RequestError::Configuration(
                "a JSON payload cannot be sent as a query string".into(),
            )),
        }
    }

    pub(crate) fn into_body(self) -> RequestBody {
        match self {
            Payload::Form(pairs) => RequestBody {
                data: form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish()
                    .into_bytes(),
                content_type: Some(FORM_CONTENT_TYPE.to_string()),
            },
            Payload::Text(s) => RequestBody { data: s.into_bytes(), content_type: None },
            Payload::Bytes(data) => RequestBody { data, content_type: None },
            Payload::Json(value) => RequestBody {
                data: value.to_string().into_bytes(),
                content_type: Some(JSON_CONTENT_TYPE.to_string()),
            },
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self { Payload::Text(s.to_string()) }
}
impl From<String> for Payload {
    fn from(s: String) -> Self { Payload::Text(s) }
}
impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self { Payload::Bytes(b) }
}
impl From<serde_json::Value> for Payload {
    fn from(v: serde_json::Value) -> Self { Payload::Json(v) }
}
impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for Payload {
    fn from(pairs: Vec<(K, V)>) -> Self { Payload::form(pairs) }
}
impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Payload {
    fn from(pairs: [(K, V); N]) -> Self { Payload::form(pairs) }
}
impl<K: Into<String>, V: Into<String>> From<BTreeMap<K, V>> for Payload {
    fn from(pairs: BTreeMap<K, V>) -> Self { Payload::form(pairs) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_query_is_url_encoded() {
        let p = Payload::from([("q", "a b&c"), ("lang", "en")]);
        assert_eq!(p.to_query().unwrap(), "q=a+b%26c&lang=en");
    }

    #[test]
    fn text_query_drops_leading_marker() {
        assert_eq!(Payload::from("?a=1").to_query().unwrap(), "a=1");
    }

    #[test]
    fn json_cannot_be_a_query() {
        let p = Payload::from(serde_json::json!({"a": 1}));
        assert!(matches!(p.to_query(), Err(RequestError::Configuration(_))));
    }

    #[test]
    fn form_body_has_content_type() {
        let body = Payload::form(vec![("k", "v")]).into_body();
        assert_eq!(body.data, b"k=v");
        assert_eq!(body.content_type.as_deref(), Some("application/x-www-form-urlencoded"));
    }

    #[test]
    fn json_body_is_serialized() {
        #[derive(Serialize)]
        struct Item {
            id: u32,
        }
        let body = Payload::json(&Item { id: 7 }).unwrap().into_body();
        assert_eq!(body.data, br#"{"id":7}"#);
        assert_eq!(body.content_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn raw_bodies_have_no_content_type() {
        let body = Payload::from(vec![1u8, 2, 3]).into_body();
        assert_eq!(body.data, vec![1, 2, 3]);
        assert!(body.content_type.is_none());
    }
}
