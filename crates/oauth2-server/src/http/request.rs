//! Inbound protocol parameters.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Client credentials decoded from an `Authorization: Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials").field("client_id", &self.client_id).finish_non_exhaustive()
    }
}

/// A normalized inbound request: method, query and body parameters, and headers.
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: String,
    query: HashMap<String, String>,
    body: HashMap<String, String>,
    /// Header names are stored lower-cased.
    headers: HashMap<String, String>,
    repeated: Option<String>,
}

impl Request {
    #[must_use]
    pub fn new(method: &str) -> Self {
        Self { method: method.to_ascii_uppercase(), ..Self::default() }
    }

    #[must_use]
    pub fn get() -> Self {
        Self::new("GET")
    }

    #[must_use]
    pub fn post() -> Self {
        Self::new("POST")
    }

    /// Build a request from raw transport parts. The body is parsed as JSON when
    /// the content type says so, as `application/x-www-form-urlencoded` otherwise.
    #[must_use]
    pub fn from_parts<K, V>(
        method: &str,
        query: Option<&str>,
        headers: impl IntoIterator<Item = (K, V)>,
        body: &[u8],
    ) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = Self::new(method);
        for (name, value) in headers {
            request.headers.insert(name.as_ref().to_ascii_lowercase(), value.as_ref().to_owned());
        }

        if let Some(query) = query {
            for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
                request.insert_query(name.into_owned(), value.into_owned());
            }
        }

        let is_json = request
            .header("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("application/json"));
        if is_json {
            if let Ok(serde_json::Value::Object(map)) = serde_json::from_slice(body) {
                for (name, value) in map {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => continue,
                        other => other.to_string(),
                    };
                    request.insert_body(name, value);
                }
            }
        } else {
            for (name, value) in url::form_urlencoded::parse(body) {
                request.insert_body(name.into_owned(), value.into_owned());
            }
        }

        request
    }

    #[must_use]
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.insert_query(name.to_owned(), value.to_owned());
        self
    }

    #[must_use]
    pub fn with_body(mut self, name: &str, value: &str) -> Self {
        self.insert_body(name.to_owned(), value.to_owned());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_owned());
        self
    }

    /// Attach an `Authorization: Basic` header for the given credentials.
    #[must_use]
    pub fn with_basic_auth(self, client_id: &str, client_secret: &str) -> Self {
        let encoded = STANDARD.encode(format!("{client_id}:{client_secret}"));
        self.with_header("Authorization", &format!("Basic {encoded}"))
    }

    fn insert_query(&mut self, name: String, value: String) {
        if self.query.contains_key(&name) {
            self.repeated.get_or_insert_with(|| name.clone());
        }
        self.query.insert(name, value);
    }

    fn insert_body(&mut self, name: String, value: String) {
        if self.body.contains_key(&name) {
            self.repeated.get_or_insert_with(|| name.clone());
        }
        self.body.insert(name, value);
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn is_post(&self) -> bool {
        self.method == "POST"
    }

    /// A query parameter. Empty values read as absent.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// A body parameter. Empty values read as absent.
    #[must_use]
    pub fn body(&self, name: &str) -> Option<&str> {
        self.body.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// A query parameter, falling back to the body.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query(name).or_else(|| self.body(name))
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// The first parameter that appeared more than once, if any.
    #[must_use]
    pub fn repeated_parameter(&self) -> Option<&str> {
        self.repeated.as_deref()
    }

    /// The credentials of the `Authorization` header for `scheme` (case-insensitive).
    #[must_use]
    pub fn authorization(&self, scheme: &str) -> Option<&str> {
        let value = self.header("authorization")?.trim();
        let (found, rest) = value.split_once(' ')?;
        found.eq_ignore_ascii_case(scheme).then(|| rest.trim()).filter(|v| !v.is_empty())
    }

    /// Decode `Authorization: Basic` client credentials.
    #[must_use]
    pub fn basic_credentials(&self) -> Option<BasicCredentials> {
        let decoded = STANDARD.decode(self.authorization("Basic")?).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (client_id, client_secret) = decoded.split_once(':')?;
        if client_id.is_empty() {
            return None;
        }
        Some(BasicCredentials {
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_form_body() {
        let request = Request::from_parts(
            "post",
            Some("state=xyz"),
            [("Content-Type", "application/x-www-form-urlencoded")],
            b"grant_type=authorization_code&code=abc123&redirect_uri=https%3A%2F%2Fapp%2Fcb",
        );
        assert!(request.is_post());
        assert_eq!(request.body("grant_type"), Some("authorization_code"));
        assert_eq!(request.body("redirect_uri"), Some("https://app/cb"));
        assert_eq!(request.query("state"), Some("xyz"));
        assert_eq!(request.header("CONTENT-TYPE"), Some("application/x-www-form-urlencoded"));
        assert!(request.repeated_parameter().is_none());
    }

    #[test]
    fn test_from_parts_json_body() {
        let request = Request::from_parts(
            "POST",
            None,
            [("content-type", "application/json; charset=utf-8")],
            br#"{"grant_type":"refresh_token","refresh_token":"rt1","scope":null,"n":3}"#,
        );
        assert_eq!(request.body("refresh_token"), Some("rt1"));
        assert_eq!(request.body("scope"), None);
        assert_eq!(request.body("n"), Some("3"));
    }

    #[test]
    fn test_repeated_parameter_is_recorded() {
        let request = Request::from_parts(
            "POST",
            None,
            Vec::<(&str, &str)>::new(),
            b"code=a&code=b",
        );
        assert_eq!(request.repeated_parameter(), Some("code"));
    }

    #[test]
    fn test_empty_values_read_as_absent() {
        let request = Request::post().with_body("client_secret", "");
        assert_eq!(request.body("client_secret"), None);
    }

    #[test]
    fn test_basic_credentials() {
        let request = Request::post().with_basic_auth("c1", "s1:with:colons");
        let creds = request.basic_credentials().unwrap();
        assert_eq!(creds.client_id, "c1");
        assert_eq!(creds.client_secret, "s1:with:colons");

        let request = Request::post().with_header("Authorization", "Basic !!!");
        assert!(request.basic_credentials().is_none());
        let request = Request::post().with_header("Authorization", "Bearer abc");
        assert!(request.basic_credentials().is_none());
    }

    #[test]
    fn test_authorization_scheme_is_case_insensitive() {
        let request = Request::get().with_header("authorization", "bearer  tok123 ");
        assert_eq!(request.authorization("Bearer"), Some("tok123"));
        assert_eq!(request.authorization("MAC"), None);
    }
}
