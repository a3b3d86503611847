//! Stored request definitions

use serde::{Deserialize, Serialize};

use super::types::{HeaderMap, PathVariables};
use crate::http::HttpMethod;

/// How the raw `body` string of a request is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    #[default]
    None,
    Json,
    Form,
    Raw,
}

/// A request as stored in a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub method: HttpMethod,
    /// May embed `:pathVar` segments and `{{envVar}}` tokens
    pub url: String,
    #[serde(default)]
    pub headers: HeaderMap,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub body_type: BodyType,
    #[serde(default)]
    pub pre_script: String,
    #[serde(default)]
    pub post_script: String,
    #[serde(default)]
    pub tests: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_variables: Option<PathVariables>,
    #[serde(default)]
    pub collection_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: &str) -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            method,
            url: url.to_string(),
            headers: HeaderMap::new(),
            body: String::new(),
            body_type: BodyType::None,
            pre_script: String::new(),
            post_script: String::new(),
            tests: String::new(),
            path_variables: None,
            collection_id: String::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_id(mut self, id: &str, name: &str) -> Self {
        self.id = id.to_string();
        self.name = name.to_string();
        self
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body_type: BodyType, body: &str) -> Self {
        self.body_type = body_type;
        self.body = body.to_string();
        self
    }

    pub fn with_path_variable(mut self, key: &str, value: &str) -> Self {
        self.path_variables
            .get_or_insert_with(PathVariables::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_pre_script(mut self, script: &str) -> Self {
        self.pre_script = script.to_string();
        self
    }

    pub fn with_post_script(mut self, script: &str) -> Self {
        self.post_script = script.to_string();
        self
    }

    pub fn with_tests(mut self, script: &str) -> Self {
        self.tests = script.to_string();
        self
    }
}

/// Kind of a multipart form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    File,
}

/// One entry of a `form` body, stored JSON-encoded in the request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl FormField {
    pub fn text(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            field_type: FieldType::Text,
            enabled: true,
            file_name: None,
            file_type: None,
        }
    }

    pub fn file(key: &str, file_name: &str, file_type: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            value: String::new(),
            field_type: FieldType::File,
            enabled: true,
            file_name: Some(file_name.to_string()),
            file_type: file_type.map(String::from),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Payload for creating a request inside a collection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub name: String,
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub body: String,
    pub body_type: BodyType,
    pub pre_script: String,
    pub post_script: String,
    pub tests: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_variables: Option<PathVariables>,
}

impl From<&HttpRequest> for NewRequest {
    fn from(request: &HttpRequest) -> Self {
        Self {
            name: request.name.clone(),
            method: request.method,
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            body_type: request.body_type,
            pre_script: request.pre_script.clone(),
            post_script: request.post_script.clone(),
            tests: request.tests.clone(),
            path_variables: request.path_variables.clone(),
        }
    }
}

/// Partial update of a stored request; unset fields are left untouched
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HeaderMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_type: Option<BodyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_variables: Option<PathVariables>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_api_shape() {
        let json = r#"{
            "_id": "r1",
            "name": "Get user",
            "method": "GET",
            "url": "{{base}}/users/:id",
            "headers": {"Accept": "application/json"},
            "body": "",
            "bodyType": "none",
            "preScript": "",
            "postScript": "",
            "tests": "",
            "pathVariables": {"id": "42"},
            "collectionId": "c1",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }"#;

        let request: HttpRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.id, "r1");
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.body_type, BodyType::None);
        assert_eq!(request.path_variables.unwrap()["id"], "42");
        assert_eq!(request.collection_id, "c1");
    }

    #[test]
    fn test_missing_optional_fields() {
        let request: HttpRequest =
            serde_json::from_str(r#"{"method": "POST", "url": "http://x"}"#).unwrap();
        assert!(request.headers.is_empty());
        assert_eq!(request.body_type, BodyType::None);
        assert!(request.path_variables.is_none());
    }

    #[test]
    fn test_form_field_type_key() {
        let fields: Vec<FormField> = serde_json::from_str(
            r#"[{"key":"a","value":"1","type":"text","enabled":true},
                {"key":"f","value":"","type":"file","enabled":true,"fileName":"x.png","fileType":"image/png"}]"#,
        )
        .unwrap();
        assert_eq!(fields[0], FormField::text("a", "1"));
        assert_eq!(fields[1].field_type, FieldType::File);
        assert_eq!(fields[1].file_name.as_deref(), Some("x.png"));
    }

    #[test]
    fn test_request_update_skips_unset() {
        let update = RequestUpdate {
            url: Some("http://new".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"url": "http://new"}));
    }
}
