//! Response normalization for the Aptly HTTP API.
//!
//! Every Aptly endpoint this workspace calls answers with a JSON object,
//! except `POST /api/files/{dir}`, which answers with a bare array of the
//! uploaded file names. [`normalize`] folds both shapes into one
//! [`ApiResult`] so that every operation returns the same type.
//!
//! # Example
//!
//! ```
//! use aptly_response::normalize;
//! use aptly_types::NullReporter;
//!
//! let result = normalize(r#"["pkg1.deb","pkg2.deb"]"#, &mut NullReporter);
//! assert_eq!(result.uploaded_files(), vec!["pkg1.deb", "pkg2.deb"]);
//! ```

use aptly_types::Reporter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which an array response is stored.
pub const UPLOADED_FILES_KEY: &str = "UploadedFiles";

/// The two response shapes Aptly produces.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Object(Map<String, Value>),
    /// Only the upload endpoint answers with an array.
    Array(Vec<Value>),
}

/// Canonical parsed response of one API call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ApiResult {
    fields: Map<String, Value>,
}

impl ApiResult {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String value of `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// File names from an upload response; empty for any other response.
    pub fn uploaded_files(&self) -> Vec<&str> {
        self.fields
            .get(UPLOADED_FILES_KEY)
            .and_then(Value::as_array)
            .map(|files| files.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<ResponseBody> for ApiResult {
    fn from(body: ResponseBody) -> Self {
        match body {
            ResponseBody::Object(fields) => Self::new(fields),
            ResponseBody::Array(items) => {
                let mut fields = Map::new();
                fields.insert(UPLOADED_FILES_KEY.to_string(), Value::Array(items));
                Self::new(fields)
            }
        }
    }
}

/// Decode a raw body into one of the two known shapes.
pub fn decode(raw: &str) -> Result<ResponseBody, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Normalize a raw body into an [`ApiResult`].
///
/// A body that is neither a JSON object nor a JSON array yields an empty
/// result and a warning on `reporter`; it is never an error, because the
/// HTTP status already decided success.
pub fn normalize(raw: &str, reporter: &mut dyn Reporter) -> ApiResult {
    match decode(raw) {
        Ok(body) => body.into(),
        Err(err) => {
            reporter.warn(&format!("Response JSON parsing error <{err}>, ignoring"));
            ApiResult::empty()
        }
    }
}

/// Indent a JSON body for display, or return it untouched if it is not JSON.
pub fn pretty_json(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| raw.to_string())
}
