//! Firestore REST v1 document store.

use async_trait::async_trait;
use comunimapp_common::{AppError, AppResult};
use reqwest::StatusCode;
use serde_json::{Map, Value, json};

use crate::google_auth::{CLOUD_PLATFORM_SCOPE, GoogleAuth};
use crate::store::{DocumentStore, Filter, MAX_BATCH_SIZE, QueryOptions, SortDirection, WriteOp};

const FIRESTORE_V1_API: &str =
    "https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents";

/// Firestore-backed [`DocumentStore`].
///
/// Every call is a single synchronous REST round trip with no retry layer;
/// failures surface as `AppError::Store`.
#[derive(Clone)]
pub struct FirestoreStore {
    client: reqwest::Client,
    auth: GoogleAuth,
    base_url: String,
}

impl FirestoreStore {
    /// Create a store for the given project.
    #[must_use]
    pub fn new(auth: GoogleAuth, project_id: &str) -> Self {
        let base_url = FIRESTORE_V1_API.replace("{project_id}", project_id);
        Self {
            client: reqwest::Client::new(),
            auth,
            base_url,
        }
    }

    /// Create a store with a custom base URL (useful for testing against an
    /// emulator).
    #[must_use]
    pub fn new_with_url(auth: GoogleAuth, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
            base_url,
        }
    }

    fn doc_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, id)
    }

    fn doc_name(&self, collection: &str, id: &str) -> String {
        // Document resource names are path-relative to the REST base URL.
        let path = self
            .base_url
            .splitn(2, "/v1/")
            .nth(1)
            .unwrap_or(&self.base_url);
        format!("{path}/{collection}/{id}")
    }

    async fn bearer(&self) -> AppResult<String> {
        self.auth.token(&[CLOUD_PLATFORM_SCOPE]).await
    }

    async fn read_error(resp: reqwest::Response) -> AppError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        AppError::Store(format!("firestore returned {status}: {body}"))
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Value>> {
        let token = self.bearer().await?;
        let resp = self
            .client
            .get(self.doc_url(collection, id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let doc: Value = resp
                    .json()
                    .await
                    .map_err(|e| AppError::Store(e.to_string()))?;
                Ok(Some(decode_document(&doc)))
            }
            _ => Err(Self::read_error(resp).await),
        }
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> AppResult<()> {
        let token = self.bearer().await?;
        // PATCH without an update mask replaces the whole document and
        // creates it when absent.
        let resp = self
            .client
            .patch(self.doc_url(collection, id))
            .bearer_auth(token)
            .json(&json!({ "fields": encode_fields(&doc) }))
            .send()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::read_error(resp).await)
        }
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> AppResult<()> {
        let token = self.bearer().await?;
        let mut url = format!(
            "{}?currentDocument.exists=true",
            self.doc_url(collection, id)
        );
        if let Some(obj) = patch.as_object() {
            for key in obj.keys() {
                url.push_str("&updateMask.fieldPaths=");
                url.push_str(key);
            }
        }

        let resp = self
            .client
            .patch(url)
            .bearer_auth(token)
            .json(&json!({ "fields": encode_fields(&patch) }))
            .send()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(AppError::NotFound(format!("{collection}/{id}"))),
            s if s.is_success() => Ok(()),
            _ => Err(Self::read_error(resp).await),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> AppResult<()> {
        let token = self.bearer().await?;
        let resp = self
            .client
            .delete(self.doc_url(collection, id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        // Firestore treats deleting an absent document as success.
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Self::read_error(resp).await)
        }
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        options: QueryOptions,
    ) -> AppResult<Vec<Value>> {
        let token = self.bearer().await?;

        let mut structured = json!({
            "from": [{ "collectionId": collection }],
        });

        if !filters.is_empty() {
            let field_filters: Vec<Value> = filters
                .iter()
                .map(|f| {
                    json!({
                        "fieldFilter": {
                            "field": { "fieldPath": f.field },
                            "op": "EQUAL",
                            "value": encode_value(&f.value),
                        }
                    })
                })
                .collect();
            structured["where"] = json!({
                "compositeFilter": { "op": "AND", "filters": field_filters }
            });
        }

        if let Some((field, direction)) = &options.order_by {
            let dir = match direction {
                SortDirection::Ascending => "ASCENDING",
                SortDirection::Descending => "DESCENDING",
            };
            structured["orderBy"] = json!([{
                "field": { "fieldPath": field },
                "direction": dir,
            }]);
        }
        if let Some(offset) = options.offset {
            structured["offset"] = json!(offset);
        }
        if let Some(limit) = options.limit {
            structured["limit"] = json!(limit);
        }

        let resp = self
            .client
            .post(format!("{}:runQuery", self.base_url))
            .bearer_auth(token)
            .json(&json!({ "structuredQuery": structured }))
            .send()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::read_error(resp).await);
        }

        let entries: Vec<Value> = resp
            .json()
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        // runQuery interleaves progress entries that carry only a readTime.
        Ok(entries
            .iter()
            .filter_map(|entry| entry.get("document"))
            .map(decode_document)
            .collect())
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> AppResult<u64> {
        let mut applied = 0u64;

        for chunk in ops.chunks(MAX_BATCH_SIZE) {
            let token = self.bearer().await?;
            let writes: Vec<Value> = chunk
                .iter()
                .map(|op| match op {
                    WriteOp::Update {
                        collection,
                        id,
                        patch,
                    } => {
                        let paths: Vec<&String> = patch
                            .as_object()
                            .map(|o| o.keys().collect())
                            .unwrap_or_default();
                        json!({
                            "update": {
                                "name": self.doc_name(collection, id),
                                "fields": encode_fields(patch),
                            },
                            "updateMask": { "fieldPaths": paths },
                            "currentDocument": { "exists": true },
                        })
                    }
                    WriteOp::Delete { collection, id } => {
                        json!({ "delete": self.doc_name(collection, id) })
                    }
                })
                .collect();

            let resp = self
                .client
                .post(format!("{}:commit", self.base_url))
                .bearer_auth(token)
                .json(&json!({ "writes": writes }))
                .send()
                .await
                .map_err(|e| AppError::Store(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(Self::read_error(resp).await);
            }
            applied += chunk.len() as u64;
        }

        Ok(applied)
    }
}

// === JSON <-> Firestore value codec ===

/// Encode a JSON value as a Firestore REST `Value`.
fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // Firestore transports integers as strings.
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(_) => json!({ "mapValue": { "fields": encode_fields(value) } }),
    }
}

/// Encode a JSON object as a Firestore `fields` map.
fn encode_fields(doc: &Value) -> Value {
    let mut fields = Map::new();
    if let Some(obj) = doc.as_object() {
        for (key, value) in obj {
            fields.insert(key.clone(), encode_value(value));
        }
    }
    Value::Object(fields)
}

/// Decode a Firestore REST `Value` back into plain JSON.
fn decode_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };

    if let Some(s) = obj.get("stringValue") {
        return s.clone();
    }
    if let Some(s) = obj.get("timestampValue") {
        return s.clone();
    }
    if let Some(b) = obj.get("booleanValue") {
        return b.clone();
    }
    if let Some(i) = obj.get("integerValue") {
        if let Some(n) = i.as_str().and_then(|s| s.parse::<i64>().ok()) {
            return json!(n);
        }
        return i.clone();
    }
    if let Some(d) = obj.get("doubleValue") {
        return d.clone();
    }
    if let Some(arr) = obj.get("arrayValue") {
        let items = arr
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(decode_value).collect())
            .unwrap_or_default();
        return Value::Array(items);
    }
    if let Some(map) = obj.get("mapValue") {
        return decode_fields(map.get("fields").unwrap_or(&Value::Null));
    }
    // nullValue or an unknown variant.
    Value::Null
}

/// Decode a Firestore `fields` map into a JSON object.
fn decode_fields(fields: &Value) -> Value {
    let mut out = Map::new();
    if let Some(obj) = fields.as_object() {
        for (key, value) in obj {
            out.insert(key.clone(), decode_value(value));
        }
    }
    Value::Object(out)
}

/// Decode a Firestore document resource into plain JSON, injecting the
/// document ID from the resource name when the payload itself lacks one.
fn decode_document(doc: &Value) -> Value {
    let mut decoded = decode_fields(doc.get("fields").unwrap_or(&Value::Null));

    if decoded.get("id").is_none()
        && let Some(name) = doc.get("name").and_then(Value::as_str)
        && let Some(id) = name.rsplit('/').next()
        && let Some(obj) = decoded.as_object_mut()
    {
        obj.insert("id".to_string(), json!(id));
    }

    decoded
}
