//! Generic CRUD controller over a `FileStore`.
//!
//! Every resource exposes the same six routes; what differs per resource
//! (field shapes, random generator, relative patch rules) lives in its
//! `ResourceSpec`.

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use rand::RngCore;
use serde_json::{json, Value};

use futures_util::future::BoxFuture;

use crate::http::handler::{Handler, HandlerResult};
use crate::http::request::RequestContext;
use crate::http::response::ResponseContext;
use crate::routing::Router;
use crate::store::{run_blocking, FileStore, Record, StoreError};

/// A numeric field that PATCH changes relatively, clamped at `min`.
#[derive(Debug, Clone, Copy)]
pub struct Counter {
    pub field: &'static str,
    pub min: f64,
}

/// How PATCH combines an incoming list with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMerge {
    /// Union keeping first-seen order.
    Union,
    /// Plain concatenation.
    Append,
}

/// Everything that distinguishes one resource from another.
pub struct ResourceSpec {
    /// Collection name, also the file stem and mount path.
    pub name: &'static str,
    /// Human-readable singular, used in messages.
    pub singular: &'static str,
    /// Fields a non-empty create body must carry (truthy).
    pub required: &'static [&'static str],
    /// Random record used when a create/replace body is empty.
    pub generate: fn(&mut dyn RngCore) -> Record,
    /// Normalize a client body into a stored record.
    pub build: fn(&Record) -> Record,
    /// Fields PATCH adds to instead of overwriting.
    pub counters: &'static [Counter],
    /// List field PATCH combines with the stored list.
    pub list: &'static str,
    pub list_merge: ListMerge,
    /// Explanation attached to PATCH responses.
    pub patch_note: &'static str,
    /// Resource-specific adjustments after the generic patch rules,
    /// called with the stored record, the client body and the updates.
    pub after_patch: Option<fn(&Record, &Record, &mut Record)>,
}

impl fmt::Debug for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSpec")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("counters", &self.counters)
            .field("list", &self.list)
            .finish_non_exhaustive()
    }
}

impl ResourceSpec {
    /// File holding this collection.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.name)
    }
}

/// JavaScript-style truthiness for required-field checks.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Coerce a JSON value to a number; anything unparsable becomes 0.
pub fn number(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Value::Bool(true)) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Emit whole numbers as integers, everything else as floats.
pub fn num_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

/// Combine a stored JSON list with an incoming one.
fn merge_lists(existing: Option<&Value>, incoming: &[Value], mode: ListMerge) -> Vec<Value> {
    let mut merged: Vec<Value> = existing
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for item in incoming {
        if mode == ListMerge::Append || !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}

/// Apply the relative patch rules to a client update.
pub fn prepare_patch(spec: &ResourceSpec, existing: &Record, body: &Record) -> Record {
    let mut updates = body.clone();

    for counter in spec.counters {
        if let Some(delta) = updates.get(counter.field) {
            let current = number(existing.get(counter.field));
            let next = (current + number(Some(delta))).max(counter.min);
            updates.insert(counter.field.to_string(), num_value(next));
        }
    }

    if let Some(Value::Array(incoming)) = updates.get(spec.list) {
        let merged = merge_lists(existing.get(spec.list), incoming, spec.list_merge);
        updates.insert(spec.list.to_string(), Value::Array(merged));
    }

    if let Some(adjust) = spec.after_patch {
        adjust(existing, body, &mut updates);
    }
    updates
}

fn not_found(spec: &ResourceSpec, res: &mut ResponseContext) -> HandlerResult {
    res.status(StatusCode::NOT_FOUND).json(&json!({
        "success": false,
        "error": format!("{} not found", spec.singular),
    }))
}

fn failed(res: &mut ResponseContext, action: String, err: StoreError) -> HandlerResult {
    tracing::error!(error = %err, "{}", action);
    res.status(StatusCode::INTERNAL_SERVER_ERROR).json(&json!({
        "success": false,
        "error": action,
        "message": err.to_string(),
    }))
}

/// The six CRUD operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    List,
    Show,
    Create,
    Replace,
    Patch,
    Remove,
}

/// One resource route. Store I/O runs on the blocking pool.
struct Endpoint {
    spec: &'static ResourceSpec,
    store: Arc<FileStore>,
    action: Action,
}

impl Handler for Endpoint {
    fn call<'a>(
        &'a self,
        req: &'a mut RequestContext,
        res: &'a mut ResponseContext,
    ) -> BoxFuture<'a, HandlerResult> {
        let id = req.param("id").unwrap_or_default().to_string();
        // Non-object bodies carry no fields.
        let body = req.body.as_object().cloned();

        Box::pin(async move {
            match self.action {
                Action::List => self.list(res).await,
                Action::Show => self.show(id, res).await,
                Action::Create => self.create(body, res).await,
                Action::Replace => self.replace(id, body, res).await,
                Action::Patch => self.patch(id, body.unwrap_or_default(), res).await,
                Action::Remove => self.remove(id, res).await,
            }
        })
    }
}

impl Endpoint {
    fn lower(&self) -> String {
        self.spec.singular.to_lowercase()
    }

    async fn list(&self, res: &mut ResponseContext) -> HandlerResult {
        match run_blocking(&self.store, |s| s.read()).await {
            Ok(records) => res.json(&json!({
                "success": true,
                "count": records.len(),
                "data": records,
            })),
            Err(e) => failed(res, format!("Failed to fetch {}", self.spec.name), e),
        }
    }

    async fn show(&self, id: String, res: &mut ResponseContext) -> HandlerResult {
        match run_blocking(&self.store, move |s| s.find_by_id(&id)).await {
            Ok(Some(record)) => res.json(&json!({ "success": true, "data": record })),
            Ok(None) => not_found(self.spec, res),
            Err(e) => failed(res, format!("Failed to fetch {}", self.lower()), e),
        }
    }

    async fn create(&self, body: Option<Record>, res: &mut ResponseContext) -> HandlerResult {
        let spec = self.spec;
        let record = match body {
            Some(body) if body.is_empty() => (spec.generate)(&mut rand::thread_rng()),
            body => {
                let missing: Vec<&str> = spec
                    .required
                    .iter()
                    .copied()
                    .filter(|field| !truthy(body.as_ref().and_then(|b| b.get(*field))))
                    .collect();
                let Some(body) = body.filter(|_| missing.is_empty()) else {
                    return res.status(StatusCode::BAD_REQUEST).json(&json!({
                        "success": false,
                        "error": "Missing required fields",
                        "fields": missing,
                    }));
                };
                (spec.build)(&body)
            }
        };

        match run_blocking(&self.store, move |s| s.create(record)).await {
            Ok(created) => res.status(StatusCode::CREATED).json(&json!({
                "success": true,
                "message": format!("{} created successfully", spec.singular),
                "data": created,
            })),
            Err(e) => failed(res, format!("Failed to create {}", self.lower()), e),
        }
    }

    async fn replace(
        &self,
        id: String,
        body: Option<Record>,
        res: &mut ResponseContext,
    ) -> HandlerResult {
        let spec = self.spec;
        let record = match body {
            Some(body) if body.is_empty() => (spec.generate)(&mut rand::thread_rng()),
            Some(body) => (spec.build)(&body),
            None => (spec.build)(&Record::new()),
        };

        match run_blocking(&self.store, move |s| s.update(&id, record)).await {
            Ok(Some(updated)) => res.json(&json!({
                "success": true,
                "message": format!("{} updated successfully", spec.singular),
                "data": updated,
            })),
            Ok(None) => not_found(spec, res),
            Err(e) => failed(res, format!("Failed to update {}", self.lower()), e),
        }
    }

    async fn patch(&self, id: String, body: Record, res: &mut ResponseContext) -> HandlerResult {
        let spec = self.spec;
        let patched = run_blocking(&self.store, move |s| {
            let Some(existing) = s.find_by_id(&id)? else {
                return Ok(None);
            };
            s.patch(&id, prepare_patch(spec, &existing, &body))
        })
        .await;

        match patched {
            Ok(Some(patched)) => res.json(&json!({
                "success": true,
                "message": format!("{} patched successfully (non-idempotent operation)", spec.singular),
                "data": patched,
                "note": spec.patch_note,
            })),
            Ok(None) => not_found(spec, res),
            Err(e) => failed(res, format!("Failed to patch {}", self.lower()), e),
        }
    }

    async fn remove(&self, id: String, res: &mut ResponseContext) -> HandlerResult {
        match run_blocking(&self.store, move |s| s.delete(&id)).await {
            Ok(true) => res.json(&json!({
                "success": true,
                "message": format!("{} deleted successfully", self.spec.singular),
            })),
            Ok(false) => not_found(self.spec, res),
            Err(e) => failed(res, format!("Failed to delete {}", self.lower()), e),
        }
    }
}

/// Build the CRUD router for one resource.
pub fn router(spec: &'static ResourceSpec, store: Arc<FileStore>) -> Router {
    let endpoint = |action| Endpoint {
        spec,
        store: store.clone(),
        action,
    };

    let mut router = Router::new();
    router.get("/", endpoint(Action::List));
    router.get("/:id", endpoint(Action::Show));
    router.post("/", endpoint(Action::Create));
    router.put("/:id", endpoint(Action::Replace));
    router.patch("/:id", endpoint(Action::Patch));
    router.delete("/:id", endpoint(Action::Remove));
    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::catalog::HOTELS;
    use crate::routing::App;
    use axum::http::Method;

    #[test]
    fn test_truthiness() {
        assert!(!truthy(None));
        assert!(!truthy(Some(&json!(null))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(false))));
        assert!(truthy(Some(&json!("x"))));
        assert!(truthy(Some(&json!(12.5))));
        assert!(truthy(Some(&json!([]))));
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(number(Some(&json!(3))), 3.0);
        assert_eq!(number(Some(&json!("-2"))), -2.0);
        assert_eq!(number(Some(&json!("abc"))), 0.0);
        assert_eq!(number(Some(&json!(true))), 1.0);
        assert_eq!(number(None), 0.0);
    }

    #[test]
    fn test_num_value_keeps_integers() {
        assert_eq!(num_value(4.0), json!(4));
        assert_eq!(num_value(4.5), json!(4.5));
    }

    #[test]
    fn test_union_keeps_order() {
        let merged = merge_lists(
            Some(&json!(["a", "b"])),
            &[json!("b"), json!("c")],
            ListMerge::Union,
        );
        assert_eq!(merged, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_append_keeps_duplicates() {
        let merged = merge_lists(Some(&json!(["a"])), &[json!("a")], ListMerge::Append);
        assert_eq!(merged, vec![json!("a"), json!("a")]);
    }

    #[test]
    fn test_missing_stored_list_starts_empty() {
        let merged = merge_lists(None, &[json!(1)], ListMerge::Union);
        assert_eq!(merged, vec![json!(1)]);
    }

    async fn call(app: &App, method: Method, target: &str, body: Option<Value>) -> ResponseContext {
        let mut req = RequestContext::new(method, target);
        if let Some(body) = body {
            req = req.with_body(body.to_string());
        }
        let mut res = ResponseContext::new();
        app.handle(&mut req, &mut res).await;
        res
    }

    #[tokio::test]
    async fn endpoints_round_trip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path(), &HOTELS.file_name()));
        let mut app = App::new();
        app.mount("/hotels", router(&HOTELS, store));

        let created = call(
            &app,
            Method::POST,
            "/hotels",
            Some(json!({ "name": "Dune", "country": "Egypt", "city": "Hurghada", "amenities": ["Pool"] })),
        )
        .await;
        assert_eq!(created.status_code(), StatusCode::CREATED);

        let patched = call(
            &app,
            Method::PATCH,
            "/hotels/1",
            Some(json!({ "roomCount": 12, "amenities": ["Pool", "Spa"] })),
        )
        .await;
        let body = patched.body_json().unwrap();
        assert_eq!(body["data"]["roomCount"], json!(12));
        assert_eq!(body["data"]["amenities"], json!(["Pool", "Spa"]));

        let removed = call(&app, Method::DELETE, "/hotels/1", None).await;
        assert_eq!(removed.status_code(), StatusCode::OK);

        let missing = call(&app, Method::GET, "/hotels/1", None).await;
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            missing.body_json().unwrap(),
            json!({ "success": false, "error": "Hotel not found" })
        );
    }

    #[tokio::test]
    async fn replace_of_unknown_record_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path(), &HOTELS.file_name()));
        let mut app = App::new();
        app.mount("/hotels", router(&HOTELS, store));

        let res = call(&app, Method::PUT, "/hotels/4", Some(json!({ "name": "Ghost" }))).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert!(!dir.path().join("hotels.json").exists());
    }
}
