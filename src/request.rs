//! Per-request context: path parameters, headers, decoded body, and the
//! authentication slots. Threaded explicitly through middleware and
//! handlers — there is no ambient request state.

use crate::entity::Entity;
use crate::error::ApiError;
use crate::store::Store;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Typed principal slots. Middleware logs a principal in; handlers and
/// modifiers read it back by type.
#[derive(Clone, Default)]
pub struct AuthContext {
    principals: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl AuthContext {
    pub fn login<P: Send + Sync + 'static>(&mut self, principal: P) {
        self.principals
            .insert(TypeId::of::<P>(), Arc::new(principal));
    }

    pub fn get<P: Send + Sync + 'static>(&self) -> Option<&P> {
        self.principals
            .get(&TypeId::of::<P>())
            .and_then(|p| p.downcast_ref::<P>())
    }

    pub fn require<P: Send + Sync + 'static>(&self) -> Result<&P, ApiError> {
        self.get::<P>()
            .ok_or_else(|| ApiError::Unauthorized("authentication required".into()))
    }
}

#[derive(Clone)]
pub struct RequestContext {
    params: HashMap<String, String>,
    headers: HeaderMap,
    body: Option<Value>,
    pub auth: AuthContext,
    store: Store,
}

impl RequestContext {
    pub fn new(store: Store) -> Self {
        RequestContext {
            params: HashMap::new(),
            headers: HeaderMap::new(),
            body: None,
            auth: AuthContext::default(),
            store,
        }
    }

    pub(crate) fn from_parts(
        store: Store,
        params: HashMap<String, String>,
        headers: HeaderMap,
        body: Option<Value>,
    ) -> Self {
        RequestContext {
            params,
            headers,
            body,
            auth: AuthContext::default(),
            store,
        }
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// Extract and parse an entity id from a path parameter.
    pub fn parameter<E: Entity>(&self, name: &str) -> Result<E::Id, ApiError> {
        let raw = self
            .param(name)
            .ok_or_else(|| ApiError::BadRequest(format!("missing path parameter '{}'", name)))?;
        raw.parse::<E::Id>()
            .map_err(|_| ApiError::BadRequest(format!("invalid identifier '{}'", raw)))
    }

    pub fn body(&self) -> Result<&Value, ApiError> {
        self.body
            .as_ref()
            .ok_or_else(|| ApiError::BadRequest("request body required".into()))
    }

    /// Decode the body into a concrete payload type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(self.body()?.clone())
            .map_err(|e| ApiError::BadRequest(format!("malformed payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Clone, Default, Serialize, Deserialize, PartialEq, Debug)]
    struct Gadget {
        id: Option<i64>,
        name: String,
    }

    impl Entity for Gadget {
        type Id = i64;
        const NAME: &'static str = "gadgets";

        fn id(&self) -> Option<i64> {
            self.id
        }
        fn set_id(&mut self, id: i64) {
            self.id = Some(id);
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Store::new(MemoryBackend::new()))
    }

    #[test]
    fn parameter_parses_into_the_id_type() {
        let ctx = ctx().with_param("gadget_id", "42");
        assert_eq!(ctx.parameter::<Gadget>("gadget_id").unwrap(), 42);
        assert!(matches!(
            ctx.parameter::<Gadget>("missing"),
            Err(ApiError::BadRequest(_))
        ));
        let ctx = ctx.with_param("gadget_id", "not-a-number");
        assert!(matches!(
            ctx.parameter::<Gadget>("gadget_id"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn decode_reads_the_attached_body() {
        let with_body = ctx().with_body(json!({"id": null, "name": "widget"}));
        let gadget: Gadget = with_body.decode().unwrap();
        assert_eq!(gadget.name, "widget");
        assert!(matches!(ctx().decode::<Gadget>(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn auth_slots_are_keyed_by_principal_type() {
        let mut ctx = ctx();
        assert!(matches!(
            ctx.auth.require::<Gadget>(),
            Err(ApiError::Unauthorized(_))
        ));
        ctx.auth.login(Gadget {
            id: Some(1),
            name: "principal".into(),
        });
        assert_eq!(ctx.auth.require::<Gadget>().unwrap().id, Some(1));
    }
}
