//! Standard response envelope: single values under `data`, collections with
//! a count in `meta`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

/// Outcome of a leaf handler: a status plus an optional JSON body, wrapped
/// into the envelope at the transport boundary.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply {
            status: StatusCode::OK,
            body: Some(body),
        }
    }

    pub fn created(body: Value) -> Self {
        Reply {
            status: StatusCode::CREATED,
            body: Some(body),
        }
    }

    pub fn no_content() -> Self {
        Reply {
            status: StatusCode::NO_CONTENT,
            body: None,
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self.body {
            None => self.status.into_response(),
            Some(Value::Array(items)) => {
                let count = items.len() as u64;
                (
                    self.status,
                    Json(SuccessMany {
                        data: items,
                        meta: MetaCount { count },
                    }),
                )
                    .into_response()
            }
            Some(v) => (self.status, Json(SuccessOne { data: v })).into_response(),
        }
    }
}
