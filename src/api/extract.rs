use axum::extract::{FromRequest, FromRequestParts};

use crate::error::HandoverError;

/// `axum::Json` whose rejections come back as our `InvalidRequest` body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(HandoverError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` whose rejections come back as our `InvalidRequest` body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(HandoverError))]
pub struct ApiPath<T>(pub T);
