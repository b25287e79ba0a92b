//! Request extractors
//!
//! Wrap axum's extractors so malformed bodies, path segments and query
//! strings are answered with an [`ErrorResponse`] body instead of axum's
//! plain-text rejection.
//!
//! [`ErrorResponse`]: crate::ErrorResponse

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);
