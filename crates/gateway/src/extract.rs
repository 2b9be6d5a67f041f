//! Request extractors

use axum::extract::FromRequest;
use personaiq_common::errors::AppError;

/// `axum::Json` whose rejections render as the API's JSON error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
