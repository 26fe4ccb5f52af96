//! Portcullis authentication gateway.
//!
//! This crate wires the session, provider and core crates into an axum
//! server: OAuth2 login endpoints under a configurable prefix, a gate that
//! admits only callers with a live session, and a streaming reverse proxy
//! that forwards admitted requests with the caller's identity attached.

pub mod app;
pub mod auth;
pub mod config;
pub mod http;
pub mod proxy;
pub mod routes;
pub mod views;
