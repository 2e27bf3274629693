//! Ingress request handlers

pub mod health;
pub mod proxy;
