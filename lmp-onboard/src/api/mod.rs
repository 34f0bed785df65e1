//! HTTP route handlers

pub mod claim;
pub mod health;
pub mod invitations;
pub mod webhook;
