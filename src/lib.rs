//! Newspaper - a small news site
//!
//! Readers sign up and log in; logged-in readers write, edit and delete
//! articles and comment on them.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
pub mod web;
