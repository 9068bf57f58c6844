pub mod adapters;
pub mod config;
pub mod error;
pub mod export;
pub mod gateway;
pub mod profile;
pub mod web;
