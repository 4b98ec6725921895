pub mod agent;
pub mod client;
pub mod command;
pub mod config;
pub mod conversation;
pub mod error;
pub mod file_system;
pub mod file_tree;
pub mod gemini;
pub mod handlers;
pub mod models;
pub mod preview;
pub mod publisher;
pub mod sandbox;
pub mod session;
pub mod workspace;
