//! MCP server that lets LLMs manage GitHub milestones.
//!
//! Provides tools for listing, fetching, creating, updating, and deleting the
//! milestones of a repository through the GitHub REST API.

pub mod client;
pub mod config;
pub mod error;
pub mod params;
pub mod server;
