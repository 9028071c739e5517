//! Server transports. Stdio is the only transport: this server is meant to
//! be spawned by an MCP client as a child process.

pub mod stdio;

pub use stdio::run_stdio;
