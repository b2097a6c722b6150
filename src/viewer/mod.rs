//! Real-time viewer channel.

pub mod server;

pub use server::ViewerServer;
