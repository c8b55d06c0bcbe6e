mod catalog_routes;
pub mod config;
mod http_layers;
mod job_routes;
pub mod server;
pub mod state;
mod stream_song;
pub mod websocket;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
