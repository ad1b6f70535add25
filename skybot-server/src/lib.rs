pub mod api;
pub mod app;
pub mod handler;
pub mod integrations;
pub mod keycache;
pub mod mask;
