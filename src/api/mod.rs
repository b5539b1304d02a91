pub mod campaign;
pub mod compose;
pub mod handler;
pub mod middleware;
pub mod server;
