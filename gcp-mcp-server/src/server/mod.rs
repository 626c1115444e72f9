mod http_layers;
pub mod server;
pub(self) mod session;
pub mod state;
pub mod stdio;

pub use http_layers::*;
pub use server::run_server;
pub use session::HEADER_SESSION_ID;
pub use stdio::run_stdio;
