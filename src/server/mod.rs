// Server module entry point
// Listener setup, connection handling, signals and the accept loop

pub mod connection;
pub mod listener;
pub mod server_loop;
pub mod signal;

pub use listener::create_reusable_listener;
pub use server_loop::start_server_loop;
pub use signal::shutdown_signal;
