mod handlers;
mod models;
mod state;
mod translate;
mod util;

pub use handlers::{app, run_server};
