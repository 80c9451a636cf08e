pub mod architect;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod impact;
pub mod logging;
pub mod model;
pub mod persist;
pub mod rpc;
pub mod scanner;
pub mod session;
pub mod state;
pub mod util;
