// ABOUTME: Command module aggregator for the dockyard CLI.
// ABOUTME: Re-exports the worker, queue, and container command handlers.

mod connection;
mod enqueue;
mod logs;
mod status;
mod teardown;
mod worker;

pub use enqueue::enqueue;
pub use logs::logs;
pub use status::status;
pub use teardown::teardown;
pub use worker::{WorkerOptions, worker};
