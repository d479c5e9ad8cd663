//! Bridge between the queue and the graph execution engine.
//!
//! The dispatcher owns the dequeue loop: it hands each job to the
//! configured [`GraphExecutor`](easel_core::executor::GraphExecutor),
//! forwards progress events to the owning session in emission order,
//! and records the terminal state back into the queue.

mod dispatcher;
mod simulator;

pub use dispatcher::{broadcast_status, start_dispatcher};
pub use simulator::SimulatedExecutor;
