// Stream-based inference pipeline: event log → encode → decide → persist → notify.
// The consumer runs as one background task; HTTP handlers only start it or observe it.

pub mod consumer;
pub mod handlers;
pub mod supervisor;

pub use consumer::PipelineComponents;
pub use supervisor::ConsumerSupervisor;
