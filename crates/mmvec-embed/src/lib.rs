//! Embedding model clients, the async job poller and the result fetcher.

pub mod bedrock;
pub mod cancel;
pub mod fake;
pub mod fetch;
pub mod poll;

pub use bedrock::BedrockRuntimeClient;
pub use cancel::{cancellation, CancellationHandle, CancellationListener};
pub use fake::FakeEmbeddingModel;
pub use fetch::{fetch_segments, parse_segments};
pub use poll::{CompletedJob, JobPoller, PollPolicy, StatusObserver};
