//! Request coordination: single-flight, retry, polling and view-models.

mod error;
mod fetcher;
mod poll;
mod resource;
mod retry;
mod single_flight;

pub use error::{ErrorClass, FetchError};
pub use fetcher::Fetcher;
pub use poll::{PollSubscription, Poller, PollingController};
pub use resource::{LoadOutcome, Resource, ResourceState};
pub use retry::{DEFAULT_BACKOFF, DEFAULT_MAX_RETRIES, RetryPolicy};
pub use single_flight::{Flight, SingleFlight};
