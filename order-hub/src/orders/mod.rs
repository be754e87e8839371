//! Order lifecycle: storage, store seam, change feed, submission, state
//! machine and expiry.

pub mod expiry;
pub mod feed;
pub mod machine;
pub mod storage;
pub mod store;
pub mod submission;

pub use expiry::ExpirySweeper;
pub use feed::{FeedError, FeedSubscription};
pub use machine::{OrderStateMachine, TransitionError};
pub use storage::{OrderStorage, StorageError};
pub use store::{LocalOrderStore, NewOrder, OrderStore, StatusUpdate, StoreError, StoreEvent};
pub use submission::{OrderSubmissionService, SubmissionError};
