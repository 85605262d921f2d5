pub mod batch;
pub mod labeler;
pub mod limiter;
pub mod prompt;
pub mod retry;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod validate;

pub use batch::{
    label_batch, load_entries, run_batch, run_batch_with_policy, write_output, BatchStats,
};
pub use labeler::{LabelError, LabelExtractor, Labeler, OpenAiExtractor};
pub use limiter::Limiter;
pub use retry::RetryPolicy;
