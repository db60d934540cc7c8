pub mod convert;
pub mod fewshot;
pub mod score;
pub mod split;
pub mod store;

pub mod prelude {
    pub use crate::convert::to_aggregate_document;
    pub use crate::fewshot::{FewShotGenerator, allowed_tokens, build_prompt};
    pub use crate::score::{RecordScore, ScoreReport, score};
    pub use crate::split::{FetchedDataset, split};
    pub use crate::store::{DatasetStore, FsDatasetStore};
}
