pub mod domain;
pub mod infra;
pub mod usecase;

pub use domain::entity::{Post, PostKind, ThreadData};
pub use domain::error::DomainError;
pub use domain::repository::{PostRepository, ThreadSource};
pub use usecase::fetch::{FetchFailure, ThreadCache, ThreadState, ThreadStatus, ThreadUseCase};
pub use usecase::tree::{build_parent_index, render_order, ParentIndex, RenderOrder};
