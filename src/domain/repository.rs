use super::entity::{Post, ThreadData};
use super::error::DomainError;

/// The external Post-Fetch API: resolves a post id into its thread.
///
/// Implementations fail with `NotFound` when the id does not resolve and with
/// `Transport` on network or timeout failures.
pub trait ThreadSource {
    fn get_thread(&self, root_id: &str) -> Result<ThreadData, DomainError>;
}

impl<S: ThreadSource + ?Sized> ThreadSource for &S {
    fn get_thread(&self, root_id: &str) -> Result<ThreadData, DomainError> {
        (**self).get_thread(root_id)
    }
}

pub trait PostRepository {
    fn insert_batch(&self, posts: &[Post]) -> Result<usize, DomainError>;
    fn find_by_id(&self, id: &str) -> Result<Option<Post>, DomainError>;
    fn count(&self) -> Result<usize, DomainError>;
}
