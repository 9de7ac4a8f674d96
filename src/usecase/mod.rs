pub mod fetch;
pub mod tree;
