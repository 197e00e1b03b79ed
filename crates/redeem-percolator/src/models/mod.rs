pub mod classifier_trait;
pub mod factory;
pub mod gbdt;
pub mod grid_search;
pub mod svm;
pub mod utils;
