pub mod cache;
pub mod geodesy;
pub mod harness;
pub mod inference;
pub mod model_store;
pub mod predictor;
pub mod projection;
pub mod prompt;
pub mod refinement;
pub mod search;
pub mod similarity;
pub mod survival;
pub mod triangulation;
