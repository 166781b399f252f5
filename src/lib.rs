pub mod acquire;
pub mod backfill;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod evaluate;
pub mod export;
pub mod features;
pub mod head_to_head;
pub mod poisson;
pub mod store;
pub mod synthetic;
pub mod team_form;
pub mod train;
pub mod tree;
