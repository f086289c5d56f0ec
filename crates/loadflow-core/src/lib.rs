pub mod models;
pub mod orchestration;
