pub mod got;
pub mod install;
