pub mod activity;
pub mod capture;
