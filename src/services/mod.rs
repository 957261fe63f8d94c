pub mod availability;
pub mod pricing;
pub mod rating;
pub mod permissions;
