pub mod asset;
pub mod rental;
pub mod tier;
pub mod notification;
pub mod scheduler;
