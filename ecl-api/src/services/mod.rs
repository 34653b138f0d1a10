//! Service Layer
//!
//! The object-safe summary service handed to the routes, and the sample
//! portfolio seeder used on startup.

mod seeder;
mod summary_service;

pub use seeder::*;
pub use summary_service::*;
