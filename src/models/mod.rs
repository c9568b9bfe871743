// src/models/mod.rs

pub mod attempt;
pub mod quiz;
pub mod session;
pub mod user;
