//! Background tasks

pub mod tracker;
