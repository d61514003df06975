//! Accept loop feeding the worker pool.

pub mod listener;
