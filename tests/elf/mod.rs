//! End-to-end parsing tests.

mod real_files;
mod truncation;
