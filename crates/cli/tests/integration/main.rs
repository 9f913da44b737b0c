mod common;

mod list_tests;
#[cfg(unix)]
mod run_tests;
