//! Integration tests, built as a single test binary

mod e2e_test;
mod feed_test;
mod pipeline_test;
