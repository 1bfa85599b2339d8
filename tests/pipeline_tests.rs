//! End-to-end pipeline tests
//!
//! ```bash
//! cargo test --test pipeline_tests
//! ```

mod pipeline;
