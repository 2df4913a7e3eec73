//! Integration tests for Layer 0: Foundation
//!
//! Tests for values, types, and errors.

mod values;
