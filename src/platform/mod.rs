// ABOUTME: Platform implementations behind the salon chat abstraction
// ABOUTME: Matrix is the production transport; tests use salon_core::testing::MockPlatform

pub mod matrix;

pub use matrix::MatrixPlatform;
