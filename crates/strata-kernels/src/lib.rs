//! # strata-kernels
//!
//! Inference operators over [`strata_core::Tensor`].
//!
//! Provides:
//! - [`ops`]: checked tensor-level entry points (embedding, linear,
//!   rms_norm, rope, self_attention)
//! - [`cpu`]: the generic slice kernels behind them, f32/f16/bf16
//! - [`dispatch_float!`]: dtype tag → kernel instantiation
//! - [`KernelConfig`]: row-parallelism settings

pub mod config;
pub mod cpu;
pub mod dispatch;
pub mod ops;

pub use config::{config, set_config, KernelConfig};
pub use ops::{embedding, linear, rms_norm, rope, self_attention};
