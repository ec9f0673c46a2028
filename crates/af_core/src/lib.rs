// crates/af_core/src/lib.rs

//! AstroFlow Core Layer (Layer 1)
//!
//! 粒子模拟引擎的基础层，提供整个工程共用的核心抽象：
//!
//! - [`error`]: 统一错误分类（致命 / 可恢复）与退出码映射
//! - [`precision`]: 检查点输出精度选择（f32/f64）
//! - [`config`]: 不可变运行配置（进程身份、线程数、多步参数）
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: af_cli      ─> 命令行工具
//! Layer 4: af_io       ─> 检查点读写（串行 / 集合式）
//! Layer 3: af_engine   ─> Component, DriftIntegrator
//! Layer 2: af_runtime  ─> WorkerPool, 分区, 多步调度
//! Layer 1: af_core     ─> AfError, Precision, RunConfig (本层)
//! ```
//!
//! # 设计原则
//!
//! 1. **配置不可变**: `RunConfig` 启动时构建一次，之后只读传递
//! 2. **错误可分类**: 每个错误都能回答"是否致命"与"以何退出码终止"
//! 3. **零物理依赖**: 本层不感知任何力学求解器

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod precision;

/// 层级标识
pub const LAYER: u8 = 1;

pub use config::{CheckpointConfig, RunConfig};
pub use error::{AfError, AfResult};
pub use precision::Precision;
