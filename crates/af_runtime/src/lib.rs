// crates/af_runtime/src/lib.rs

//! AstroFlow Runtime Layer (Layer 2)
//!
//! 进程内并行原语与多步调度状态。
//!
//! # 模块概览
//!
//! - [`pool`]: 固定规模 fork/join 工作线程池（每次调用重建，无跨调用状态）
//! - [`partition`]: 确定性的连续粒子分区（无锁并行的基础）
//! - [`multistep`]: 多步积分调度状态与参与判定
//!
//! # 并发模型
//!
//! 每次并行调用按 `(总数, 线程数)` 把粒子索引空间切成互不重叠的
//! 连续区间，一个线程独占一个区间，因此粒子字段的更新不需要任何锁。
//! 唯一的阻塞点是 join；线程之间没有会合点。

#![warn(missing_docs)]

pub mod multistep;
pub mod partition;
pub mod pool;

/// 层级标识
pub const LAYER: u8 = 2;

pub use multistep::{ActiveLevel, MultistepState};
pub use pool::{PoolError, PoolResult, WorkHandle, WorkerPool};
