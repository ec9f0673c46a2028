// crates/af_engine/src/lib.rs

//! AstroFlow Engine Layer (Layer 3)
//!
//! 粒子数据模型与漂移积分。
//!
//! # 模块概览
//!
//! - [`particle`]: 单个粒子（身份、位置、速度、层级、属性）
//! - [`component`]: 粒子组件与组件集合（稳定迭代序）
//! - [`drift`]: 多步感知的位置漂移积分器
//!
//! 力学求解器（基函数展开、势求解等）不属于本层，作为外部协作者
//! 只通过 `Component` 的聚合元数据交互。

#![warn(missing_docs)]

pub mod component;
pub mod drift;
pub mod particle;

/// 层级标识
pub const LAYER: u8 = 3;

pub use component::{Component, ComponentSet};
pub use drift::{DriftIntegrator, DriftMetrics, DriftReport};
pub use particle::Particle;
