// crates/af_engine/src/drift.rs

//! 位置漂移积分
//!
//! 蛙跳积分的第一半：对每个符合多步判定的粒子执行
//! `pos[k] += (vel[k] - cov_i[k]) * dt`（质心参考系下先扣除质心
//! 速度偏移）。所有线程汇合后，若本次调用是粗步的最后一个细分步，
//! 再把 `cov0 * dt` 折算进质心位置，一个粗步恰好折算一次。
//!
//! # 并行方案
//!
//! 一次 fork/join 覆盖全部组件：先按 `(粒子数, 线程数)` 把每个
//! 组件的粒子切成互不重叠的可变切片，线程 `id` 独占所有组件的第
//! `id` 段。由于分区确定且不重叠，粒子更新全程无锁；唯一的互斥量
//! 是汇合后短暂持有的推进计数归约。
//!
//! 线程派生失败是致命错误（没有降级的单线程回退）：部分并行的
//! 失败会静默破坏分区覆盖。

use std::time::{Duration, Instant};

use glam::DVec3;
use parking_lot::Mutex;

use af_core::{AfResult, RunConfig};
use af_runtime::partition;
use af_runtime::{ActiveLevel, MultistepState, WorkerPool};

use crate::component::ComponentSet;
use crate::particle::Particle;

// ============================================================
// 报告与指标
// ============================================================

/// 一次漂移调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftReport {
    /// 本次调用推进的粒子数
    pub advanced: u64,
    /// 全局运动是否被关闭（显式空操作，而非静默跳过）
    pub disabled: bool,
}

impl DriftReport {
    /// 运动关闭时的报告
    pub fn motion_disabled() -> Self {
        Self {
            advanced: 0,
            disabled: true,
        }
    }
}

/// 漂移积分性能指标
#[derive(Debug, Clone, Default)]
pub struct DriftMetrics {
    /// 总调用次数
    pub total_calls: usize,
    /// 因运动关闭而空跳的次数
    pub disabled_calls: usize,
    /// 累计推进的粒子数
    pub advanced_total: u64,
    /// 累计耗时
    pub total_duration: Duration,
}

impl DriftMetrics {
    /// 记录一次调用
    pub fn record(&mut self, advanced: u64, duration: Duration) {
        self.total_calls += 1;
        self.advanced_total += advanced;
        self.total_duration += duration;
    }

    /// 重置指标
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================
// 漂移积分器
// ============================================================

/// 线程的独占工作单元：某组件的一段粒子加该组件的速度偏移
struct DriftSlice<'a> {
    particles: &'a mut [Particle],
    cov: DVec3,
}

/// 多步感知的位置漂移积分器
pub struct DriftIntegrator {
    nthreads: usize,
    eqmotion: bool,
    metrics: DriftMetrics,
}

impl DriftIntegrator {
    /// 从运行配置构建
    pub fn new(config: &RunConfig) -> Self {
        Self {
            nthreads: config.nthreads,
            eqmotion: config.eqmotion,
            metrics: DriftMetrics::default(),
        }
    }

    /// 推进一个细分步的粒子位置
    ///
    /// `active` 选择本次调用允许推进的层级；调用返回时所有工作
    /// 线程都已汇合，调用方随后读取组件是安全的。
    pub fn drift(
        &mut self,
        set: &mut ComponentSet,
        state: &MultistepState,
        active: ActiveLevel,
        dt: f64,
    ) -> AfResult<DriftReport> {
        if !self.eqmotion {
            // 显式空操作：调用方能区分"功能关闭"与"无事可做"
            tracing::debug!("drift skipped: equations of motion disabled");
            self.metrics.total_calls += 1;
            self.metrics.disabled_calls += 1;
            return Ok(DriftReport::motion_disabled());
        }

        let start = Instant::now();
        let n = self.nthreads;
        let advanced = Mutex::new(0u64);

        {
            // 为每个线程收集它在所有组件中的独占切片
            let mut assignments: Vec<Vec<DriftSlice>> =
                (0..n).map(|_| Vec::with_capacity(set.components.len())).collect();

            for comp in set.components.iter_mut() {
                let cov = if comp.com_system { comp.cov_i } else { DVec3::ZERO };
                for (id, slice) in partition::split_mut(&mut comp.particles, n)
                    .into_iter()
                    .enumerate()
                {
                    assignments[id].push(DriftSlice { particles: slice, cov });
                }
            }

            let slots: Vec<Mutex<Option<Vec<DriftSlice>>>> = assignments
                .into_iter()
                .map(|a| Mutex::new(Some(a)))
                .collect();

            let mut pool = WorkerPool::new(n);
            pool.scoped(|h| {
                let Some(tasks) = slots[h.id].lock().take() else {
                    return;
                };

                let mut count = 0u64;
                for task in tasks {
                    for p in task.particles.iter_mut() {
                        if !state.advances(active, p.level) {
                            continue;
                        }
                        p.pos += (p.vel - task.cov) * dt;
                        count += 1;
                    }
                }

                // 汇合前唯一的共享写入：短暂持锁归约计数
                *advanced.lock() += count;
            })?;
        }

        // 粗步末折算质心位置，一个粗步只做一次
        if state.folds_com(active) {
            for comp in set.components.iter_mut() {
                if comp.com_system {
                    comp.com0 += comp.cov0 * dt;
                }
            }
        }

        let advanced = advanced.into_inner();
        self.metrics.record(advanced, start.elapsed());

        Ok(DriftReport {
            advanced,
            disabled: false,
        })
    }

    /// 累计性能指标
    pub fn metrics(&self) -> &DriftMetrics {
        &self.metrics
    }

    /// 重置性能指标
    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }
}
