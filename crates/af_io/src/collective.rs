// crates/af_io/src/collective.rs

//! 集合式并行检查点
//!
//! 所有进程共同写一个检查点文件：每个进程只写自己持有的粒子记录，
//! 写入偏移由组件集合的共享元数据（逐进程计数表）独立算出，任何
//! 进程都不需要等待别人的负载大小。0 号进程额外负责主头部和各
//! 组件头部。
//!
//! 这是一个跨进程同步点：要么所有参与进程都调用本操作，要么都
//! 不调用；没有部分参与的回退。
//!
//! # 失败语义
//!
//! 单进程的打开/写入错误被捕获为带上下文的状态并记录日志，运行
//! 继续——一次瞬时 IO 错误不值得中止一场长物理模拟。但失败的
//! 文件名**不会**被提升为"最近检查点"，串行写出器的仅链接快路径
//! 因此永远不会指向一个可能不完整的 dump。

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Instant;

use af_core::{Precision, RunConfig};
use af_engine::ComponentSet;

use crate::error::IoError;
use crate::format::{particle_record_size, ComponentHeader, MasterHeader, encode_particle};
use crate::offset::write_at;

/// 编号 dump 文件名前缀
pub const DUMP_PREFIX: &str = "OUTS";

/// 重启探测的序号上限
const PROBE_LIMIT: u32 = 100_000;

/// 编号 dump 路径 `<outdir>/OUTS.<runtag>.<5位零填充序号>`
pub fn dump_path(outdir: &Path, runtag: &str, index: u32) -> PathBuf {
    outdir.join(format!("{DUMP_PREFIX}.{runtag}.{index:05}"))
}

/// 重启时探测起始序号：第一个尚不存在的编号
pub fn probe_start_index(outdir: &Path, runtag: &str) -> u32 {
    for index in 0..PROBE_LIMIT {
        if !dump_path(outdir, runtag, index).exists() {
            if index > 0 {
                tracing::info!("resuming numbered dumps at index {index}");
            }
            return index;
        }
    }
    PROBE_LIMIT
}

// ============================================================
// 结果类型
// ============================================================

/// 最近一次成功的集合式 dump
///
/// 串行写出器据此决定是否走仅链接快路径。失败的 dump 不产生本记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastDump {
    /// dump 序号
    pub index: u32,
    /// 覆盖的模拟步
    pub step: u64,
    /// dump 文件路径
    pub path: PathBuf,
}

/// 一次集合式写出的结果
#[derive(Debug)]
pub enum DumpOutcome {
    /// 本进程的所有写入都成功
    Written(LastDump),
    /// 至少一次调用失败；该序号不被提升为最近检查点
    Failed {
        /// dump 序号
        index: u32,
        /// dump 文件路径
        path: PathBuf,
        /// 捕获的全部错误
        errors: Vec<IoError>,
    },
}

impl DumpOutcome {
    /// 成功时的最近 dump 记录
    pub fn last_dump(&self) -> Option<&LastDump> {
        match self {
            Self::Written(dump) => Some(dump),
            Self::Failed { .. } => None,
        }
    }

    /// 是否成功
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

// ============================================================
// 写出器
// ============================================================

/// 集合式检查点写出器
pub struct CollectiveWriter {
    outdir: PathBuf,
    runtag: String,
    rank: usize,
    precision: Precision,
    nint: u64,
    timer: bool,
    next_index: u32,
}

impl CollectiveWriter {
    /// 从运行配置构建；起始序号取 `checkpoint.nbeg`
    pub fn new(config: &RunConfig) -> Self {
        if config.checkpoint.nagg > 1 {
            tracing::debug!(
                nagg = config.checkpoint.nagg,
                "aggregator hint recorded; each rank still writes its own extent"
            );
        }
        Self {
            outdir: config.outdir.clone(),
            runtag: config.runtag.clone(),
            rank: config.rank,
            precision: config.checkpoint.precision,
            nint: config.checkpoint.nint,
            timer: config.checkpoint.timer,
            next_index: config.checkpoint.nbeg,
        }
    }

    /// 重启时探测已有编号文件，跳过它们
    pub fn resume(&mut self) {
        let probed = probe_start_index(&self.outdir, &self.runtag);
        if probed > self.next_index {
            self.next_index = probed;
        }
    }

    /// 下一个将使用的 dump 序号
    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    /// 周期性入口：步数命中间隔或运行结束时写出
    pub fn run(&mut self, set: &ComponentSet, time: f64, step: u64, last: bool) -> Option<DumpOutcome> {
        if step % self.nint != 0 && !last {
            return None;
        }
        Some(self.write_dump(set, time, step))
    }

    /// 写出一个编号 dump
    ///
    /// 序号无条件递增：失败的序号同样被消耗，之后的重试落到新文件，
    /// 不会覆盖一个状态不明的旧文件。
    pub fn write_dump(&mut self, set: &ComponentSet, time: f64, step: u64) -> DumpOutcome {
        let index = self.next_index;
        self.next_index += 1;

        let path = dump_path(&self.outdir, &self.runtag, index);
        let started = self.timer.then(Instant::now);
        let mut errors: Vec<IoError> = Vec::new();

        let file = match OpenOptions::new().create(true).write(true).open(&path) {
            Ok(f) => f,
            Err(source) => {
                tracing::error!("collective dump: cannot open {}: {source}", path.display());
                return DumpOutcome::Failed {
                    index,
                    path: path.clone(),
                    errors: vec![IoError::Open { path, source }],
                };
            }
        };

        let mut capture = |err: IoError| {
            tracing::error!("collective dump {index:05}: {err}");
            errors.push(err);
        };

        // 0 号进程写主头部；其余进程只推进偏移
        let mut offset = 0u64;
        if self.rank == 0 {
            let header = MasterHeader {
                time,
                ntot: set.ntot(),
                ncomp: set.ncomp(),
            };
            if let Err(source) = write_at(&file, offset, &header.to_bytes()) {
                capture(IoError::WriteAt {
                    path: path.clone(),
                    offset,
                    source,
                });
            }
        }
        offset += MasterHeader::SIZE as u64;

        for comp in &set.components {
            let record = particle_record_size(self.precision, comp.niattrib, comp.ndattrib) as u64;

            if self.rank == 0 {
                match ComponentHeader::from_component(comp).to_bytes() {
                    Ok(bytes) => {
                        if let Err(source) = write_at(&file, offset, &bytes) {
                            capture(IoError::WriteAt {
                                path: path.clone(),
                                offset,
                                source,
                            });
                        }
                    }
                    Err(err) => capture(err),
                }
            }
            offset += ComponentHeader::SIZE as u64;

            // 本进程的记录区间：仅由共享计数表决定，无需通信
            let my_offset = offset + comp.rank_offset(self.rank) * record;
            if !comp.particles.is_empty() {
                let mut buf = Vec::with_capacity(comp.particles.len() * record as usize);
                for p in &comp.particles {
                    encode_particle(p, self.precision, &mut buf);
                }
                if let Err(source) = write_at(&file, my_offset, &buf) {
                    capture(IoError::WriteAt {
                        path: path.clone(),
                        offset: my_offset,
                        source,
                    });
                }
            }

            // 跳过整个组件块，落到下一个组件头部
            offset += comp.nbodies_tot * record;
        }

        if let Some(started) = started {
            tracing::info!(
                "collective dump {index:05} [T={time}] timing={:.3}s",
                started.elapsed().as_secs_f64()
            );
        }

        if errors.is_empty() {
            tracing::info!(
                "collective dump written: {} (step {step})",
                path.display()
            );
            DumpOutcome::Written(LastDump { index, step, path })
        } else {
            tracing::error!(
                "collective dump {index:05} failed with {} error(s); not promoted as latest",
                errors.len()
            );
            DumpOutcome::Failed { index, path, errors }
        }
    }
}
