// crates/af_runtime/src/pool.rs

//! 固定规模 fork/join 工作线程池
//!
//! 通用的按调用派生/汇合抽象：`start(N)` 精确派生 N 个工作线程，
//! 每个线程以唯一的整数身份被调用恰好一次；`join` 阻塞直到最慢的
//! 线程完成。池不做任何结果聚合，调用方通过共享状态自行归约。
//!
//! 线程池按调用重建而不是常驻复用：每次调用付出派生/汇合成本，
//! 换来调用之间不存在任何遗留的工作线程状态。
//!
//! # 两条使用路径
//!
//! - [`WorkerPool::start`] / [`WorkerPool::join`]: 任务须为 `'static`，
//!   汇合点由调用方显式控制；
//! - [`WorkerPool::scoped`]: 结构化 fork/join，任务可以借用调用方
//!   栈上的数据（漂移积分走这条路径），作用域退出时保证汇合，
//!   即使提前出错也不会泄漏未汇合的线程。
//!
//! 两条路径共享同一个"运行中"状态：一个池同一时刻只能有一组
//! 未汇合的工作线程。

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// 线程池结果类型别名
pub type PoolResult<T> = Result<T, PoolError>;

/// 线程池错误
#[derive(Debug, Error)]
pub enum PoolError {
    /// 上一组工作线程尚未汇合
    #[error("Worker pool is already running; join before restarting")]
    AlreadyRunning,

    /// 没有未汇合的工作线程
    #[error("No active worker pool to join")]
    NotRunning,

    /// 线程派生失败（致命：部分线程池会静默漏算分区）
    #[error("Cannot spawn worker {id}: {source}")]
    Spawn {
        /// 派生失败的线程身份
        id: usize,
        /// 底层错误
        #[source]
        source: std::io::Error,
    },

    /// 线程汇合失败（致命：该线程可能仍在修改共享状态）
    #[error("Worker {id} could not be joined (panicked)")]
    Join {
        /// 汇合失败的线程身份
        id: usize,
    },
}

impl From<PoolError> for af_core::AfError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Join { id } => af_core::AfError::Join {
                worker: id,
                reason: "worker panicked".to_string(),
            },
            other => af_core::AfError::Setup {
                what: "worker pool".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// 传给每个工作线程的临时记录
///
/// 按调用创建，汇合后销毁。操作相关的参数（时间步长、活动层级）
/// 由任务闭包自行捕获。
#[derive(Debug, Clone, Copy)]
pub struct WorkHandle {
    /// 线程身份，取值 `[0, size)`，一次调用内唯一
    pub id: usize,
    /// 本次调用的线程总数
    pub size: usize,
}

/// 固定规模工作线程池
pub struct WorkerPool {
    size: usize,
    handles: Vec<JoinHandle<()>>,
    scoped_active: bool,
}

impl WorkerPool {
    /// 创建规模为 `size` 的线程池（尚未派生任何线程）
    pub fn new(size: usize) -> Self {
        debug_assert!(size > 0, "pool size must be >= 1");
        Self {
            size,
            handles: Vec::new(),
            scoped_active: false,
        }
    }

    /// 线程池规模
    pub fn size(&self) -> usize {
        self.size
    }

    /// 是否有未汇合的工作线程
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty() || self.scoped_active
    }

    /// 派生全部工作线程，每个线程以唯一身份调用 `work` 一次
    ///
    /// 上一组线程未汇合时返回 [`PoolError::AlreadyRunning`]。
    /// 派生失败返回 [`PoolError::Spawn`]；此时已派生的线程会先被
    /// 汇合，再上报错误，保证不会留下失控的部分池。
    pub fn start<F>(&mut self, work: F) -> PoolResult<()>
    where
        F: Fn(WorkHandle) + Send + Sync + 'static,
    {
        if self.is_running() {
            return Err(PoolError::AlreadyRunning);
        }

        let work = Arc::new(work);
        for id in 0..self.size {
            let task = Arc::clone(&work);
            let handle = WorkHandle { id, size: self.size };
            let spawned = thread::Builder::new()
                .name(format!("af-worker-{id}"))
                .spawn(move || task(handle));

            match spawned {
                Ok(h) => self.handles.push(h),
                Err(source) => {
                    // 回收已派生的线程后再上报
                    for h in self.handles.drain(..) {
                        let _ = h.join();
                    }
                    return Err(PoolError::Spawn { id, source });
                }
            }
        }
        Ok(())
    }

    /// 阻塞等待所有工作线程完成并释放句柄
    ///
    /// 完成顺序不作任何保证，必须等到最慢的线程。没有未汇合线程时
    /// 返回 [`PoolError::NotRunning`]。任一线程 panic 时，其余线程
    /// 仍会被全部汇合，然后上报第一个 [`PoolError::Join`]。
    pub fn join(&mut self) -> PoolResult<()> {
        if self.handles.is_empty() {
            return Err(PoolError::NotRunning);
        }

        let mut first_failure = None;
        for (id, handle) in self.handles.drain(..).enumerate() {
            if handle.join().is_err() && first_failure.is_none() {
                first_failure = Some(PoolError::Join { id });
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// `start` + `join` 的便捷组合
    pub fn run<F>(&mut self, work: F) -> PoolResult<()>
    where
        F: Fn(WorkHandle) + Send + Sync + 'static,
    {
        self.start(work)?;
        self.join()
    }

    /// 结构化 fork/join：任务可借用调用方数据，作用域退出保证汇合
    ///
    /// 与 `start`/`join` 共享"运行中"状态。派生失败时，已派生的
    /// 线程由作用域负责汇合，随后上报 [`PoolError::Spawn`]。
    pub fn scoped<F>(&mut self, work: F) -> PoolResult<()>
    where
        F: Fn(WorkHandle) + Send + Sync,
    {
        if self.is_running() {
            return Err(PoolError::AlreadyRunning);
        }
        self.scoped_active = true;

        let size = self.size;
        let work = &work;
        let result = thread::scope(|s| {
            let mut spawned = Vec::with_capacity(size);
            let mut spawn_failure = None;

            for id in 0..size {
                let handle = WorkHandle { id, size };
                let r = thread::Builder::new()
                    .name(format!("af-worker-{id}"))
                    .spawn_scoped(s, move || work(handle));
                match r {
                    Ok(h) => spawned.push(h),
                    Err(source) => {
                        spawn_failure = Some(PoolError::Spawn { id, source });
                        break;
                    }
                }
            }

            let mut join_failure = None;
            for (id, h) in spawned.into_iter().enumerate() {
                if h.join().is_err() && join_failure.is_none() {
                    join_failure = Some(PoolError::Join { id });
                }
            }

            match (spawn_failure, join_failure) {
                (Some(e), _) => Err(e),
                (None, Some(e)) => Err(e),
                (None, None) => Ok(()),
            }
        });

        self.scoped_active = false;
        result
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // 销毁一个仍有未汇合线程的池是调用方错误；尽力汇合并记录
        if !self.handles.is_empty() {
            tracing::error!(
                outstanding = self.handles.len(),
                "WorkerPool dropped with outstanding workers; joining"
            );
            for h in self.handles.drain(..) {
                let _ = h.join();
            }
        }
    }
}
