// crates/af_core/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `AfError` 枚举和 `AfResult` 类型别名。错误分为两类：
//!
//! - **致命错误**: 工作线程创建/汇合失败、主检查点文件失败、配置错误。
//!   这类错误无法局部恢复（不完整的线程池意味着分区覆盖被破坏），
//!   调用方应协调整个分布式运行的终止，并使用 [`AfError::exit_code`]
//!   返回的进程退出码。
//! - **可恢复错误**: 集合式检查点路径上的单进程 IO 错误，由 `af_io`
//!   以状态形式捕获上报，不经过本类型（见 `af_io::IoError`）。

use std::path::PathBuf;
use thiserror::Error;

/// 统一结果类型
pub type AfResult<T> = Result<T, AfError>;

/// AstroFlow 错误类型
///
/// 核心致命错误类型。集合式 IO 的可恢复错误在 `af_io` 中单独定义。
#[derive(Error, Debug)]
pub enum AfError {
    /// 工作线程创建/分配失败（致命：部分线程池无法保证分区覆盖）
    #[error("工作线程创建失败: {what} - {reason}")]
    Setup {
        /// 失败的操作
        what: String,
        /// 失败原因
        reason: String,
    },

    /// 工作线程汇合失败（致命：未汇合的线程可能仍在修改共享状态）
    #[error("工作线程汇合失败: worker {worker} - {reason}")]
    Join {
        /// 线程标识
        worker: usize,
        /// 失败原因
        reason: String,
    },

    /// 主检查点文件失败（致命：缺失的检查点破坏重启保证）
    #[error("检查点文件错误: {path}")]
    File {
        /// 出错的文件路径
        path: PathBuf,
        #[source]
        /// 底层 IO 错误
        source: std::io::Error,
    },

    /// 组件未找到（致命：后续操作没有有效目标）
    #[error("组件未找到: {name}")]
    ComponentNotFound {
        /// 请求的组件名
        name: String,
    },

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 描述信息
        message: String,
    },

    /// 一般 IO 错误
    #[error("IO 错误: {message}")]
    Io {
        /// 描述信息
        message: String,
        #[source]
        /// 可选的底层 IO 错误
        source: Option<std::io::Error>,
    },
}

impl AfError {
    /// 构造配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 构造 IO 错误
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 是否为致命错误（需要协调终止整个分布式运行）
    ///
    /// 本类型的所有变体都是致命的；可恢复的集合式 IO 错误不会
    /// 构造成 `AfError`。保留此方法以表达分类语义。
    pub fn is_fatal(&self) -> bool {
        true
    }

    /// 映射到进程退出码
    ///
    /// 与历史约定保持一致：线程创建 19，线程汇合 20，检查点文件 33。
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Setup { .. } => 19,
            Self::Join { .. } => 20,
            Self::File { .. } => 33,
            Self::ComponentNotFound { .. } | Self::Config { .. } => 34,
            Self::Io { .. } => 35,
        }
    }
}
