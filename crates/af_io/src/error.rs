// crates/af_io/src/error.rs

//! IO 错误类型定义
//!
//! 区分两条传播路径：
//!
//! - 串行主进程路径：任何 `IoError` 都转成致命的
//!   `AfError::File`（重启完整性依赖主检查点）；
//! - 集合式路径：`IoError` 以状态形式逐次捕获、带上下文记录日志，
//!   运行继续，只是该次 dump 不会被提升为"最近检查点"。

use std::path::{Path, PathBuf};
use thiserror::Error;

/// IO 模块结果类型别名
pub type IoResult<T> = Result<T, IoError>;

/// IO 错误枚举
#[derive(Error, Debug)]
pub enum IoError {
    /// 文件打开失败
    #[error("打开文件失败: {path}")]
    Open {
        /// 文件路径
        path: PathBuf,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },

    /// 偏移寻址写入失败
    #[error("偏移写入失败: {path} @ {offset}")]
    WriteAt {
        /// 文件路径
        path: PathBuf,
        /// 目标字节偏移
        offset: u64,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },

    /// 读取失败
    #[error("读取失败: {path}")]
    Read {
        /// 文件路径
        path: PathBuf,
        /// 底层 IO 错误
        #[source]
        source: std::io::Error,
    },

    /// 记录布局错误（写侧）
    #[error("记录格式错误: {message}")]
    Format {
        /// 描述信息
        message: String,
    },

    /// 检查点损坏（读侧）
    #[error("检查点损坏: {path}, 原因: {reason}")]
    Corrupt {
        /// 文件路径
        path: PathBuf,
        /// 原因
        reason: String,
    },

    /// 文件在预期数据之前结束
    #[error("文件不完整: {path}")]
    Truncated {
        /// 文件路径
        path: PathBuf,
    },
}

impl IoError {
    /// 包装一次读取失败，把提前到达的 EOF 区分为 `Truncated`
    pub fn read(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::UnexpectedEof {
            IoError::Truncated {
                path: path.to_path_buf(),
            }
        } else {
            IoError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

impl From<IoError> for std::io::Error {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Open { source, .. }
            | IoError::WriteAt { source, .. }
            | IoError::Read { source, .. } => source,
            short @ IoError::Truncated { .. } => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, short.to_string())
            }
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = IoError::WriteAt {
            path: PathBuf::from("OUTS.run.00003"),
            offset: 1234,
            source: std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
        };
        let text = err.to_string();
        assert!(text.contains("00003"));
        assert!(text.contains("1234"));
    }

    #[test]
    fn test_read_classifies_early_eof_as_truncated() {
        let path = Path::new("OUT.run.chkpt");
        let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert!(matches!(IoError::read(path, eof), IoError::Truncated { .. }));

        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(IoError::read(path, denied), IoError::Read { .. }));
    }
}
