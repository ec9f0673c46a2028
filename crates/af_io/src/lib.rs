// crates/af_io/src/lib.rs

//! AstroFlow IO Layer (Layer 4)
//!
//! 崩溃容错的全局状态持久化。
//!
//! # 模块概览
//!
//! - [`format`]: 位级精确的检查点二进制布局
//! - [`checkpoint`]: 串行主进程写出（原子备份轮换 + 仅链接快路径）与读取
//! - [`collective`]: 集合式并行写出（偏移寻址共享文件）
//! - [`offset`]: 偏移寻址写入原语
//! - [`error`]: IO 错误类型
//!
//! # 两种写出变体
//!
//! 串行变体由一个权威进程写整个文件，错误致命；集合式变体让每个
//! 进程只写自己的记录区间，错误按次捕获上报、运行继续。两者产出
//! 同一种文件布局，读方不需要区分来源。

#![warn(missing_docs)]

pub mod checkpoint;
pub mod collective;
pub mod error;
pub mod format;
pub mod offset;

/// 层级标识
pub const LAYER: u8 = 4;

pub use checkpoint::{read_checkpoint, read_header, read_summary, CheckpointWriter};
pub use collective::{CollectiveWriter, DumpOutcome, LastDump};
pub use error::{IoError, IoResult};
pub use format::{ComponentHeader, MasterHeader};
