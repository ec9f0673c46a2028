// crates/af_core/src/config.rs

//! 运行配置
//!
//! 把历史实现中散落的全局可变状态（runtag、输出目录、线程数、
//! 进程身份、多步参数）收敛为一个启动时构建、之后只读的配置对象，
//! 以引用传递给各层组件。
//!
//! 唯一在运行中真正变化的计数器（粗步序号、活动层级）不在这里，
//! 它们属于 `af_runtime::multistep::MultistepState`。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AfError, AfResult};
use crate::precision::Precision;

/// 运行配置（启动时构建一次，之后不可变）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// 运行标签，参与所有输出文件名
    #[serde(default = "default_runtag")]
    pub runtag: String,

    /// 输出目录
    #[serde(default = "default_outdir")]
    pub outdir: PathBuf,

    /// 每进程工作线程数
    #[serde(default = "default_nthreads")]
    pub nthreads: usize,

    /// 本进程在分布式运行中的序号
    #[serde(default)]
    pub rank: usize,

    /// 参与运行的进程总数
    #[serde(default = "default_nprocs")]
    pub nprocs: usize,

    /// 多步积分的最深层级（0 = 关闭多步）
    #[serde(default)]
    pub multistep: u32,

    /// 全局运动开关：关闭后漂移积分为显式空操作
    #[serde(default = "default_eqmotion")]
    pub eqmotion: bool,

    /// 检查点配置
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

fn default_runtag() -> String {
    "newrun".to_string()
}
fn default_outdir() -> PathBuf {
    PathBuf::from(".")
}
fn default_nthreads() -> usize {
    2
}
fn default_nprocs() -> usize {
    1
}
fn default_eqmotion() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            runtag: default_runtag(),
            outdir: default_outdir(),
            nthreads: default_nthreads(),
            rank: 0,
            nprocs: default_nprocs(),
            multistep: 0,
            eqmotion: default_eqmotion(),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

/// 检查点配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// 两次 dump 之间的步数间隔
    #[serde(default = "default_nint")]
    pub nint: u64,

    /// 编号 dump 的起始序号（重启时可由探测覆盖）
    #[serde(default)]
    pub nbeg: u32,

    /// 浮点存储精度（对应 real4 开关）
    #[serde(default)]
    pub precision: Precision,

    /// 集合式 IO 后端的聚合器数量提示
    #[serde(default = "default_nagg")]
    pub nagg: u32,

    /// 是否记录每次 dump 的耗时
    #[serde(default)]
    pub timer: bool,
}

fn default_nint() -> u64 {
    100
}
fn default_nagg() -> u32 {
    1
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            nint: default_nint(),
            nbeg: 0,
            precision: Precision::default(),
            nagg: default_nagg(),
            timer: false,
        }
    }
}

impl RunConfig {
    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> AfResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AfError::io(format!("读取配置文件失败: {}", path.display()), e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| AfError::config(format!("解析配置失败: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 保存为 JSON 文件
    pub fn save(&self, path: &Path) -> AfResult<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| AfError::config(format!("序列化配置失败: {e}")))?;
        std::fs::write(path, text)
            .map_err(|e| AfError::io(format!("写入配置文件失败: {}", path.display()), e))?;
        Ok(())
    }

    /// 校验配置一致性
    pub fn validate(&self) -> AfResult<()> {
        if self.nthreads == 0 {
            return Err(AfError::config("nthreads 必须 >= 1"));
        }
        if self.nprocs == 0 {
            return Err(AfError::config("nprocs 必须 >= 1"));
        }
        if self.rank >= self.nprocs {
            return Err(AfError::config(format!(
                "rank {} 超出进程数 {}",
                self.rank, self.nprocs
            )));
        }
        if self.multistep >= 32 {
            return Err(AfError::config(format!(
                "multistep {} 超出上限 31（细分步数为 2^multistep）",
                self.multistep
            )));
        }
        if self.checkpoint.nint == 0 {
            return Err(AfError::config("checkpoint.nint 必须 >= 1"));
        }
        if self.runtag.is_empty() {
            return Err(AfError::config("runtag 不能为空"));
        }
        Ok(())
    }
}
