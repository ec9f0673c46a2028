// crates/af_core/src/precision.rs

//! 检查点输出精度选择
//!
//! 提供 `Precision` 枚举，在不引入泛型参数的前提下选择粒子记录中
//! 浮点字段的存储宽度。头部字段（时间、计数）永远使用全宽存储，
//! 不受此选项影响。

use serde::{Deserialize, Serialize};

/// 浮点存储精度
///
/// 对应历史上的 `real4` 开关：`Single` 在写出时把 f64 收窄为 f32，
/// 适用于超大规模 dump（文件尺寸减半）；`Double` 保证位级往返。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 单精度浮点 (f32)，写出时有损收窄
    Single,
    /// 双精度浮点 (f64)，默认，位级精确往返
    #[default]
    Double,
}

impl Precision {
    /// 每个浮点字段占用的字节数
    pub fn real_size(&self) -> usize {
        match self {
            Self::Single => 4,
            Self::Double => 8,
        }
    }

    /// 精度名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Single => "f32",
            Self::Double => "f64",
        }
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
