// crates/af_runtime/src/multistep.rs

//! 多步积分调度
//!
//! 多步积分把粒子按整数层级分组：层级越深，更新频率越高。
//! 本模块维护进程级的调度状态（当前粗步、当前细分步），并提供
//! 两个纯判定：
//!
//! - 某粒子是否参与当前漂移调用（[`MultistepState::advances`]）
//! - 当前调用是否为粗步的最后一个细分步，需要折算质心簿记
//!   （[`MultistepState::folds_com`]）
//!
//! 状态除两个计数器外没有任何隐藏历史，可以仅凭
//! (粗步序号, 细分步计数) 重建，因此检查点不需要序列化调度器内部。

use serde::{Deserialize, Serialize};

/// 本次调用允许推进的层级
///
/// `All` 是哨兵值（历史实现中的 `mlevel < 0`），表示所有层级都推进。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveLevel {
    /// 所有层级都推进
    All,
    /// 仅该层级推进
    Level(u32),
}

/// 多步调度状态
///
/// 唯一合法的更新点是每个粗步开始时的 [`begin_step`]
/// 和每个细分步之后的 [`advance_substep`]。
///
/// [`begin_step`]: MultistepState::begin_step
/// [`advance_substep`]: MultistepState::advance_substep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultistepState {
    /// 多步积分是否启用
    pub enabled: bool,
    /// 最深层级（启用时 >= 1）
    pub deepest: u32,
    /// 当前粗步序号
    pub step: u64,
    /// 当前粗步内的细分步计数
    pub mstep: u32,
    /// 每个粗步的细分步总数
    pub total_substeps: u32,
}

impl MultistepState {
    /// 从配置构建：`multistep` 为 0 表示关闭，否则为最深层级
    ///
    /// 细分步总数为 `2^multistep`（最深层级每粗步更新 2^deepest 次）。
    /// 配置校验把 `multistep` 限制在 31 以内；超出时细分步数按
    /// `u32::MAX` 饱和，不会发生移位溢出。
    pub fn new(multistep: u32) -> Self {
        Self {
            enabled: multistep > 0,
            deepest: multistep,
            step: 0,
            mstep: 0,
            total_substeps: 1u32.checked_shl(multistep).unwrap_or(u32::MAX),
        }
    }

    /// 进入下一个粗步，细分步计数归零
    pub fn begin_step(&mut self, step: u64) {
        self.step = step;
        self.mstep = 0;
    }

    /// 完成一个细分步
    pub fn advance_substep(&mut self) {
        if self.mstep < self.total_substeps {
            self.mstep += 1;
        }
    }

    /// 粒子参与判定
    ///
    /// 粒子在本次漂移调用中推进，当且仅当多步关闭、或活动层级为
    /// 哨兵 `All`、或粒子自身层级等于活动层级。
    pub fn advances(&self, active: ActiveLevel, particle_level: u32) -> bool {
        if !self.enabled {
            return true;
        }
        match active {
            ActiveLevel::All => true,
            ActiveLevel::Level(level) => particle_level == level,
        }
    }

    /// 质心簿记折算判定
    ///
    /// 多步关闭时每步都折算；启用时仅在粗步的最后一个细分步、
    /// 且活动层级为最深层级时折算一次。
    pub fn folds_com(&self, active: ActiveLevel) -> bool {
        if !self.enabled {
            return true;
        }
        self.mstep == self.total_substeps && active == ActiveLevel::Level(self.deepest)
    }
}
