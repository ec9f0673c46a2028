// crates/af_engine/src/component.rs

//! 粒子组件与组件集合
//!
//! `Component` 是共享维度和参考系的有序粒子集合，携带跨进程的
//! 聚合计数与质心簿记；`ComponentSet` 是有序的组件集合，迭代序
//! 在整个运行以及检查点写入/恢复之间保持稳定——二进制记录的
//! 位置正确性依赖这一点。
//!
//! # 分布式所有权
//!
//! 每个进程只持有组件的一段粒子（`particles`），但所有进程都知道
//! 完整的逐进程计数表（`rank_counts`）。集合式检查点据此在不通信
//! 的情况下算出每个进程的写入偏移。

use glam::DVec3;

use af_core::{AfError, AfResult};

use crate::particle::Particle;

// ============================================================
// 组件
// ============================================================

/// 粒子组件
#[derive(Debug, Clone)]
pub struct Component {
    /// 组件名（二进制块中以定长字段存储）
    pub name: String,
    /// 每粒子整型属性个数
    pub niattrib: u32,
    /// 每粒子浮点属性个数
    pub ndattrib: u32,
    /// 本进程持有的粒子
    pub particles: Vec<Particle>,
    /// 跨所有进程的粒子总数
    pub nbodies_tot: u64,
    /// 按进程序号排列的本地粒子计数表
    pub rank_counts: Vec<u64>,
    /// 是否工作在随质心运动的参考系
    pub com_system: bool,
    /// 质心位置偏移
    pub com0: DVec3,
    /// 质心速度偏移（粗步末折算进 `com0`）
    pub cov0: DVec3,
    /// 漂移时从粒子速度中扣除的质心速度偏移
    pub cov_i: DVec3,
}

impl Component {
    /// 创建空组件
    pub fn new(name: impl Into<String>, niattrib: u32, ndattrib: u32) -> Self {
        Self {
            name: name.into(),
            niattrib,
            ndattrib,
            particles: Vec::new(),
            nbodies_tot: 0,
            rank_counts: vec![0],
            com_system: false,
            com0: DVec3::ZERO,
            cov0: DVec3::ZERO,
            cov_i: DVec3::ZERO,
        }
    }

    /// 单进程运行的便捷构造：计数表只有一项
    pub fn from_particles(
        name: impl Into<String>,
        niattrib: u32,
        ndattrib: u32,
        particles: Vec<Particle>,
    ) -> Self {
        let n = particles.len() as u64;
        Self {
            name: name.into(),
            niattrib,
            ndattrib,
            particles,
            nbodies_tot: n,
            rank_counts: vec![n],
            com_system: false,
            com0: DVec3::ZERO,
            cov0: DVec3::ZERO,
            cov_i: DVec3::ZERO,
        }
    }

    /// 启用质心参考系
    pub fn with_com_system(mut self, cov0: DVec3, cov_i: DVec3) -> Self {
        self.com_system = true;
        self.cov0 = cov0;
        self.cov_i = cov_i;
        self
    }

    /// 本进程持有的粒子数
    pub fn nbodies(&self) -> usize {
        self.particles.len()
    }

    /// 序号在 `rank` 之前的进程共持有多少粒子
    ///
    /// 即该进程的粒子记录在组件块内的记录偏移。只依赖所有进程
    /// 共同已知的计数表，不需要任何运行时通信。
    pub fn rank_offset(&self, rank: usize) -> u64 {
        self.rank_counts.iter().take(rank).sum()
    }

    /// 校验不变量
    ///
    /// - 计数表之和等于跨进程总数
    /// - 每个粒子的属性个数与组件声明一致
    pub fn validate(&self) -> AfResult<()> {
        let sum: u64 = self.rank_counts.iter().sum();
        if sum != self.nbodies_tot {
            return Err(AfError::config(format!(
                "组件 {} 计数表之和 {} != 总数 {}",
                self.name, sum, self.nbodies_tot
            )));
        }
        for p in &self.particles {
            if p.iattrib.len() != self.niattrib as usize
                || p.dattrib.len() != self.ndattrib as usize
            {
                return Err(AfError::config(format!(
                    "组件 {} 粒子 {} 属性个数与声明不符",
                    self.name, p.index
                )));
            }
        }
        Ok(())
    }
}

// ============================================================
// 组件集合
// ============================================================

/// 有序组件集合
///
/// 迭代序即插入序，全运行稳定。
#[derive(Debug, Clone, Default)]
pub struct ComponentSet {
    /// 组件列表
    pub components: Vec<Component>,
}

impl ComponentSet {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加组件
    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    /// 跨所有进程的粒子总数
    pub fn ntot(&self) -> u64 {
        self.components.iter().map(|c| c.nbodies_tot).sum()
    }

    /// 组件个数
    pub fn ncomp(&self) -> u32 {
        self.components.len() as u32
    }

    /// 按名称查找组件
    pub fn get(&self, name: &str) -> AfResult<&Component> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| AfError::ComponentNotFound {
                name: name.to_string(),
            })
    }

    /// 按名称查找组件（可变）
    pub fn get_mut(&mut self, name: &str) -> AfResult<&mut Component> {
        self.components
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| AfError::ComponentNotFound {
                name: name.to_string(),
            })
    }

    /// 校验所有组件的不变量
    pub fn validate(&self) -> AfResult<()> {
        for c in &self.components {
            c.validate()?;
        }
        Ok(())
    }
}
