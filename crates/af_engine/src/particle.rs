// crates/af_engine/src/particle.rs

//! 粒子数据结构

use glam::DVec3;

/// 单个粒子
///
/// `index` 是全运行稳定的唯一身份，跨检查点写入/恢复不变。
/// 一个粒子属于恰好一个组件；在一次并行调用中只被其分区所属的
/// 工作线程修改，永远不会被两个线程并发触碰。
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// 全运行唯一索引
    pub index: u64,
    /// 多步积分层级（选择该粒子相对粗步的更新频率）
    pub level: u32,
    /// 位置
    pub pos: DVec3,
    /// 速度
    pub vel: DVec3,
    /// 每粒子整型属性
    pub iattrib: Vec<i32>,
    /// 每粒子浮点属性
    pub dattrib: Vec<f64>,
}

impl Particle {
    /// 创建无附加属性的粒子
    pub fn new(index: u64, pos: DVec3, vel: DVec3) -> Self {
        Self {
            index,
            level: 0,
            pos,
            vel,
            iattrib: Vec::new(),
            dattrib: Vec::new(),
        }
    }

    /// 设置多步层级
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// 设置附加属性
    pub fn with_attribs(mut self, iattrib: Vec<i32>, dattrib: Vec<f64>) -> Self {
        self.iattrib = iattrib;
        self.dattrib = dattrib;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let p = Particle::new(7, DVec3::ZERO, DVec3::X)
            .with_level(2)
            .with_attribs(vec![1], vec![0.5, 1.5]);
        assert_eq!(p.index, 7);
        assert_eq!(p.level, 2);
        assert_eq!(p.iattrib.len(), 1);
        assert_eq!(p.dattrib.len(), 2);
    }
}
