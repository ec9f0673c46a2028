// crates/af_runtime/src/partition.rs

//! 粒子区间分区
//!
//! 把长度为 `total` 的粒子索引空间按线程数 `size` 切分为连续、
//! 互不重叠、恰好覆盖一次的半开区间。切分只依赖 `(total, size)`，
//! 对相同输入永远给出相同结果：漂移和检查点两个操作据此独立推断
//! "同一粒子不会被两个线程同时触碰"，无需任何锁。
//!
//! # 边界情况
//!
//! - `total < size`: 高序号线程得到空区间，按空操作处理
//! - `total == 0`: 所有区间为空

use std::ops::Range;

/// 线程 `id` 负责的半开区间 `[total*id/size, total*(id+1)/size)`
///
/// 使用 u64 扩宽做乘法，避免 `total * id` 在 32 位目标上溢出。
///
/// # Panics
///
/// `size == 0` 或 `id >= size` 是调用方的逻辑错误，debug 构建下断言。
pub fn range(total: usize, size: usize, id: usize) -> Range<usize> {
    debug_assert!(size > 0, "partition size must be >= 1");
    debug_assert!(id < size, "worker id out of range");

    let t = total as u64;
    let n = size as u64;
    let beg = (t * id as u64 / n) as usize;
    let end = (t * (id as u64 + 1) / n) as usize;
    beg..end
}

/// 把可变切片按 [`range`] 的区间切成 `size` 段互不重叠的可变子切片
///
/// 返回向量的第 `id` 项正是线程 `id` 的独占区间，空区间对应空切片。
/// 这是无锁并行修改粒子的安全接缝：借用检查器保证各段不重叠。
pub fn split_mut<T>(data: &mut [T], size: usize) -> Vec<&mut [T]> {
    let total = data.len();
    let mut out = Vec::with_capacity(size);
    let mut rest = data;
    let mut consumed = 0;

    for id in 0..size {
        let r = range(total, size, id);
        let (head, tail) = rest.split_at_mut(r.end - consumed);
        out.push(head);
        rest = tail;
        consumed = r.end;
    }
    out
}
