// crates/af_io/src/format.rs

//! 检查点二进制布局
//!
//! 位级精确、小端、无填充。写方和任何外部读方必须匹配完全相同的
//! 结构布局（没有版本字段）。
//!
//! # 文件格式
//!
//! ```text
//! [MasterHeader: 20 bytes]  time f64 | ntot u64 | ncomp u32
//! 每组件一个块:
//!   [ComponentHeader: 80 bytes]  name [u8;64] NUL 填充 | nbod u64 | niatr u32 | ndatr u32
//!   [粒子记录 × nbod]  index u64 | level u32 | pos ×3 | vel ×3 | dattrib ×ndatr | iattrib ×niatr
//! ```
//!
//! 浮点字段宽度由 [`Precision`] 决定（4 或 8 字节）；`index`/`level`
//! 与各种计数永远是定宽整数。块大小只由组件自身的元数据决定
//! （[`component_block_size`]），从不靠事后测量——集合式写出靠
//! 这一点在无通信的前提下预先算出全部偏移。

use std::io::Read;
use std::path::Path;

use glam::DVec3;

use af_core::Precision;
use af_engine::{Component, Particle};

use crate::error::{IoError, IoResult};

/// 组件名字段的定长字节数（含 NUL 填充）
pub const COMPONENT_NAME_LEN: usize = 64;

// ============================================================
// 主头部
// ============================================================

/// 每个检查点开头写一次的定长头部
///
/// 读方必须能在读任何组件块之前，仅凭此头部推出组件块的个数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasterHeader {
    /// 模拟时间
    pub time: f64,
    /// 跨所有组件、所有进程的粒子总数
    pub ntot: u64,
    /// 组件个数
    pub ncomp: u32,
}

impl MasterHeader {
    /// 头部的磁盘字节数
    pub const SIZE: usize = 8 + 8 + 4;

    /// 编码为小端字节串
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(&self.time.to_le_bytes());
        buf[8..16].copy_from_slice(&self.ntot.to_le_bytes());
        buf[16..20].copy_from_slice(&self.ncomp.to_le_bytes());
        buf
    }

    /// 从小端字节串解码
    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            time: f64::from_le_bytes(buf[0..8].try_into().expect("fixed slice")),
            ntot: u64::from_le_bytes(buf[8..16].try_into().expect("fixed slice")),
            ncomp: u32::from_le_bytes(buf[16..20].try_into().expect("fixed slice")),
        }
    }

    /// 从读取器读入一个头部
    pub fn read_from<R: Read>(reader: &mut R, path: &Path) -> IoResult<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact(&mut buf).map_err(|e| IoError::read(path, e))?;
        Ok(Self::from_bytes(&buf))
    }
}

// ============================================================
// 组件头部
// ============================================================

/// 每组件块开头的定长头部
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentHeader {
    /// 组件名（写出时 NUL 填充到 [`COMPONENT_NAME_LEN`]）
    pub name: String,
    /// 跨所有进程的粒子总数
    pub nbod: u64,
    /// 每粒子整型属性个数
    pub niatr: u32,
    /// 每粒子浮点属性个数
    pub ndatr: u32,
}

impl ComponentHeader {
    /// 头部的磁盘字节数
    pub const SIZE: usize = COMPONENT_NAME_LEN + 8 + 4 + 4;

    /// 从组件元数据构造
    pub fn from_component(comp: &Component) -> Self {
        Self {
            name: comp.name.clone(),
            nbod: comp.nbodies_tot,
            niatr: comp.niattrib,
            ndatr: comp.ndattrib,
        }
    }

    /// 编码为小端字节串；组件名超长是格式错误
    pub fn to_bytes(&self) -> IoResult<[u8; Self::SIZE]> {
        let name = self.name.as_bytes();
        if name.len() >= COMPONENT_NAME_LEN {
            return Err(IoError::Format {
                message: format!(
                    "组件名超过 {} 字节: {}",
                    COMPONENT_NAME_LEN - 1,
                    self.name
                ),
            });
        }
        let mut buf = [0u8; Self::SIZE];
        buf[..name.len()].copy_from_slice(name);
        buf[64..72].copy_from_slice(&self.nbod.to_le_bytes());
        buf[72..76].copy_from_slice(&self.niatr.to_le_bytes());
        buf[76..80].copy_from_slice(&self.ndatr.to_le_bytes());
        Ok(buf)
    }

    /// 从小端字节串解码
    pub fn from_bytes(buf: &[u8; Self::SIZE], path: &Path) -> IoResult<Self> {
        let name_end = buf[..COMPONENT_NAME_LEN]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(COMPONENT_NAME_LEN);
        let name = std::str::from_utf8(&buf[..name_end])
            .map_err(|_| IoError::Corrupt {
                path: path.to_path_buf(),
                reason: "组件名不是合法 UTF-8".to_string(),
            })?
            .to_string();
        Ok(Self {
            name,
            nbod: u64::from_le_bytes(buf[64..72].try_into().expect("fixed slice")),
            niatr: u32::from_le_bytes(buf[72..76].try_into().expect("fixed slice")),
            ndatr: u32::from_le_bytes(buf[76..80].try_into().expect("fixed slice")),
        })
    }

    /// 从读取器读入一个组件头部
    pub fn read_from<R: Read>(reader: &mut R, path: &Path) -> IoResult<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact(&mut buf).map_err(|e| IoError::read(path, e))?;
        Self::from_bytes(&buf, path)
    }

    /// 该组件块（头部 + 全部粒子记录）的字节数
    pub fn block_size(&self, precision: Precision) -> u64 {
        component_block_size(self.nbod, self.niatr, self.ndatr, precision)
    }
}

// ============================================================
// 粒子记录
// ============================================================

/// 单条粒子记录的字节数
pub fn particle_record_size(precision: Precision, niatr: u32, ndatr: u32) -> usize {
    8 + 4 + (6 + ndatr as usize) * precision.real_size() + niatr as usize * 4
}

/// 组件块（头部 + nbod 条记录）的字节数，仅由元数据决定
pub fn component_block_size(nbod: u64, niatr: u32, ndatr: u32, precision: Precision) -> u64 {
    ComponentHeader::SIZE as u64 + nbod * particle_record_size(precision, niatr, ndatr) as u64
}

fn push_real(out: &mut Vec<u8>, value: f64, precision: Precision) {
    match precision {
        Precision::Single => out.extend_from_slice(&(value as f32).to_le_bytes()),
        Precision::Double => out.extend_from_slice(&value.to_le_bytes()),
    }
}

/// 把一个粒子编码追加到缓冲区
pub fn encode_particle(p: &Particle, precision: Precision, out: &mut Vec<u8>) {
    out.extend_from_slice(&p.index.to_le_bytes());
    out.extend_from_slice(&p.level.to_le_bytes());
    for k in 0..3 {
        push_real(out, p.pos[k], precision);
    }
    for k in 0..3 {
        push_real(out, p.vel[k], precision);
    }
    for &v in &p.dattrib {
        push_real(out, v, precision);
    }
    for &v in &p.iattrib {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// 解码游标：跟踪缓冲区内的读位置
struct Cursor<'a> {
    buf: &'a [u8],
    at: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> IoResult<&'a [u8]> {
        if self.at + n > self.buf.len() {
            return Err(IoError::Format {
                message: "粒子记录被截断".to_string(),
            });
        }
        let out = &self.buf[self.at..self.at + n];
        self.at += n;
        Ok(out)
    }

    fn real(&mut self, precision: Precision) -> IoResult<f64> {
        match precision {
            Precision::Single => Ok(f32::from_le_bytes(
                self.take(4)?.try_into().expect("fixed slice"),
            ) as f64),
            Precision::Double => Ok(f64::from_le_bytes(
                self.take(8)?.try_into().expect("fixed slice"),
            )),
        }
    }
}

/// 从缓冲区解码一个粒子
///
/// `Double` 精度下与写入位级一致；`Single` 下做无损加宽（写入
/// 本身有损）。
pub fn decode_particle(
    buf: &[u8],
    niatr: u32,
    ndatr: u32,
    precision: Precision,
) -> IoResult<Particle> {
    let mut cur = Cursor { buf, at: 0 };

    let index = u64::from_le_bytes(cur.take(8)?.try_into().expect("fixed slice"));
    let level = u32::from_le_bytes(cur.take(4)?.try_into().expect("fixed slice"));

    let mut pos = DVec3::ZERO;
    for k in 0..3 {
        pos[k] = cur.real(precision)?;
    }
    let mut vel = DVec3::ZERO;
    for k in 0..3 {
        vel[k] = cur.real(precision)?;
    }

    let mut dattrib = Vec::with_capacity(ndatr as usize);
    for _ in 0..ndatr {
        dattrib.push(cur.real(precision)?);
    }
    let mut iattrib = Vec::with_capacity(niatr as usize);
    for _ in 0..niatr {
        iattrib.push(i32::from_le_bytes(cur.take(4)?.try_into().expect("fixed slice")));
    }

    Ok(Particle {
        index,
        level,
        pos,
        vel,
        iattrib,
        dattrib,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_sizes() {
        assert_eq!(MasterHeader::SIZE, 20);
        assert_eq!(ComponentHeader::SIZE, 80);
    }

    #[test]
    fn test_master_header_roundtrip() {
        let h = MasterHeader {
            time: 3.25,
            ntot: 1_000_000,
            ncomp: 3,
        };
        assert_eq!(MasterHeader::from_bytes(&h.to_bytes()), h);
    }

    #[test]
    fn test_component_header_roundtrip() {
        let h = ComponentHeader {
            name: "dark halo".to_string(),
            nbod: 4096,
            niatr: 1,
            ndatr: 2,
        };
        let bytes = h.to_bytes().unwrap();
        let back = ComponentHeader::from_bytes(&bytes, Path::new("x")).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn test_component_name_too_long() {
        let h = ComponentHeader {
            name: "x".repeat(COMPONENT_NAME_LEN),
            nbod: 0,
            niatr: 0,
            ndatr: 0,
        };
        assert!(matches!(h.to_bytes(), Err(IoError::Format { .. })));
    }

    #[test]
    fn test_record_sizes() {
        // index(8) + level(4) + 6 real + ndatr real + niatr i32
        assert_eq!(particle_record_size(Precision::Double, 0, 0), 60);
        assert_eq!(particle_record_size(Precision::Single, 0, 0), 36);
        assert_eq!(particle_record_size(Precision::Double, 2, 3), 92);
        assert_eq!(
            component_block_size(10, 0, 0, Precision::Double),
            80 + 600
        );
    }

    #[test]
    fn test_particle_roundtrip_double_bitexact() {
        let p = Particle {
            index: 42,
            level: 3,
            pos: DVec3::new(0.1, -2.5, 1e-17),
            vel: DVec3::new(-1.0, 3.5, f64::MIN_POSITIVE),
            iattrib: vec![-7, 9],
            dattrib: vec![std::f64::consts::PI],
        };
        let mut buf = Vec::new();
        encode_particle(&p, Precision::Double, &mut buf);
        assert_eq!(buf.len(), particle_record_size(Precision::Double, 2, 1));

        let back = decode_particle(&buf, 2, 1, Precision::Double).unwrap();
        assert_eq!(back, p);
        assert_eq!(back.pos[2].to_bits(), p.pos[2].to_bits());
    }

    #[test]
    fn test_particle_single_narrows() {
        let p = Particle::new(1, DVec3::new(0.5, 0.25, -0.125), DVec3::ZERO);
        let mut buf = Vec::new();
        encode_particle(&p, Precision::Single, &mut buf);
        let back = decode_particle(&buf, 0, 0, Precision::Single).unwrap();
        // 二进制可精确表示的值经 f32 往返不变
        assert_eq!(back.pos, p.pos);
    }

    #[test]
    fn test_truncated_record_rejected() {
        let p = Particle::new(1, DVec3::ONE, DVec3::ONE);
        let mut buf = Vec::new();
        encode_particle(&p, Precision::Double, &mut buf);
        buf.truncate(buf.len() - 1);
        assert!(decode_particle(&buf, 0, 0, Precision::Double).is_err());
    }
}
