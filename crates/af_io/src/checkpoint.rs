// crates/af_io/src/checkpoint.rs

//! 串行主进程检查点
//!
//! 由一个权威进程写出完整的自描述二进制快照，并保证检查点替换
//! 对任何外部读方是崩溃原子的：任意可观测时刻，规范文件和它的
//! `.bak` 前身至少有一个是完整、可独立读取的快照。
//!
//! # 替换协议
//!
//! 1. 若目标步恰是最近一次成功的集合式 dump 覆盖的步，则走
//!    **仅链接快路径**：删除旧 `.bak`、把规范文件转为 `.bak`、
//!    再把规范文件名符号链接到那次 dump——数据已经持久化，
//!    不再重复序列化；
//! 2. 否则把现有规范文件改名为 `.bak`（尽力而为，失败只记日志），
//!    重新创建规范文件，写一个主头部，再按集合的稳定迭代序写出
//!    每个组件块。
//!
//! 规范文件上的写错误是致命的（静默缺失的检查点会摧毁重启保证）。

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use af_core::{AfError, AfResult, Precision, RunConfig};
use af_engine::{Component, ComponentSet};

use crate::collective::LastDump;
use crate::error::{IoError, IoResult};
use crate::format::{
    particle_record_size, ComponentHeader, MasterHeader, decode_particle, encode_particle,
};

/// 规范检查点文件名前缀
pub const CHECKPOINT_PREFIX: &str = "OUT";

/// 规范检查点文件名后缀
pub const CHECKPOINT_SUFFIX: &str = "chkpt";

/// 规范检查点路径 `<outdir>/OUT.<runtag>.chkpt`
pub fn checkpoint_path(outdir: &Path, runtag: &str) -> PathBuf {
    outdir.join(format!("{CHECKPOINT_PREFIX}.{runtag}.{CHECKPOINT_SUFFIX}"))
}

fn backup_path(canonical: &Path) -> PathBuf {
    let mut os = canonical.as_os_str().to_os_string();
    os.push(".bak");
    PathBuf::from(os)
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

// ============================================================
// 串行写出
// ============================================================

/// 串行主进程检查点写出器
pub struct CheckpointWriter {
    canonical: PathBuf,
    nint: u64,
    precision: Precision,
}

impl CheckpointWriter {
    /// 从运行配置构建
    pub fn new(config: &RunConfig) -> Self {
        Self {
            canonical: checkpoint_path(&config.outdir, &config.runtag),
            nint: config.checkpoint.nint,
            precision: config.checkpoint.precision,
        }
    }

    /// 规范检查点路径
    pub fn canonical_path(&self) -> &Path {
        &self.canonical
    }

    /// 周期性入口：步数命中间隔或运行结束时写出
    ///
    /// `last_dump` 是最近一次**成功的**集合式 dump；若它恰好覆盖
    /// 当前步，则只做链接。返回本次是否实际写出/链接。
    pub fn run(
        &self,
        set: &ComponentSet,
        time: f64,
        step: u64,
        last: bool,
        last_dump: Option<&LastDump>,
    ) -> AfResult<bool> {
        if step % self.nint != 0 && !last {
            return Ok(false);
        }

        if let Some(dump) = last_dump {
            if dump.step == step {
                self.link_only(dump);
                return Ok(true);
            }
        }

        self.dump(set, time)?;
        Ok(true)
    }

    /// 仅链接快路径：复用已持久化的集合式 dump
    ///
    /// 每一步都是尽力而为：失败只记日志，不中断运行（数据本身
    /// 已经安全地躺在 dump 文件里）。
    fn link_only(&self, dump: &LastDump) {
        let bak = backup_path(&self.canonical);

        if let Err(e) = std::fs::remove_file(&bak) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("unlinking old backup {} failed: {e}", bak.display());
            }
        }
        if let Err(e) = std::fs::rename(&self.canonical, &bak) {
            tracing::warn!(
                "renaming {} to backup failed: {e}",
                self.canonical.display()
            );
        }
        if let Err(e) = symlink_file(&dump.path, &self.canonical) {
            tracing::error!(
                "symlinking {} -> {} failed: {e}",
                self.canonical.display(),
                dump.path.display()
            );
        } else {
            tracing::info!(
                "checkpoint linked to dump {:05} ({})",
                dump.index,
                dump.path.display()
            );
        }
    }

    /// 无条件写出一个完整快照（含备份轮换）
    pub fn dump(&self, set: &ComponentSet, time: f64) -> AfResult<()> {
        let bak = backup_path(&self.canonical);

        // 备份轮换尽力而为：失败记日志但不中止本次写出
        match std::fs::rename(&self.canonical, &bak) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    "creating backup {} failed: {e}",
                    bak.display()
                );
            }
        }

        let file = File::create(&self.canonical).map_err(|e| AfError::File {
            path: self.canonical.clone(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);

        write_snapshot(&mut writer, set, time, self.precision).map_err(|e| AfError::File {
            path: self.canonical.clone(),
            source: e.into(),
        })?;
        writer.flush().map_err(|e| AfError::File {
            path: self.canonical.clone(),
            source: e,
        })?;

        tracing::info!(
            "checkpoint written: {} (t={time}, ntot={})",
            self.canonical.display(),
            set.ntot()
        );
        Ok(())
    }
}

/// 把整个组件集合写成一个快照流
///
/// 主头部在前，然后按稳定迭代序写每个组件块。串行变体由持有全部
/// 粒子的权威进程调用：每个组件的本地粒子数必须等于跨进程总数。
pub fn write_snapshot<W: Write>(
    writer: &mut W,
    set: &ComponentSet,
    time: f64,
    precision: Precision,
) -> IoResult<()> {
    let header = MasterHeader {
        time,
        ntot: set.ntot(),
        ncomp: set.ncomp(),
    };
    writer
        .write_all(&header.to_bytes())
        .map_err(io_format("写主头部失败"))?;

    for comp in &set.components {
        if comp.nbodies() as u64 != comp.nbodies_tot {
            return Err(IoError::Format {
                message: format!(
                    "组件 {} 本地粒子数 {} != 总数 {}，串行写出要求权威进程持有全部粒子",
                    comp.name,
                    comp.nbodies(),
                    comp.nbodies_tot
                ),
            });
        }

        let chead = ComponentHeader::from_component(comp);
        writer
            .write_all(&chead.to_bytes()?)
            .map_err(io_format("写组件头部失败"))?;

        let record = particle_record_size(precision, comp.niattrib, comp.ndattrib);
        let mut buf = Vec::with_capacity(record);
        for p in &comp.particles {
            buf.clear();
            encode_particle(p, precision, &mut buf);
            writer.write_all(&buf).map_err(io_format("写粒子记录失败"))?;
        }
    }
    Ok(())
}

fn io_format(what: &'static str) -> impl Fn(std::io::Error) -> IoError {
    move |e| IoError::Format {
        message: format!("{what}: {e}"),
    }
}

// ============================================================
// 读取
// ============================================================

/// 只读主头部（不加载任何粒子）
pub fn read_header(path: &Path) -> IoResult<MasterHeader> {
    let file = File::open(path).map_err(|e| IoError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);
    MasterHeader::read_from(&mut reader, path)
}

/// 读主头部和全部组件头部，跳过粒子负载
pub fn read_summary(path: &Path, precision: Precision) -> IoResult<(MasterHeader, Vec<ComponentHeader>)> {
    let file = File::open(path).map_err(|e| IoError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);

    let header = MasterHeader::read_from(&mut reader, path)?;
    let mut components = Vec::with_capacity(header.ncomp as usize);
    for _ in 0..header.ncomp {
        let chead = ComponentHeader::read_from(&mut reader, path)?;
        // 头部声称的粒子数来自文件，先检查再用于寻址
        let payload = chead
            .nbod
            .checked_mul(particle_record_size(precision, chead.niatr, chead.ndatr) as u64)
            .and_then(|n| i64::try_from(n).ok())
            .ok_or_else(|| IoError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("组件 {} 声称的粒子数 {} 超出文件寻址范围", chead.name, chead.nbod),
            })?;
        reader
            .seek(SeekFrom::Current(payload))
            .map_err(|e| IoError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
        components.push(chead);
    }
    Ok((header, components))
}

/// 读回整个检查点，重建组件集合
///
/// 集合式 dump 与串行检查点共享同一布局，本函数对两者都适用。
/// `precision` 必须与写方一致（布局没有自描述字段）。
pub fn read_checkpoint(path: &Path, precision: Precision) -> IoResult<(f64, ComponentSet)> {
    let file = File::open(path).map_err(|e| IoError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file_len = file
        .metadata()
        .map_err(|e| IoError::Read {
            path: path.to_path_buf(),
            source: e,
        })?
        .len();
    let mut reader = BufReader::new(file);

    let header = MasterHeader::read_from(&mut reader, path)?;
    let mut set = ComponentSet::new();

    for _ in 0..header.ncomp {
        let chead = ComponentHeader::read_from(&mut reader, path)?;
        let record = particle_record_size(precision, chead.niatr, chead.ndatr);

        // 在按声称的粒子数分配内存之前，先对照文件实际大小
        let claimed = chead.nbod.checked_mul(record as u64);
        if !claimed.is_some_and(|n| n <= file_len) {
            return Err(IoError::Corrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "组件 {} 声称 {} 个粒子，超出文件大小 {file_len}",
                    chead.name, chead.nbod
                ),
            });
        }

        let mut comp = Component::new(chead.name.clone(), chead.niatr, chead.ndatr);
        comp.nbodies_tot = chead.nbod;
        comp.rank_counts = vec![chead.nbod];
        comp.particles.reserve(chead.nbod as usize);

        let mut buf = vec![0u8; record];
        for _ in 0..chead.nbod {
            reader.read_exact(&mut buf).map_err(|e| IoError::read(path, e))?;
            comp.particles
                .push(decode_particle(&buf, chead.niatr, chead.ndatr, precision)?);
        }
        set.push(comp);
    }

    if set.ntot() != header.ntot {
        return Err(IoError::Corrupt {
            path: path.to_path_buf(),
            reason: format!(
                "组件粒子数之和 {} != 主头部 ntot {}",
                set.ntot(),
                header.ntot
            ),
        });
    }

    Ok((header.time, set))
}
