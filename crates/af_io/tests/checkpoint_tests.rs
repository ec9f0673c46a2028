// crates/af_io/tests/checkpoint_tests.rs

//! 检查点集成测试
//!
//! 覆盖串行写出/读回往返、备份轮换的崩溃原子性、仅链接快路径、
//! 集合式偏移计算与双进程共享文件写出。

use std::path::PathBuf;

use glam::DVec3;

use af_core::{Precision, RunConfig};
use af_engine::{Component, ComponentSet, Particle};
use af_io::checkpoint::{self, CheckpointWriter};
use af_io::collective::{dump_path, CollectiveWriter, DumpOutcome, LastDump};
use af_io::format::{component_block_size, particle_record_size, MasterHeader};
use af_io::{read_checkpoint, IoError};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("af_io_it_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn config(outdir: &PathBuf, rank: usize, nprocs: usize) -> RunConfig {
    RunConfig {
        runtag: "testrun".to_string(),
        outdir: outdir.clone(),
        rank,
        nprocs,
        ..RunConfig::default()
    }
}

fn sample_particle(i: u64) -> Particle {
    Particle::new(
        i,
        DVec3::new(i as f64 * 0.25, -(i as f64), 1.0 / (i as f64 + 1.0)),
        DVec3::new(1.0, 2.0, 3.0),
    )
    .with_level((i % 3) as u32)
    .with_attribs(vec![i as i32], vec![i as f64 * 0.5, -0.125])
}

fn sample_set() -> ComponentSet {
    let mut set = ComponentSet::new();
    set.push(Component::from_particles(
        "dark halo",
        1,
        2,
        (0..17).map(sample_particle).collect(),
    ));
    set.push(Component::from_particles(
        "disk",
        1,
        2,
        (17..22).map(sample_particle).collect(),
    ));
    set
}

// ============================================================
// 串行往返
// ============================================================

#[test]
fn test_serial_roundtrip_bitexact() {
    let dir = scratch_dir("roundtrip");
    let cfg = config(&dir, 0, 1);
    let set = sample_set();

    let writer = CheckpointWriter::new(&cfg);
    writer.dump(&set, 12.5).unwrap();

    let (time, back) = read_checkpoint(writer.canonical_path(), Precision::Double).unwrap();
    assert_eq!(time, 12.5);
    assert_eq!(back.ntot(), set.ntot());
    assert_eq!(back.ncomp(), set.ncomp());

    for (a, b) in back.components.iter().zip(&set.components) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.nbodies_tot, b.nbodies_tot);
        for (pa, pb) in a.particles.iter().zip(&b.particles) {
            // 双精度格式要求位级一致
            assert_eq!(pa, pb);
            for k in 0..3 {
                assert_eq!(pa.pos[k].to_bits(), pb.pos[k].to_bits());
                assert_eq!(pa.vel[k].to_bits(), pb.vel[k].to_bits());
            }
        }
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_read_header_and_summary() {
    let dir = scratch_dir("summary");
    let cfg = config(&dir, 0, 1);
    let set = sample_set();

    let writer = CheckpointWriter::new(&cfg);
    writer.dump(&set, 3.0).unwrap();

    let header = checkpoint::read_header(writer.canonical_path()).unwrap();
    assert_eq!(
        header,
        MasterHeader {
            time: 3.0,
            ntot: 22,
            ncomp: 2
        }
    );

    let (_, comps) = checkpoint::read_summary(writer.canonical_path(), Precision::Double).unwrap();
    assert_eq!(comps.len(), 2);
    assert_eq!(comps[0].name, "dark halo");
    assert_eq!(comps[0].nbod, 17);
    assert_eq!(comps[1].name, "disk");
    assert_eq!(comps[1].nbod, 5);

    let _ = std::fs::remove_dir_all(&dir);
}

// ============================================================
// 备份轮换与崩溃原子性
// ============================================================

#[test]
fn test_backup_rotation_keeps_previous_snapshot() {
    let dir = scratch_dir("rotation");
    let cfg = config(&dir, 0, 1);
    let writer = CheckpointWriter::new(&cfg);

    writer.dump(&sample_set(), 1.0).unwrap();
    writer.dump(&sample_set(), 2.0).unwrap();

    let canonical = writer.canonical_path().to_path_buf();
    let bak = PathBuf::from(format!("{}.bak", canonical.display()));

    let (t_new, _) = read_checkpoint(&canonical, Precision::Double).unwrap();
    let (t_old, _) = read_checkpoint(&bak, Precision::Double).unwrap();
    assert_eq!(t_new, 2.0);
    assert_eq!(t_old, 1.0);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_crash_between_rename_and_create_leaves_valid_backup() {
    let dir = scratch_dir("crash_window");
    let cfg = config(&dir, 0, 1);
    let writer = CheckpointWriter::new(&cfg);

    writer.dump(&sample_set(), 1.0).unwrap();

    // 模拟在"规范文件改名为 .bak"与"重新创建规范文件"之间崩溃：
    // 手工执行轮换的前半段
    let canonical = writer.canonical_path().to_path_buf();
    let bak = PathBuf::from(format!("{}.bak", canonical.display()));
    std::fs::rename(&canonical, &bak).unwrap();

    // 规范文件消失了，但 .bak 必须是完整、可独立读取的快照
    assert!(!canonical.exists());
    let (time, set) = read_checkpoint(&bak, Precision::Double).unwrap();
    assert_eq!(time, 1.0);
    assert_eq!(set.ntot(), 22);

    // 恢复写出后两者都有效
    writer.dump(&sample_set(), 2.0).unwrap();
    assert!(read_checkpoint(&canonical, Precision::Double).is_ok());

    let _ = std::fs::remove_dir_all(&dir);
}

// ============================================================
// 仅链接快路径
// ============================================================

#[test]
fn test_link_only_fast_path_creates_symlink() {
    let dir = scratch_dir("fastpath");
    let cfg = config(&dir, 0, 1);
    let set = sample_set();

    // 先有一次成功的集合式 dump
    let mut collective = CollectiveWriter::new(&cfg);
    let outcome = collective.write_dump(&set, 5.0, 200);
    let last = outcome.last_dump().expect("dump should succeed").clone();
    assert_eq!(last.index, 0);

    // 同一步的串行检查点走仅链接路径
    let writer = CheckpointWriter::new(&cfg);
    let wrote = writer.run(&set, 5.0, 200, false, Some(&last)).unwrap();
    assert!(wrote);

    let canonical = writer.canonical_path();
    let meta = std::fs::symlink_metadata(canonical).unwrap();
    assert!(meta.file_type().is_symlink(), "canonical must be a symlink");
    assert_eq!(std::fs::read_link(canonical).unwrap(), last.path);

    // 经由符号链接读取与直接读 dump 等价
    let (time, back) = read_checkpoint(canonical, Precision::Double).unwrap();
    assert_eq!(time, 5.0);
    assert_eq!(back.ntot(), set.ntot());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_different_step_does_not_take_fast_path() {
    let dir = scratch_dir("no_fastpath");
    let cfg = config(&dir, 0, 1);
    let set = sample_set();

    let last = LastDump {
        index: 3,
        step: 100,
        path: dump_path(&dir, "testrun", 3),
    };

    let writer = CheckpointWriter::new(&cfg);
    // 步数不同：完整写出而不是链接
    writer.run(&set, 7.0, 200, true, Some(&last)).unwrap();

    let meta = std::fs::symlink_metadata(writer.canonical_path()).unwrap();
    assert!(!meta.file_type().is_symlink());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_run_respects_interval_gate() {
    let dir = scratch_dir("gate");
    let mut cfg = config(&dir, 0, 1);
    cfg.checkpoint.nint = 10;
    let set = sample_set();

    let writer = CheckpointWriter::new(&cfg);
    assert!(!writer.run(&set, 0.5, 7, false, None).unwrap());
    assert!(!writer.canonical_path().exists());

    // 命中间隔
    assert!(writer.run(&set, 1.0, 20, false, None).unwrap());
    // 末步无视间隔
    assert!(writer.run(&set, 1.5, 21, true, None).unwrap());

    let _ = std::fs::remove_dir_all(&dir);
}

// ============================================================
// 集合式写出
// ============================================================

/// 把样本集合按逐进程计数表拆成各进程的本地视图
fn rank_view(full: &ComponentSet, rank: usize, splits: &[Vec<u64>]) -> ComponentSet {
    let mut set = ComponentSet::new();
    for (comp, counts) in full.components.iter().zip(splits) {
        let before: u64 = counts[..rank].iter().sum();
        let mine = counts[rank] as usize;
        let mut local = comp.clone();
        local.particles = comp.particles[before as usize..before as usize + mine].to_vec();
        local.rank_counts = counts.clone();
        set.push(local);
    }
    set
}

#[test]
fn test_collective_two_ranks_reassemble() {
    let dir = scratch_dir("collective2");
    let full = sample_set();
    // "dark halo" 17 个粒子分 10+7，"disk" 5 个分 2+3
    let splits = vec![vec![10, 7], vec![2, 3]];

    for rank in 0..2 {
        let cfg = config(&dir, rank, 2);
        let local = rank_view(&full, rank, &splits);
        let mut writer = CollectiveWriter::new(&cfg);
        let outcome = writer.write_dump(&local, 9.0, 300);
        assert!(outcome.is_written(), "rank {rank} dump failed");
    }

    // 两个进程写完后，文件与串行写出等价
    let path = dump_path(&dir, "testrun", 0);
    let (time, back) = read_checkpoint(&path, Precision::Double).unwrap();
    assert_eq!(time, 9.0);
    assert_eq!(back.ntot(), full.ntot());

    for (a, b) in back.components.iter().zip(&full.components) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.particles.len(), b.particles.len());
        for (pa, pb) in a.particles.iter().zip(&b.particles) {
            assert_eq!(pa, pb);
        }
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_collective_offsets_from_metadata_only() {
    // 两个进程分别持有 p1、p2 个粒子：2 号位进程的写偏移必须等于
    // 主头部 + 组件头部 + p1 条记录，且只由计数表推出
    let p1: u64 = 11;
    let p2: u64 = 6;
    let record = particle_record_size(Precision::Double, 0, 0) as u64;

    let mut comp = Component::new("halo", 0, 0);
    comp.nbodies_tot = p1 + p2;
    comp.rank_counts = vec![p1, p2];

    let expected = MasterHeader::SIZE as u64 + 80 + p1 * record;
    let computed = MasterHeader::SIZE as u64
        + af_io::format::ComponentHeader::SIZE as u64
        + comp.rank_offset(1) * record;
    assert_eq!(computed, expected);

    // 块大小同样只由元数据决定
    assert_eq!(
        component_block_size(p1 + p2, 0, 0, Precision::Double),
        80 + (p1 + p2) * record
    );
}

#[test]
fn test_collective_index_increments_and_probe_resumes() {
    let dir = scratch_dir("indexing");
    let cfg = config(&dir, 0, 1);
    let set = sample_set();

    let mut writer = CollectiveWriter::new(&cfg);
    assert_eq!(writer.next_index(), 0);
    writer.write_dump(&set, 1.0, 100);
    writer.write_dump(&set, 2.0, 200);
    assert_eq!(writer.next_index(), 2);
    assert!(dump_path(&dir, "testrun", 0).exists());
    assert!(dump_path(&dir, "testrun", 1).exists());

    // 新进程重启：探测跳过已有编号
    let mut restarted = CollectiveWriter::new(&cfg);
    restarted.resume();
    assert_eq!(restarted.next_index(), 2);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_single_precision_roundtrip() {
    let dir = scratch_dir("real4");
    let mut cfg = config(&dir, 0, 1);
    cfg.checkpoint.precision = Precision::Single;

    let mut set = ComponentSet::new();
    set.push(Component::from_particles(
        "gas",
        0,
        0,
        vec![Particle::new(0, DVec3::new(0.5, -0.25, 2.0), DVec3::X)],
    ));

    let writer = CheckpointWriter::new(&cfg);
    writer.dump(&set, 1.0).unwrap();

    // 读方必须使用与写方一致的精度
    let (_, back) = read_checkpoint(writer.canonical_path(), Precision::Single).unwrap();
    assert_eq!(back.components[0].particles[0].pos, DVec3::new(0.5, -0.25, 2.0));

    let _ = std::fs::remove_dir_all(&dir);
}

// ============================================================
// 失败路径
// ============================================================

#[test]
fn test_collective_failure_consumes_index_without_promotion() {
    // 输出目录不存在：打开共享文件即失败
    let base = scratch_dir("dumpfail");
    let dir = base.join("missing").join("deeper");
    let cfg = config(&dir, 0, 1);
    let set = sample_set();

    let mut writer = CollectiveWriter::new(&cfg);
    let outcome = writer.write_dump(&set, 1.0, 100);

    // 失败的 dump 不会被提升为最近检查点
    assert!(!outcome.is_written());
    assert!(outcome.last_dump().is_none());
    assert!(matches!(outcome, DumpOutcome::Failed { index: 0, .. }));

    // 但序号照样被消耗，重试落到下一个编号
    assert_eq!(writer.next_index(), 1);
    let outcome = writer.write_dump(&set, 2.0, 200);
    assert!(matches!(outcome, DumpOutcome::Failed { index: 1, .. }));
    assert_eq!(writer.next_index(), 2);

    let _ = std::fs::remove_dir_all(&base);
}

#[test]
fn test_corrupt_particle_count_rejected_before_allocation() {
    let dir = scratch_dir("corrupt_nbod");
    let cfg = config(&dir, 0, 1);
    let writer = CheckpointWriter::new(&cfg);
    writer.dump(&sample_set(), 1.0).unwrap();

    // 把第一个组件头部的 nbod 字段改成天文数字
    let path = writer.canonical_path().to_path_buf();
    let mut bytes = std::fs::read(&path).unwrap();
    let nbod_off = MasterHeader::SIZE + 64;
    bytes[nbod_off..nbod_off + 8].copy_from_slice(&(u64::MAX / 2).to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        read_checkpoint(&path, Precision::Double),
        Err(IoError::Corrupt { .. })
    ));
    assert!(matches!(
        checkpoint::read_summary(&path, Precision::Double),
        Err(IoError::Corrupt { .. })
    ));

    // 没有溢出但超出文件大小的声称值同样被拒绝
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[nbod_off..nbod_off + 8].copy_from_slice(&10_000u64.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();
    assert!(matches!(
        read_checkpoint(&path, Precision::Double),
        Err(IoError::Corrupt { .. })
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_short_file_reported_as_truncated() {
    let dir = scratch_dir("truncated");
    let cfg = config(&dir, 0, 1);
    let writer = CheckpointWriter::new(&cfg);
    writer.dump(&sample_set(), 1.0).unwrap();

    // 砍掉尾部若干字节：粒子记录读到一半结束
    let path = writer.canonical_path().to_path_buf();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();
    assert!(matches!(
        read_checkpoint(&path, Precision::Double),
        Err(IoError::Truncated { .. })
    ));

    // 连主头部都不完整
    std::fs::write(&path, &bytes[..10]).unwrap();
    assert!(matches!(
        checkpoint::read_header(&path),
        Err(IoError::Truncated { .. })
    ));

    let _ = std::fs::remove_dir_all(&dir);
}
