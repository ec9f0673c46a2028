// crates/af_io/src/offset.rs

//! 偏移寻址文件写入
//!
//! 集合式检查点的基础原语：多个进程向同一文件的互不重叠字节区间
//! 写入，偏移由各进程独立算出而非协商得到。unix 上直接用
//! `pwrite`（不移动文件游标，同进程内多次写之间互不干扰）。

use std::fs::File;

/// 在指定字节偏移处写入整个缓冲区
#[cfg(unix)]
pub fn write_at(file: &File, offset: u64, buf: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

/// 在指定字节偏移处写入整个缓冲区
#[cfg(windows)]
pub fn write_at(file: &File, offset: u64, buf: &[u8]) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut written = 0;
    while written < buf.len() {
        let n = file.seek_write(&buf[written..], offset + written as u64)?;
        if n == 0 {
            return Err(std::io::ErrorKind::WriteZero.into());
        }
        written += n;
    }
    Ok(())
}
