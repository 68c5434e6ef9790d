//! 字节源封装
//!
//! 在任意 `io::Read` 上提供解码核心需要的读取原语:
//! 完整读取 (仅在 EOF 处允许短读), 最多 3 字节的回退 (区分
//! ID3/TAG 前缀与音频数据), 以及可定位源上的绝对定位与回绕.

use crate::error::{Mp3Error, Mp3Result};
use log::debug;
use std::io::{Read, Seek, SeekFrom};

/// 解码器的底层字节源
#[derive(Debug)]
pub struct Source<R> {
    reader: R,
    /// 回退缓冲, 先于 reader 被消费
    unread: Vec<u8>,
    /// 输入流中的绝对字节位置
    pos: u64,
}

impl<R: Read> Source<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            unread: Vec::new(),
            pos: 0,
        }
    }

    /// 当前绝对输入位置 (已扣除回退字节)
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// 尽力填满 buf. 返回实际读到的字节数;
    /// 短读只发生在流末尾, I/O 故障返回错误.
    pub fn read_full(&mut self, buf: &mut [u8]) -> Mp3Result<usize> {
        let mut read = 0;
        if !self.unread.is_empty() {
            read = self.unread.len().min(buf.len());
            buf[..read].copy_from_slice(&self.unread[..read]);
            self.unread.drain(..read);
        }

        while read < buf.len() {
            match self.reader.read(&mut buf[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Mp3Error::Io(e)),
            }
        }
        self.pos += read as u64;
        Ok(read)
    }

    /// 收回底层读取器
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// 将字节退回读取侧, 下次 read_full 优先返回
    pub fn unread(&mut self, buf: &[u8]) {
        self.unread.extend_from_slice(buf);
        self.pos -= buf.len() as u64;
    }

    /// 跳过流头部的 ID3v1/ID3v2 标签; 非标签前缀原样退回.
    pub fn skip_tags(&mut self) -> Mp3Result<()> {
        let mut buf = [0u8; 3];
        if self.read_full(&mut buf)? < 3 {
            return Err(Mp3Error::Eof);
        }
        match &buf {
            b"TAG" => {
                // ID3v1: 固定 128 字节
                let mut rest = [0u8; 125];
                if self.read_full(&mut rest)? < 125 {
                    return Err(Mp3Error::UnexpectedEof("ID3v1 标签"));
                }
                debug!("跳过 ID3v1 标签");
            }
            b"ID3" => {
                // ID3v2: 版本 2 字节 + 标志 1 字节 + synchsafe 长度 4 字节 + 载荷
                let mut head = [0u8; 3];
                if self.read_full(&mut head)? < 3 {
                    return Err(Mp3Error::UnexpectedEof("ID3v2 标签头"));
                }
                let mut size_buf = [0u8; 4];
                if self.read_full(&mut size_buf)? < 4 {
                    return Ok(());
                }
                let size = (u32::from(size_buf[0] & 0x7F) << 21)
                    | (u32::from(size_buf[1] & 0x7F) << 14)
                    | (u32::from(size_buf[2] & 0x7F) << 7)
                    | u32::from(size_buf[3] & 0x7F);
                let mut payload = vec![0u8; size as usize];
                if self.read_full(&mut payload)? < payload.len() {
                    return Err(Mp3Error::UnexpectedEof("ID3v2 标签载荷"));
                }
                debug!("跳过 ID3v2 标签, 载荷 {size} 字节");
            }
            _ => self.unread(&buf),
        }
        Ok(())
    }
}

impl<R: Read + Seek> Source<R> {
    /// 定位到输入流的绝对字节偏移, 丢弃回退缓冲
    pub fn seek_to(&mut self, position: u64) -> Mp3Result<u64> {
        self.unread.clear();
        let n = self.reader.seek(SeekFrom::Start(position))?;
        self.pos = n;
        Ok(n)
    }

    /// 回绕到输入起始
    pub fn rewind(&mut self) -> Mp3Result<()> {
        self.seek_to(0)?;
        Ok(())
    }
}
