//! 解码器公开接口
//!
//! [`Mp3Decoder`] 把 MP3 字节流暴露为 PCM 字节流: 16 位有符号小端,
//! 双声道交织, 采样率与码流一致. 通过 `io::Read` 拉取 PCM;
//! 以可定位源构造时额外支持 `io::Seek` 与总长度查询.

use crate::bitreader::BitReader;
use crate::error::{Mp3Error, Mp3Result};
use crate::frame::{Frame, FrameState, BYTES_PER_FRAME};
use crate::source::Source;
use log::debug;
use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

/// MP3 解码器.
///
/// 输出流始终为双声道 (单声道源复制到两个声道), 每个采样点 4 字节.
pub struct Mp3Decoder<R> {
    source: Source<R>,
    sample_rate: u32,
    /// PCM 总字节数, 仅可定位源可知
    length: Option<u64>,
    /// 各帧帧头的绝对输入偏移, 预扫描建立, 定位时使用
    frame_starts: Vec<u64>,
    /// 已解码未被读走的 PCM
    buf: Vec<u8>,
    /// PCM 流中的读取位置
    pos: u64,
    /// 定位越过流末尾后置位, 读取直接返回 EOF
    past_end: bool,
    reservoir: Option<BitReader>,
    state: FrameState,
}

impl<R: Read> Mp3Decoder<R> {
    /// 以流式源构造解码器: 跳过头部标签并解码首帧.
    /// 总长度未知, [`Mp3Decoder::length`] 返回 `None`.
    pub fn new(reader: R) -> Mp3Result<Self> {
        let mut d = Self {
            source: Source::new(reader),
            sample_rate: 0,
            length: None,
            frame_starts: Vec::new(),
            buf: Vec::new(),
            pos: 0,
            past_end: false,
            reservoir: None,
            state: FrameState::default(),
        };
        d.source.skip_tags()?;
        d.read_frame()?;
        debug!(
            "MP3 流: {} Hz, 输出双声道 16 位小端",
            d.sample_rate
        );
        Ok(d)
    }

    /// 解码下一帧并把 PCM 追加到输出缓冲.
    /// 储备库欠载的帧输出一帧静音并继续.
    fn read_frame(&mut self) -> Mp3Result<()> {
        match Frame::read(&mut self.source, &mut self.reservoir)? {
            (Some(mut frame), _) => {
                if self.sample_rate == 0 {
                    self.sample_rate = frame.sample_rate();
                }
                let pcm = frame.decode(&mut self.state);
                self.buf.extend_from_slice(&pcm);
            }
            (None, _) => {
                self.buf.resize(self.buf.len() + BYTES_PER_FRAME, 0);
            }
        }
        Ok(())
    }

    /// 采样率 (Hz), 取自首帧帧头
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// PCM 总字节数. 源不可定位时为 `None`.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    /// 总时长, 由 PCM 长度与采样率导出. 源不可定位时为 `None`.
    pub fn duration(&self) -> Option<Duration> {
        if self.sample_rate == 0 {
            return None;
        }
        self.length
            .map(|l| Duration::from_secs_f64(l as f64 / f64::from(self.sample_rate) / 4.0))
    }

    /// 已读取 PCM 对应的播放时长
    pub fn elapsed_time(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.pos as f64 / f64::from(self.sample_rate) / 4.0)
    }

    /// 输出声道数. 恒为 2: 单声道源复制到双声道.
    pub fn channels(&self) -> u32 {
        2
    }

    /// 收回底层源
    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }
}

impl<R: Read + Seek> Mp3Decoder<R> {
    /// 以可定位源构造解码器.
    ///
    /// 构造时预扫描全部帧起始位置 (逐帧解析侧边信息与主数据以保持
    /// 储备库连续, 不执行数值解码), 回绕后解码首帧. 由此
    /// [`Mp3Decoder::length`] 可用, 且解码器实现 [`io::Seek`].
    pub fn new_seekable(reader: R) -> Mp3Result<Self> {
        let mut d = Self {
            source: Source::new(reader),
            sample_rate: 0,
            length: None,
            frame_starts: Vec::new(),
            buf: Vec::new(),
            pos: 0,
            past_end: false,
            reservoir: None,
            state: FrameState::default(),
        };
        d.source.skip_tags()?;

        // 预扫描: 记录每帧偏移, 累计 PCM 长度
        // (欠载帧同样占一帧静音输出, 一并计入)
        let mut length = 0u64;
        loop {
            match Frame::read(&mut d.source, &mut d.reservoir) {
                Ok((_, pos)) => {
                    d.frame_starts.push(pos);
                    length += BYTES_PER_FRAME as u64;
                }
                Err(Mp3Error::Eof) => break,
                Err(Mp3Error::UnexpectedEof(at)) => {
                    debug!("预扫描在 {at} 处遇到截断, 按流结束处理");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        debug!("预扫描: {} 帧, PCM 共 {} 字节", d.frame_starts.len(), length);
        d.length = Some(length);

        d.source.rewind()?;
        d.reservoir = None;
        d.source.skip_tags()?;
        d.read_frame()?;
        Ok(d)
    }
}

impl<R: Read> Read for Mp3Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.past_end {
            return Ok(0);
        }
        while self.buf.is_empty() {
            match self.read_frame() {
                Ok(()) => {}
                Err(Mp3Error::Eof) => return Ok(0),
                Err(Mp3Error::UnexpectedEof(at)) => {
                    debug!("码流在 {at} 处截断, 按流结束处理");
                    return Ok(0);
                }
                Err(Mp3Error::Io(e)) => return Err(e),
                Err(e) => {
                    return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e));
                }
            }
        }
        let n = buf.len().min(self.buf.len());
        buf[..n].copy_from_slice(&self.buf[..n]);
        self.buf.drain(..n);
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for Mp3Decoder<R> {
    /// 在 PCM 输出流内按字节偏移定位.
    ///
    /// 需要构造时建立的帧索引. 目标非首帧时先重放上一帧以重建
    /// overlap 存储与比特储备库, 再解码目标帧并丢弃多余前缀.
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let npos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
            SeekFrom::End(offset) => {
                let len = self.length.ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Unsupported, "PCM 总长度未知")
                })?;
                len as i64 + offset
            }
        };
        if npos < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "负偏移定位",
            ));
        }
        if self.frame_starts.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "解码器未建立帧索引 (需以 new_seekable 构造)",
            ));
        }

        let npos = npos as u64;
        self.pos = npos;
        self.buf.clear();
        // 跨帧状态确定性清零, 由重放帧重建
        self.reservoir = None;
        self.state.reset();
        self.past_end = false;

        let bpf = BYTES_PER_FRAME as u64;
        let mut f = npos / bpf;
        // 非首帧目标: 从上一帧起重放两帧, 以重建 overlap 与储备库
        let (skip, replay);
        if f > 0 {
            f -= 1;
            skip = bpf + npos % bpf;
            replay = 2;
        } else {
            skip = npos;
            replay = 1;
        }
        if f as usize >= self.frame_starts.len() {
            // 目标在流末尾之后: 后续读取返回 EOF
            self.past_end = true;
            return Ok(npos);
        }

        self.source
            .seek_to(self.frame_starts[f as usize])
            .map_err(io_error)?;

        for _ in 0..replay {
            match self.read_frame() {
                Ok(()) => {}
                Err(Mp3Error::Eof) | Err(Mp3Error::UnexpectedEof(_)) => break,
                Err(e) => return Err(io_error(e)),
            }
        }
        let drop = (skip as usize).min(self.buf.len());
        self.buf.drain(..drop);
        Ok(npos)
    }
}

fn io_error(e: Mp3Error) -> std::io::Error {
    match e {
        Mp3Error::Io(e) => e,
        other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
    }
}
