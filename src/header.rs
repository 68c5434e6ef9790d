//! MP3 帧头解析
//!
//! 帧头为 4 字节大端序字, 布局如下:
//!
//! ```text
//! AAAA AAAA  AAAB BCCD  EEEE FFGH  IIJJ KLMM
//! A = 同步位 (11 bit, 全 1)   B = MPEG 版本    C = 层
//! D = CRC 保护               E = 比特率索引    F = 采样率索引
//! G = 填充位                 H = 私有位        I = 声道模式
//! J = 模式扩展               K = 版权          L = 原始/复制
//! M = 强调
//! ```

use crate::error::{Mp3Error, Mp3Result};
use crate::source::Source;
use log::debug;
use std::io::Read;

/// 每帧 granule 数 (MPEG-1 Layer III 固定为 2)
pub const GRANULES: usize = 2;
/// 每 granule 每声道的频线/样本数
pub const SAMPLES_PER_GR: usize = 576;

/// MPEG 版本 (帧头 bit 20-19)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg25 = 0,
    Reserved = 1,
    Mpeg2 = 2,
    Mpeg1 = 3,
}

/// MPEG 层 (帧头 bit 18-17)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegLayer {
    LayerReserved = 0,
    Layer3 = 1,
    Layer2 = 2,
    Layer1 = 3,
}

/// 声道模式 (帧头 bit 7-6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo = 0,
    JointStereo = 1,
    DualChannel = 2,
    SingleChannel = 3,
}

/// MPEG-1 Layer III 比特率表 (bps), 索引 1-14
const BITRATE_L3: [u32; 15] = [
    0, 32000, 40000, 48000, 56000, 64000, 80000, 96000, 112000, 128000, 160000, 192000, 224000,
    256000, 320000,
];

/// MPEG-1 采样率表 (Hz), 索引 0-2
const SAMPLE_RATES: [u32; 3] = [44100, 48000, 32000];

/// 4 字节同步+帧头字.
///
/// 按位访问各字段; 字段的合法组合由 [`FrameHeader::is_valid`] 判定.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader(u32);

impl FrameHeader {
    pub fn new(word: u32) -> Self {
        Self(word)
    }

    /// MPEG 版本 (bit 20-19)
    pub fn version(&self) -> MpegVersion {
        match (self.0 >> 19) & 0x3 {
            0 => MpegVersion::Mpeg25,
            1 => MpegVersion::Reserved,
            2 => MpegVersion::Mpeg2,
            _ => MpegVersion::Mpeg1,
        }
    }

    /// 层 (bit 18-17)
    pub fn layer(&self) -> MpegLayer {
        match (self.0 >> 17) & 0x3 {
            0 => MpegLayer::LayerReserved,
            1 => MpegLayer::Layer3,
            2 => MpegLayer::Layer2,
            _ => MpegLayer::Layer1,
        }
    }

    /// CRC 保护位 (bit 16). 0 表示帧头后跟随 16 位 CRC.
    pub fn protection_bit(&self) -> u32 {
        (self.0 >> 16) & 0x1
    }

    /// 比特率索引 (bit 15-12)
    pub fn bitrate_index(&self) -> usize {
        ((self.0 >> 12) & 0xF) as usize
    }

    /// 采样率索引 (bit 11-10)
    pub fn sampling_frequency(&self) -> usize {
        ((self.0 >> 10) & 0x3) as usize
    }

    /// 填充位 (bit 9)
    pub fn padding_bit(&self) -> u32 {
        (self.0 >> 9) & 0x1
    }

    /// 声道模式 (bit 7-6)
    pub fn mode(&self) -> ChannelMode {
        match (self.0 >> 6) & 0x3 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::SingleChannel,
        }
    }

    /// 模式扩展 (bit 5-4), 仅联合立体声使用
    pub fn mode_extension(&self) -> u32 {
        (self.0 >> 4) & 0x3
    }

    /// 强调 (bit 1-0)
    pub fn emphasis(&self) -> u32 {
        self.0 & 0x3
    }

    /// 帧头合法性判定.
    ///
    /// 同步字全 1, 版本与层非保留值, 比特率索引不为 15,
    /// 采样率索引不为 3, 强调不为 2.
    pub fn is_valid(&self) -> bool {
        const SYNC: u32 = 0xFFE0_0000;
        if (self.0 & SYNC) != SYNC {
            return false;
        }
        if self.version() == MpegVersion::Reserved {
            return false;
        }
        if self.layer() == MpegLayer::LayerReserved {
            return false;
        }
        if self.bitrate_index() == 15 {
            return false;
        }
        if self.sampling_frequency() == 3 {
            return false;
        }
        if self.emphasis() == 2 {
            return false;
        }
        true
    }

    /// 比特率 (bps)
    pub fn bitrate(&self) -> u32 {
        BITRATE_L3[self.bitrate_index()]
    }

    /// 采样率 (Hz)
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATES[self.sampling_frequency()]
    }

    /// 帧总字节数 (含帧头): 144 * bitrate / sample_rate + padding
    pub fn frame_size(&self) -> usize {
        (144 * self.bitrate() / self.sample_rate() + self.padding_bit()) as usize
    }

    /// 侧边信息字节数: 单声道 17, 其余 32
    pub fn side_info_size(&self) -> usize {
        if self.mode() == ChannelMode::SingleChannel {
            17
        } else {
            32
        }
    }

    /// 输出声道数 (单声道为 1, 其余为 2)
    pub fn number_of_channels(&self) -> usize {
        if self.mode() == ChannelMode::SingleChannel {
            1
        } else {
            2
        }
    }

    /// MS 立体声是否启用 (联合立体声且 mode_extension bit 1)
    pub fn use_ms_stereo(&self) -> bool {
        self.mode() == ChannelMode::JointStereo && (self.mode_extension() & 0x2) != 0
    }

    /// 强度立体声是否启用 (联合立体声且 mode_extension bit 0)
    pub fn use_intensity_stereo(&self) -> bool {
        self.mode() == ChannelMode::JointStereo && (self.mode_extension() & 0x1) != 0
    }
}

/// 从源中读取下一个帧头.
///
/// 以 4 字节滑动窗口逐字节扫描, 直到拼出合法帧头;
/// 返回帧头与其在输入中的绝对字节偏移.
pub fn read_header<R: Read>(source: &mut Source<R>) -> Mp3Result<(FrameHeader, u64)> {
    let mut pos = source.position();

    let mut buf = [0u8; 4];
    let n = source.read_full(&mut buf)?;
    if n < 4 {
        if n == 0 {
            // 帧边界处的正常结束
            return Err(Mp3Error::Eof);
        }
        return Err(Mp3Error::UnexpectedEof("帧头 (1)"));
    }

    let mut word = u32::from_be_bytes(buf);
    let mut header = FrameHeader::new(word);
    let mut skipped = 0u64;
    while !header.is_valid() {
        // 同步丢失: 窗口左移一字节继续扫描
        let mut byte = [0u8; 1];
        if source.read_full(&mut byte)? < 1 {
            return Err(Mp3Error::UnexpectedEof("帧头 (2)"));
        }
        word = (word << 8) | u32::from(byte[0]);
        header = FrameHeader::new(word);
        pos += 1;
        skipped += 1;
    }
    if skipped > 0 {
        debug!("重新同步: 跳过 {skipped} 字节, 帧头位于 {pos}");
    }

    // 同步字命中后再检查仅靠扫描无法排除的组合
    if header.bitrate_index() == 0 {
        return Err(Mp3Error::Unsupported(format!(
            "自由格式码率 (帧头 0x{word:08x}, 偏移 {pos})"
        )));
    }
    Ok((header, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造 MPEG-1 Layer III 无 CRC 帧头
    fn make_header(bitrate_idx: u32, sr_idx: u32, mode: u32) -> FrameHeader {
        let word = 0xFFFB_0000 | (bitrate_idx << 12) | (sr_idx << 10) | (mode << 6);
        FrameHeader::new(word)
    }

    #[test]
    fn test_parse_128kbps_44100() {
        let h = make_header(9, 0, 0);
        assert!(h.is_valid());
        assert_eq!(h.version(), MpegVersion::Mpeg1);
        assert_eq!(h.layer(), MpegLayer::Layer3);
        assert_eq!(h.bitrate(), 128_000);
        assert_eq!(h.sample_rate(), 44100);
        // 144 * 128000 / 44100 = 417
        assert_eq!(h.frame_size(), 417);
        assert_eq!(h.side_info_size(), 32);
        assert_eq!(h.number_of_channels(), 2);
    }

    #[test]
    fn test_parse_320kbps_48000_mono() {
        let h = make_header(14, 1, 3);
        assert!(h.is_valid());
        assert_eq!(h.bitrate(), 320_000);
        assert_eq!(h.sample_rate(), 48000);
        assert_eq!(h.frame_size(), 960); // 144*320000/48000
        assert_eq!(h.side_info_size(), 17);
        assert_eq!(h.number_of_channels(), 1);
    }

    #[test]
    fn test_invalid_headers() {
        // 非同步字
        assert!(!FrameHeader::new(0x0000_0000).is_valid());
        assert!(!FrameHeader::new(0x1234_5678).is_valid());
        // 保留版本 (bit 20-19 = 01)
        assert!(!FrameHeader::new(0xFFE8_9000 | (9 << 12)).is_valid());
        // 保留层 (bit 18-17 = 00)
        assert!(!FrameHeader::new(0xFFF9_0000 | (9 << 12)).is_valid());
        // 比特率索引 15
        assert!(!FrameHeader::new(0xFFFB_F000).is_valid());
        // 采样率索引 3
        assert!(!FrameHeader::new(0xFFFB_9C00).is_valid());
        // 强调 2
        assert!(!FrameHeader::new(0xFFFB_9002).is_valid());
        // 自由格式 (索引 0) 可通过同步判定, 由 read_header 报 Unsupported
        assert!(FrameHeader::new(0xFFFB_0000).is_valid());
    }

    #[test]
    fn test_joint_stereo_flags() {
        // mode=01 联合立体声, mode_extension 按位展开
        for ext in 0..4u32 {
            let h = FrameHeader::new(0xFFFB_9000 | (1 << 6) | (ext << 4));
            assert_eq!(h.use_ms_stereo(), ext & 2 != 0);
            assert_eq!(h.use_intensity_stereo(), ext & 1 != 0);
        }
        // 普通立体声不做联合立体声处理
        let h = make_header(9, 0, 0);
        assert!(!h.use_ms_stereo());
        assert!(!h.use_intensity_stereo());
    }

    #[test]
    fn test_padding_frame_size() {
        let h = FrameHeader::new(0xFFFB_9200); // padding=1
        assert_eq!(h.frame_size(), 418);
    }
}
