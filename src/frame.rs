//! 帧驱动: 逐帧读取与数值解码管线
//!
//! 每帧: 帧头同步 -> 可选 CRC -> 侧边信息 -> 储备库拼接与主数据读取,
//! 然后按 granule/声道依次执行反量化, 重排序, 联合立体声, 混叠消除,
//! 混合合成, 频率反转与多相子带合成, 产出 4608 字节 PCM.

use crate::alias;
use crate::bitreader::BitReader;
use crate::error::{Mp3Error, Mp3Result};
use crate::header::{self, FrameHeader, MpegLayer, MpegVersion, GRANULES, SAMPLES_PER_GR};
use crate::imdct;
use crate::maindata::{self, MainData};
use crate::reorder;
use crate::requantize;
use crate::side_info::SideInfo;
use crate::source::Source;
use crate::stereo;
use crate::synthesis;
use log::warn;
use std::io::Read;

/// 每帧解码输出的 PCM 字节数: 2 granule * 576 样本 * 2 声道 * 2 字节
pub const BYTES_PER_FRAME: usize = GRANULES * SAMPLES_PER_GR * 4;
/// 每帧每声道的 PCM 样本数
pub const SAMPLES_PER_FRAME: usize = GRANULES * SAMPLES_PER_GR;

/// 跨帧解码状态: IMDCT 重叠存储与多相合成 V 向量, 每声道一份.
/// 由单个解码器独占, 定位时清零.
#[derive(Debug, Clone)]
pub struct FrameState {
    pub store: [[[f32; 18]; 32]; 2],
    pub v_vec: [[f32; 1024]; 2],
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            store: [[[0.0; 18]; 32]; 2],
            v_vec: [[0.0; 1024]; 2],
        }
    }
}

impl FrameState {
    pub fn reset(&mut self) {
        self.store = [[[0.0; 18]; 32]; 2];
        self.v_vec = [[0.0; 1024]; 2];
    }
}

/// 一个已解析 (未数值解码) 的帧
pub struct Frame {
    pub header: FrameHeader,
    pub side_info: SideInfo,
    pub main_data: Box<MainData>,
}

impl Frame {
    /// 从源中读取下一帧: 同步, 校验, 解析侧边信息与主数据.
    ///
    /// 返回帧与其帧头的绝对字节偏移. `reservoir` 在调用后持有本帧
    /// 拼接出的主数据缓冲. 储备库欠载的帧返回 `None`:
    /// 字节已读入储备库, 该帧应输出静音, 解码从下一帧继续.
    pub fn read<R: Read>(
        source: &mut Source<R>,
        reservoir: &mut Option<BitReader>,
    ) -> Mp3Result<(Option<Frame>, u64)> {
        let (h, pos) = header::read_header(source)?;

        // CRC 字 (不校验)
        if h.protection_bit() == 0 {
            let mut crc = [0u8; 2];
            if source.read_full(&mut crc)? < 2 {
                return Err(Mp3Error::UnexpectedEof("CRC"));
            }
        }

        if h.version() != MpegVersion::Mpeg1 {
            return Err(Mp3Error::Unsupported(format!(
                "仅支持 MPEG-1 (版本字段 {:?})",
                h.version()
            )));
        }
        if h.layer() != MpegLayer::Layer3 {
            return Err(Mp3Error::Unsupported(format!(
                "仅支持 Layer III (层字段 {:?})",
                h.layer()
            )));
        }
        if h.frame_size() > 2000 {
            return Err(Mp3Error::Malformed(format!("frame_size = {}", h.frame_size())));
        }

        let mut side_info = SideInfo::read(source, &h)?;
        let main_data = match maindata::read(source, reservoir, &h, &mut side_info) {
            Ok(md) => md,
            Err(Mp3Error::InsufficientReservoir { needed, available }) => {
                warn!("比特储备库欠载 (需 {needed} 字节, 有 {available} 字节), 本帧输出静音");
                return Ok((None, pos));
            }
            Err(e) => return Err(e),
        };

        Ok((
            Some(Frame {
                header: h,
                side_info,
                main_data,
            }),
            pos,
        ))
    }

    /// 数值解码: 频线 -> PCM. 输出固定 4608 字节
    /// (16 位小端, 左右交织; 单声道复制到双声道).
    pub fn decode(&mut self, state: &mut FrameState) -> Vec<u8> {
        let mut out = vec![0u8; BYTES_PER_FRAME];
        let nch = self.header.number_of_channels();

        for gr in 0..GRANULES {
            for ch in 0..nch {
                let g = self.side_info.granules[gr][ch];
                requantize::requantize(&self.header, &g, &mut self.main_data, gr, ch);
                reorder::reorder(&self.header, &g, &mut self.main_data.is[gr][ch]);
            }
            stereo::stereo(&self.header, &self.side_info, &mut self.main_data, gr);
            for ch in 0..nch {
                let g = self.side_info.granules[gr][ch];
                alias::antialias(&g, &mut self.main_data.is[gr][ch]);
                imdct::hybrid_synthesis(&g, &mut self.main_data.is[gr][ch], &mut state.store[ch]);
                synthesis::frequency_inversion(&mut self.main_data.is[gr][ch]);
                synthesis::subband_synthesis(
                    &mut state.v_vec[ch],
                    &self.main_data.is[gr][ch],
                    ch,
                    nch,
                    &mut out[SAMPLES_PER_GR * 4 * gr..],
                );
            }
        }
        out
    }

    pub fn sample_rate(&self) -> u32 {
        self.header.sample_rate()
    }
}
