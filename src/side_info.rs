//! MP3 侧边信息 (Side Information) 解析
//!
//! 单声道 17 字节, 立体声 32 字节, 紧跟帧头 (与可选 CRC) 之后.
//! 字段顺序与位宽遵循 ISO/IEC 11172-3 2.4.1.7.

use crate::bitreader::BitReader;
use crate::error::{Mp3Error, Mp3Result};
use crate::header::{ChannelMode, FrameHeader, GRANULES};
use crate::source::Source;
use std::io::Read;

/// 每 granule 每声道的编码参数
#[derive(Debug, Clone, Copy, Default)]
pub struct Granule {
    pub part2_3_length: u32,
    pub big_values: u32,
    pub global_gain: u32,
    pub scalefac_compress: u32,
    pub win_switch_flag: bool,

    pub block_type: u8,
    pub mixed_block_flag: bool,
    pub table_select: [u8; 3],
    pub subblock_gain: [u8; 3],

    pub region0_count: u32,
    pub region1_count: u32,

    pub preflag: bool,
    pub scalefac_scale: bool,
    pub count1table_select: bool,

    /// rzero 区首样本索引. 不在码流中, 由 Huffman 读取阶段计算.
    pub count1: usize,
}

/// 一帧的侧边信息
#[derive(Debug, Clone)]
pub struct SideInfo {
    /// 主数据在比特储备库中的反向偏移 (9 bit)
    pub main_data_begin: u32,
    /// 私有位, 不作任何用途
    pub _private_bits: u32,
    /// 比例因子选择信息 [channel][band]
    pub scfsi: [[u8; 4]; 2],
    /// [granule][channel]
    pub granules: [[Granule; GRANULES]; 2],
}

impl SideInfo {
    /// 从源中读取并解析侧边信息
    pub fn read<R: Read>(source: &mut Source<R>, header: &FrameHeader) -> Mp3Result<SideInfo> {
        let size = header.side_info_size();
        let mut buf = vec![0u8; size];
        if source.read_full(&mut buf)? < size {
            return Err(Mp3Error::UnexpectedEof("侧边信息"));
        }
        let mut s = BitReader::new(buf);

        let nch = header.number_of_channels();
        let mut si = SideInfo {
            main_data_begin: s.read_bits(9),
            _private_bits: 0,
            scfsi: [[0; 4]; 2],
            granules: [[Granule::default(); GRANULES]; 2],
        };

        // 私有位: 单声道 5 位, 立体声 3 位
        si._private_bits = if header.mode() == ChannelMode::SingleChannel {
            s.read_bits(5)
        } else {
            s.read_bits(3)
        };

        for ch in 0..nch {
            for band in 0..4 {
                si.scfsi[ch][band] = s.read_bits(1) as u8;
            }
        }

        for gr in 0..GRANULES {
            for ch in 0..nch {
                let g = &mut si.granules[gr][ch];
                g.part2_3_length = s.read_bits(12);
                g.big_values = s.read_bits(9);
                g.global_gain = s.read_bits(8);
                g.scalefac_compress = s.read_bits(4);
                g.win_switch_flag = s.read_bool();

                if g.win_switch_flag {
                    g.block_type = s.read_bits(2) as u8;
                    g.mixed_block_flag = s.read_bool();
                    for region in 0..2 {
                        g.table_select[region] = s.read_bits(5) as u8;
                    }
                    for window in 0..3 {
                        g.subblock_gain[window] = s.read_bits(3) as u8;
                    }
                    // 窗口切换时 region 计数不在码流中, 取隐式值.
                    // 标准在此处的表述有误: region1_count 以 20 - region0_count 补齐.
                    g.region0_count = if g.block_type == 2 && !g.mixed_block_flag {
                        8
                    } else {
                        7
                    };
                    g.region1_count = 20 - g.region0_count;
                } else {
                    for region in 0..3 {
                        g.table_select[region] = s.read_bits(5) as u8;
                    }
                    g.region0_count = s.read_bits(4);
                    g.region1_count = s.read_bits(3);
                    g.block_type = 0;
                }

                g.preflag = s.read_bool();
                g.scalefac_scale = s.read_bool();
                g.count1table_select = s.read_bool();
            }
        }

        Ok(si)
    }
}
