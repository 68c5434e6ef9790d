//! 比特储备库与主数据读取
//!
//! 主数据 (比例因子 + Huffman 编码频线) 可以跨帧存放: 当前帧的
//! `main_data_begin` 指示要从之前帧的主数据尾部回溯多少字节.
//! 本模块负责拼接储备库缓冲区, 再从同一个位游标依次读出比例因子
//! 与频线. 历史不足时消费本帧字节保持储备库连续, 并报告可恢复的
//! [`Mp3Error::InsufficientReservoir`].

use crate::bitreader::BitReader;
use crate::error::{Mp3Error, Mp3Result};
use crate::header::{FrameHeader, GRANULES, SAMPLES_PER_GR};
use crate::huffman;
use crate::side_info::SideInfo;
use crate::source::Source;
use crate::tables::{SCALEFAC_SIZES, SF_BAND_INDICES_LONG};
use std::io::Read;

/// 一帧的主数据: 比例因子与 576 条频线 (整数值, 反量化阶段原地替换为浮点)
#[derive(Debug, Clone)]
pub struct MainData {
    pub scalefac_l: [[[u8; 21]; 2]; GRANULES],
    pub scalefac_s: [[[[u8; 3]; 12]; 2]; GRANULES],
    pub is: [[[f32; SAMPLES_PER_GR]; 2]; GRANULES],
}

impl Default for MainData {
    fn default() -> Self {
        Self {
            scalefac_l: [[[0; 21]; 2]; GRANULES],
            scalefac_s: [[[[0; 3]; 12]; 2]; GRANULES],
            is: [[[0.0; SAMPLES_PER_GR]; 2]; GRANULES],
        }
    }
}

/// 读取一帧主数据.
///
/// `reservoir` 为解码器持有的上一帧主数据缓冲, 调用后原地替换为
/// 本帧拼接出的缓冲区 (下一帧的储备库). 历史不足时返回
/// `InsufficientReservoir`, 此时储备库已含本帧字节, 数值解码应跳过.
pub fn read<R: Read>(
    source: &mut Source<R>,
    reservoir: &mut Option<BitReader>,
    header: &FrameHeader,
    side_info: &mut SideInfo,
) -> Mp3Result<Box<MainData>> {
    // 主数据大小 = 帧长 - 侧边信息 - 帧头 4 字节 - 可选 CRC 2 字节
    let mut size = header.frame_size() - header.side_info_size() - 4;
    if header.protection_bit() == 0 {
        size -= 2;
    }
    if size > 1500 {
        return Err(Mp3Error::Malformed(format!("main_data_size = {size}")));
    }

    let mut m = assemble(source, reservoir, size, side_info.main_data_begin as usize)?;

    let nch = header.number_of_channels();
    let mut md = Box::new(MainData::default());
    for gr in 0..GRANULES {
        for ch in 0..nch {
            let part_2_start = m.bit_position();
            read_scalefactors(&mut m, side_info, &mut md, gr, ch);
            read_huffman(&mut m, header, side_info, &mut md, part_2_start, gr, ch)?;
        }
    }
    // 此后的附属数据被忽略; 整个缓冲区成为下一帧的储备库
    *reservoir = Some(m);
    Ok(md)
}

/// 拼接储备库尾部与本帧新读入的主数据字节
fn assemble<R: Read>(
    source: &mut Source<R>,
    reservoir: &mut Option<BitReader>,
    size: usize,
    offset: usize,
) -> Mp3Result<BitReader> {
    let available = reservoir.as_ref().map_or(0, |b| b.len_in_bytes());
    if offset > available {
        // 历史不足: 本帧无法解码, 但字节必须读入以保持下一帧对齐
        let mut buf = vec![0u8; size];
        if source.read_full(&mut buf)? < size {
            return Err(Mp3Error::UnexpectedEof("主数据 (1)"));
        }
        let prev = reservoir.take().unwrap_or_default();
        *reservoir = Some(prev.append(&buf));
        return Err(Mp3Error::InsufficientReservoir {
            needed: offset,
            available,
        });
    }

    let mut vec = match reservoir.take() {
        Some(prev) => prev.tail(offset).to_vec(),
        None => Vec::new(),
    };
    let start = vec.len();
    vec.resize(start + size, 0);
    if source.read_full(&mut vec[start..])? < size {
        return Err(Mp3Error::UnexpectedEof("主数据 (2)"));
    }
    Ok(BitReader::new(vec))
}

/// 读取一个 (granule, channel) 的比例因子.
///
/// 长块分 4 组 (0-5, 6-10, 11-15, 16-20), gr=1 时 scfsi 置位的组
/// 直接复用 gr=0 的值; 短块按带逐窗口读取, 混合块先读 8 个长块带.
fn read_scalefactors(
    m: &mut BitReader,
    side_info: &SideInfo,
    md: &mut MainData,
    gr: usize,
    ch: usize,
) {
    let g = &side_info.granules[gr][ch];
    let (slen1, slen2) = SCALEFAC_SIZES[g.scalefac_compress as usize];

    if g.win_switch_flag && g.block_type == 2 {
        if g.mixed_block_flag {
            for sfb in 0..8 {
                md.scalefac_l[gr][ch][sfb] = m.read_bits(slen1) as u8;
            }
            for sfb in 3..12 {
                let nbits = if sfb < 6 { slen1 } else { slen2 };
                for win in 0..3 {
                    md.scalefac_s[gr][ch][sfb][win] = m.read_bits(nbits) as u8;
                }
            }
        } else {
            for sfb in 0..12 {
                let nbits = if sfb < 6 { slen1 } else { slen2 };
                for win in 0..3 {
                    md.scalefac_s[gr][ch][sfb][win] = m.read_bits(nbits) as u8;
                }
            }
        }
    } else {
        // 长块: 4 组, 位宽 slen1, slen1, slen2, slen2
        const GROUPS: [(usize, usize); 4] = [(0, 6), (6, 11), (11, 16), (16, 21)];
        for (band, &(start, end)) in GROUPS.iter().enumerate() {
            if side_info.scfsi[ch][band] == 0 || gr == 0 {
                let nbits = if band < 2 { slen1 } else { slen2 };
                for sfb in start..end {
                    md.scalefac_l[gr][ch][sfb] = m.read_bits(nbits) as u8;
                }
            } else {
                // scfsi 置位: 从 granule 0 复制
                for sfb in start..end {
                    md.scalefac_l[1][ch][sfb] = md.scalefac_l[0][ch][sfb];
                }
            }
        }
    }
}

/// 读取一个 (granule, channel) 的 Huffman 编码频线.
///
/// big_values 区按 region 选表成对解码; count1 区以四元组解码至
/// 比特预算耗尽或频线填满. 游标最终精确落在
/// `part_2_start + part2_3_length` 处.
fn read_huffman(
    m: &mut BitReader,
    header: &FrameHeader,
    side_info: &mut SideInfo,
    md: &mut MainData,
    part_2_start: usize,
    gr: usize,
    ch: usize,
) -> Mp3Result<()> {
    let g = &side_info.granules[gr][ch];
    if g.part2_3_length == 0 {
        md.is[gr][ch] = [0.0; SAMPLES_PER_GR];
        side_info.granules[gr][ch].count1 = 0;
        return Ok(());
    }
    let bit_pos_end = part_2_start + g.part2_3_length as usize - 1;

    // region 边界 (样本索引)
    let (region_1_start, region_2_start) = if g.win_switch_flag && g.block_type == 2 {
        (36, SAMPLES_PER_GR) // 短块无 region2
    } else {
        let l = &SF_BAND_INDICES_LONG[header.sampling_frequency()];
        let i = g.region0_count as usize + 1;
        let j = g.region0_count as usize + g.region1_count as usize + 2;
        if i >= l.len() || j >= l.len() {
            return Err(Mp3Error::Malformed(format!(
                "region 边界索引越界: {i}, {j}"
            )));
        }
        (l[i], l[j])
    };

    let big_values = g.big_values as usize * 2;
    if big_values > SAMPLES_PER_GR {
        return Err(Mp3Error::Malformed(format!("big_values = {}", g.big_values)));
    }

    // big_values 区: 每个码字两条频线
    let mut is_pos = 0;
    while is_pos < big_values {
        let table_num = if is_pos < region_1_start {
            g.table_select[0]
        } else if is_pos < region_2_start {
            g.table_select[1]
        } else {
            g.table_select[2]
        };
        let (x, y) = huffman::decode_big_values(m, table_num as usize)?;
        md.is[gr][ch][is_pos] = x as f32;
        md.is[gr][ch][is_pos + 1] = y as f32;
        is_pos += 2;
    }

    // count1 区: 每个码字四条频线, 读到比特预算或频线上限为止
    let table_num = if g.count1table_select { 33 } else { 32 };
    while is_pos <= 572 && m.bit_position() <= bit_pos_end {
        let (v, w, x, y) = huffman::decode_count1(m, table_num)?;
        md.is[gr][ch][is_pos] = v as f32;
        md.is[gr][ch][is_pos + 1] = w as f32;
        md.is[gr][ch][is_pos + 2] = x as f32;
        md.is[gr][ch][is_pos + 3] = y as f32;
        is_pos += 4;
    }

    // 最后一个四元组可能用到了越界比特, 其值不可信, 丢弃
    if m.bit_position() > bit_pos_end + 1 && is_pos > big_values {
        is_pos -= 4;
    }
    side_info.granules[gr][ch].count1 = is_pos;

    // rzero 区清零
    for v in md.is[gr][ch][is_pos..].iter_mut() {
        *v = 0.0;
    }
    // 跳过填充位, 游标对齐到下一部分
    m.set_bit_position(bit_pos_end + 1);
    Ok(())
}
