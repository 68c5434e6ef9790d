//! MP3 Huffman 解码器
//!
//! 使用快速查找表实现码字解码: 码长不超过 PEEK_BITS 的码字直接查表,
//! 更长的码字走溢出表逐码长比对. 查找表在首次使用时由
//! [`crate::tables::HUFFMAN_CODEBOOKS`] 的 (码字, 码长) 数据构建一次,
//! 此后进程内只读共享.

use crate::bitreader::BitReader;
use crate::error::{Mp3Error, Mp3Result};
use crate::tables::HUFFMAN_CODEBOOKS;
use std::sync::OnceLock;

/// 直接查表的窗口位数
const PEEK_BITS: usize = 10;
const PEEK_SIZE: usize = 1 << PEEK_BITS;

/// 查找表条目. bits 为 0 表示码长超过窗口, 需查溢出表.
#[derive(Debug, Clone, Copy, Default)]
struct LutEntry {
    symbol: u8,
    bits: u8,
}

/// 单张码本的解码结构
#[derive(Debug, Clone, Default)]
struct VlcTable {
    lut: Vec<LutEntry>,
    /// 码长大于 PEEK_BITS 的 (码字, 码长, 符号) 条目
    overflow: Vec<(u32, u8, u8)>,
    max_len: u8,
    linbits: u32,
}

static VLC_TABLES: OnceLock<Vec<VlcTable>> = OnceLock::new();

fn vlc_tables() -> &'static [VlcTable] {
    VLC_TABLES.get_or_init(|| {
        HUFFMAN_CODEBOOKS
            .iter()
            .map(|entry| entry.as_ref().map(build_vlc_table).unwrap_or_default())
            .collect()
    })
}

/// 由 (码字, 码长) 数据构建查找表.
/// 符号按码本的行主序展开: symbol = ((i / wrap) << 4) | (i % wrap);
/// count1 表 (wrap=16) 的符号即 4 位 (v,w,x,y) 组合本身.
fn build_vlc_table(t: &crate::tables::HuffmanCodebook) -> VlcTable {
    let mut lut = vec![LutEntry::default(); PEEK_SIZE];
    let mut overflow = Vec::new();
    let mut max_len = 0u8;

    for (i, (&code, &len)) in t.codes.iter().zip(t.lengths.iter()).enumerate() {
        let symbol = (((i / t.wrap) as u8) << 4) | (i % t.wrap) as u8;
        max_len = max_len.max(len);
        if (len as usize) <= PEEK_BITS {
            // 码字占据 LUT 中整个补齐子区间
            let pad = PEEK_BITS - len as usize;
            let base = (code as usize) << pad;
            for slot in &mut lut[base..base + (1 << pad)] {
                *slot = LutEntry { symbol, bits: len };
            }
        } else {
            overflow.push((u32::from(code), len, symbol));
        }
    }

    VlcTable {
        lut,
        overflow,
        max_len,
        linbits: t.linbits,
    }
}

/// 解码单个码字符号并推进游标
fn decode_symbol(m: &mut BitReader, t: &VlcTable) -> Mp3Result<u8> {
    let start = m.bit_position();
    let peek = m.read_bits(PEEK_BITS as u32) as usize;
    let entry = t.lut[peek];
    if entry.bits > 0 {
        m.set_bit_position(start + entry.bits as usize);
        return Ok(entry.symbol);
    }

    // 长码: 逐码长扩大窗口与溢出表比对
    for len in (PEEK_BITS as u8 + 1)..=t.max_len {
        m.set_bit_position(start);
        let bits = m.read_bits(u32::from(len));
        for &(code, code_len, symbol) in &t.overflow {
            if code_len == len && code == bits {
                m.set_bit_position(start + len as usize);
                return Ok(symbol);
            }
        }
    }

    m.set_bit_position(start);
    Err(Mp3Error::Malformed("Huffman 码字解码失败".into()))
}

/// 分量符号位: 非零分量后跟 1 位符号 (1 为负)
fn apply_sign(m: &mut BitReader, value: i32) -> i32 {
    if value != 0 && m.read_bool() {
        -value
    } else {
        value
    }
}

/// 解码 big_values 区的一对 (x, y).
///
/// 表 0 不消费任何比特, 恒返回 (0, 0); 表 4/14 为保留表, 视为码流损坏.
pub fn decode_big_values(m: &mut BitReader, table_num: usize) -> Mp3Result<(i32, i32)> {
    if table_num == 0 {
        return Ok((0, 0));
    }
    if table_num == 4 || table_num == 14 || table_num > 31 {
        return Err(Mp3Error::Malformed(format!("保留的 Huffman 表 {table_num}")));
    }

    let t = &vlc_tables()[table_num];
    let symbol = decode_symbol(m, t)?;
    let mut x = i32::from(symbol >> 4);
    let mut y = i32::from(symbol & 0x0F);

    // 转义值: 分量达到 15 时由 linbits 扩展, 随后各自读符号位
    if x == 15 && t.linbits > 0 {
        x += m.read_bits(t.linbits) as i32;
    }
    x = apply_sign(m, x);
    if y == 15 && t.linbits > 0 {
        y += m.read_bits(t.linbits) as i32;
    }
    y = apply_sign(m, y);

    Ok((x, y))
}

/// 解码 count1 区的四元组 (v, w, x, y). table_num 为 32 或 33.
pub fn decode_count1(m: &mut BitReader, table_num: usize) -> Mp3Result<(i32, i32, i32, i32)> {
    debug_assert!(table_num == 32 || table_num == 33);
    let t = &vlc_tables()[table_num];
    let symbol = decode_symbol(m, t)?;

    let v = apply_sign(m, i32::from((symbol >> 3) & 1));
    let w = apply_sign(m, i32::from((symbol >> 2) & 1));
    let x = apply_sign(m, i32::from((symbol >> 1) & 1));
    let y = apply_sign(m, i32::from(symbol & 1));
    Ok((v, w, x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 把 (码字, 码长) 序列编码为字节缓冲区
    struct Encoder {
        bytes: Vec<u8>,
        bit: usize,
    }

    impl Encoder {
        fn new() -> Self {
            Self {
                bytes: Vec::new(),
                bit: 0,
            }
        }

        fn push(&mut self, code: u32, len: u32) {
            for i in (0..len).rev() {
                if self.bit % 8 == 0 {
                    self.bytes.push(0);
                }
                let b = ((code >> i) & 1) as u8;
                *self.bytes.last_mut().unwrap() |= b << (7 - (self.bit % 8));
                self.bit += 1;
            }
        }

        fn finish(mut self) -> Vec<u8> {
            // 末尾补零字节, 保证解码窗口可越过最后一个码字
            self.bytes.extend_from_slice(&[0u8; 4]);
            self.bytes
        }
    }

    /// 表 1 已知码字 (ISO 11172-3 表 B.7):
    /// (0,0)=1, (0,1)=001, (1,0)=01, (1,1)=000
    #[test]
    fn test_table1_known_codes() {
        // 序列: (0,0) (+1,0) (0,+1) (+1,+1), 非零分量跟 0 符号位
        // 1 | 01 0 | 001 0 | 000 0 0 -> 1010_0010_0000
        let mut m = BitReader::new(vec![0xA2, 0x00, 0x00]);
        assert_eq!(decode_big_values(&mut m, 1).unwrap(), (0, 0));
        assert_eq!(decode_big_values(&mut m, 1).unwrap(), (1, 0));
        assert_eq!(decode_big_values(&mut m, 1).unwrap(), (0, 1));
        assert_eq!(decode_big_values(&mut m, 1).unwrap(), (1, 1));
        assert_eq!(m.bit_position(), 13);
    }

    #[test]
    fn test_sign_bits_negative() {
        // 表 1: (1,1)="000", 符号位 1,1 -> (-1,-1)
        let mut enc = Encoder::new();
        enc.push(0b000, 3);
        enc.push(1, 1);
        enc.push(1, 1);
        let mut m = BitReader::new(enc.finish());
        assert_eq!(decode_big_values(&mut m, 1).unwrap(), (-1, -1));
    }

    #[test]
    fn test_linbits_escape() {
        // 表 16 (linbits=1): 符号 (15,0) 的码字, x=15 后读 1 位 linbits
        let cb = HUFFMAN_CODEBOOKS[16].as_ref().unwrap();
        let idx = 15 * cb.wrap; // (x=15, y=0)
        let mut enc = Encoder::new();
        enc.push(u32::from(cb.codes[idx]), u32::from(cb.lengths[idx]));
        enc.push(1, 1); // linbits: +1
        enc.push(0, 1); // x 符号位: 正
        let mut m = BitReader::new(enc.finish());
        assert_eq!(decode_big_values(&mut m, 16).unwrap(), (16, 0));
    }

    #[test]
    fn test_reserved_tables_rejected() {
        for num in [4usize, 14] {
            let mut m = BitReader::new(vec![0xFF; 4]);
            assert!(matches!(
                decode_big_values(&mut m, num),
                Err(Mp3Error::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_table0_consumes_nothing() {
        let mut m = BitReader::new(vec![0xFF; 4]);
        assert_eq!(decode_big_values(&mut m, 0).unwrap(), (0, 0));
        assert_eq!(m.bit_position(), 0);
    }

    /// 对每张 big_values 码本的每个符号做编码 -> 解码往返,
    /// 验证 LUT 构建与溢出表解码的一致性.
    #[test]
    fn test_all_big_value_tables_round_trip() {
        for num in 1..32usize {
            let Some(cb) = HUFFMAN_CODEBOOKS[num].as_ref() else {
                continue;
            };
            for (i, (&code, &len)) in cb.codes.iter().zip(cb.lengths.iter()).enumerate() {
                let x = (i / cb.wrap) as i32;
                let y = (i % cb.wrap) as i32;

                let mut enc = Encoder::new();
                enc.push(u32::from(code), u32::from(len));
                if x == 15 && cb.linbits > 0 {
                    enc.push(0, cb.linbits);
                }
                if x > 0 {
                    enc.push(0, 1);
                }
                if y == 15 && cb.linbits > 0 {
                    enc.push(0, cb.linbits);
                }
                if y > 0 {
                    enc.push(0, 1);
                }

                let mut m = BitReader::new(enc.finish());
                let got = decode_big_values(&mut m, num).unwrap();
                assert_eq!(got, (x, y), "表 {num} 符号 ({x},{y}) 往返失败");
            }
        }
    }

    /// count1 表 A/B 的全部 16 个四元组往返
    #[test]
    fn test_count1_tables_round_trip() {
        for num in [32usize, 33] {
            let cb = HUFFMAN_CODEBOOKS[num].as_ref().unwrap();
            for sym in 0..16usize {
                let quad = (
                    ((sym >> 3) & 1) as i32,
                    ((sym >> 2) & 1) as i32,
                    ((sym >> 1) & 1) as i32,
                    (sym & 1) as i32,
                );
                let mut enc = Encoder::new();
                enc.push(u32::from(cb.codes[sym]), u32::from(cb.lengths[sym]));
                // 符号位顺序: v, w, x, y; 全取负
                for _ in 0..sym.count_ones() {
                    enc.push(1, 1);
                }
                let mut m = BitReader::new(enc.finish());
                let (v, w, x, y) = decode_count1(&mut m, num).unwrap();
                assert_eq!((v, w, x, y), (-quad.0, -quad.1, -quad.2, -quad.3));
            }
        }
    }
}
