//! MP3 反量化 (Requantization)
//!
//! 将 Huffman 解码出的整数频线原地替换为浮点频谱值:
//!
//! ```text
//! xr = sign(is) * |is|^(4/3) * 2^(exp/4)
//! ```
//!
//! 指数由 global_gain, 比例因子, preflag 预加重与 (短块的)
//! subblock_gain 组合而成.

use crate::header::{FrameHeader, SAMPLES_PER_GR};
use crate::maindata::MainData;
use crate::side_info::Granule;
use crate::tables::{PRETAB, SF_BAND_INDICES_LONG, SF_BAND_INDICES_SHORT};
use std::sync::OnceLock;

/// 表项数: |is| 最大为 15 + (2^13 - 1) = 8206 (最大 linbits 扩展), 再加 1
const POW43_SIZE: usize = 8207;

static POW43: OnceLock<Vec<f64>> = OnceLock::new();

/// x^(4/3) 查找表, 首次使用时计算, 进程内只读共享
fn pow43() -> &'static [f64] {
    POW43.get_or_init(|| (0..POW43_SIZE).map(|i| (i as f64).powf(4.0 / 3.0)).collect())
}

/// 长块单样本反量化
fn process_long(g: &Granule, scalefac_l: &[u8; 21], is: &mut [f32; SAMPLES_PER_GR], i: usize, sfb: usize) {
    let sf_mult = if g.scalefac_scale { 1.0 } else { 0.5 };
    let pf_x_pt = if g.preflag { PRETAB[sfb] } else { 0.0 };
    let sf = if sfb < 21 { f64::from(scalefac_l[sfb]) } else { 0.0 };
    let idx =
        -(sf_mult * (sf + pf_x_pt)) + 0.25 * (f64::from(g.global_gain) - 210.0);
    let tmp1 = 2.0f64.powf(idx);

    let v = is[i];
    let tmp2 = if v < 0.0 {
        -pow43()[(-v) as usize]
    } else {
        pow43()[v as usize]
    };
    is[i] = (tmp1 * tmp2) as f32;
}

/// 短块单样本反量化 (窗口 win 带独立增益与比例因子)
fn process_short(
    g: &Granule,
    scalefac_s: &[[u8; 3]; 12],
    is: &mut [f32; SAMPLES_PER_GR],
    i: usize,
    sfb: usize,
    win: usize,
) {
    let sf_mult = if g.scalefac_scale { 1.0 } else { 0.5 };
    let sf = if sfb < 12 { f64::from(scalefac_s[sfb][win]) } else { 0.0 };
    let idx = -(sf_mult * sf)
        + 0.25
            * (f64::from(g.global_gain) - 210.0 - 8.0 * f64::from(g.subblock_gain[win]));
    let tmp1 = 2.0f64.powf(idx);

    let v = is[i];
    let tmp2 = if v < 0.0 {
        -pow43()[(-v) as usize]
    } else {
        pow43()[v as usize]
    };
    is[i] = (tmp1 * tmp2) as f32;
}

/// 对一个 (granule, channel) 做反量化. count1 之后的样本保持为 0.
pub fn requantize(header: &FrameHeader, side_info_granule: &Granule, main_data: &mut MainData, gr: usize, ch: usize) {
    let g = side_info_granule;
    let sfreq = header.sampling_frequency();
    let long = &SF_BAND_INDICES_LONG[sfreq];
    let short = &SF_BAND_INDICES_SHORT[sfreq];
    let count1 = g.count1;

    if g.win_switch_flag && g.block_type == 2 {
        if g.mixed_block_flag {
            // 混合块: 前 36 个样本 (长块 sfb 0-7) 走长块公式
            let scalefac_l = main_data.scalefac_l[gr][ch];
            let scalefac_s = main_data.scalefac_s[gr][ch];
            let is = &mut main_data.is[gr][ch];
            let mut sfb = 0;
            let mut next_sfb = long[sfb + 1];
            for i in 0..36 {
                if i == next_sfb {
                    sfb += 1;
                    next_sfb = long[sfb + 1];
                }
                process_long(g, &scalefac_l, is, i, sfb);
            }
            // 其余样本为短块, 三窗口交织
            let mut sfb = 3;
            let mut next_sfb = short[sfb + 1] * 3;
            let mut win_len = short[sfb + 1] - short[sfb];
            let mut i = 36;
            while i < count1 {
                if i == next_sfb {
                    sfb += 1;
                    next_sfb = short[sfb + 1] * 3;
                    win_len = short[sfb + 1] - short[sfb];
                }
                for win in 0..3 {
                    for _ in 0..win_len {
                        if i >= count1 {
                            return;
                        }
                        process_short(g, &scalefac_s, is, i, sfb, win);
                        i += 1;
                    }
                }
            }
        } else {
            // 纯短块
            let scalefac_s = main_data.scalefac_s[gr][ch];
            let is = &mut main_data.is[gr][ch];
            let mut sfb = 0;
            let mut next_sfb = short[sfb + 1] * 3;
            let mut win_len = short[sfb + 1] - short[sfb];
            let mut i = 0;
            while i < count1 {
                if i == next_sfb {
                    sfb += 1;
                    next_sfb = short[sfb + 1] * 3;
                    win_len = short[sfb + 1] - short[sfb];
                }
                for win in 0..3 {
                    for _ in 0..win_len {
                        if i >= count1 {
                            return;
                        }
                        process_short(g, &scalefac_s, is, i, sfb, win);
                        i += 1;
                    }
                }
            }
        }
    } else {
        // 长块
        let scalefac_l = main_data.scalefac_l[gr][ch];
        let is = &mut main_data.is[gr][ch];
        let mut sfb = 0;
        let mut next_sfb = long[sfb + 1];
        for i in 0..count1 {
            if i == next_sfb {
                sfb += 1;
                next_sfb = long[sfb + 1];
            }
            process_long(g, &scalefac_l, is, i, sfb);
        }
    }
}
