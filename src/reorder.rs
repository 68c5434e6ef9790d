//! MP3 短块重排序 (Reordering)
//!
//! 短块的频线按 "带内三窗口交织" 传输; 本阶段把每个短块比例因子带
//! 重排为 `re[j*3 + win]` 布局, 使后续混叠消除与 IMDCT 按窗口分组
//! 看到连续频率. 混合块从样本 36 (sfb 3) 开始重排, 前两个子带保持原样.

use crate::header::{FrameHeader, SAMPLES_PER_GR};
use crate::side_info::Granule;
use crate::tables::SF_BAND_INDICES_SHORT;

/// 对一个 (granule, channel) 的频谱做短块重排序. 长块直接返回.
pub fn reorder(header: &FrameHeader, g: &Granule, is: &mut [f32; SAMPLES_PER_GR]) {
    if !(g.win_switch_flag && g.block_type == 2) {
        return;
    }

    let short = &SF_BAND_INDICES_SHORT[header.sampling_frequency()];
    let mut re = [0.0f32; SAMPLES_PER_GR];

    // 混合块的前两个子带 (36 个样本, 长块 sfb 0-7) 不参与重排
    let mut sfb = if g.mixed_block_flag { 3 } else { 0 };
    let mut next_sfb = short[sfb + 1] * 3;
    let mut win_len = short[sfb + 1] - short[sfb];
    let mut i = if sfb == 0 { 0 } else { 36 };

    while i < SAMPLES_PER_GR {
        if i == next_sfb {
            // 整带重排完成, 写回原缓冲区
            let j = 3 * short[sfb];
            is[j..j + 3 * win_len].copy_from_slice(&re[..3 * win_len]);
            // 该带已在 rzero 区之上时后续全为 0, 无需继续
            if i >= g.count1 {
                return;
            }
            sfb += 1;
            next_sfb = short[sfb + 1] * 3;
            win_len = short[sfb + 1] - short[sfb];
        }
        for win in 0..3 {
            for j in 0..win_len {
                re[j * 3 + win] = is[i];
                i += 1;
            }
        }
    }
    // 最后一带 (sfb 12) 写回
    let j = 3 * short[12];
    is[j..j + 3 * win_len].copy_from_slice(&re[..3 * win_len]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_header() -> FrameHeader {
        FrameHeader::new(0xFFFB_9000)
    }

    fn short_granule() -> Granule {
        Granule {
            win_switch_flag: true,
            block_type: 2,
            count1: SAMPLES_PER_GR,
            ..Granule::default()
        }
    }

    #[test]
    fn test_long_block_untouched() {
        let mut is = [0.0f32; SAMPLES_PER_GR];
        for (i, v) in is.iter_mut().enumerate() {
            *v = i as f32;
        }
        let orig = is;
        reorder(&stereo_header(), &Granule::default(), &mut is);
        assert_eq!(is, orig);
    }

    /// sfb0 宽 4: 源序 [w0:0..4, w1:4..8, w2:8..12] 重排为 j*3+win
    #[test]
    fn test_first_band_interleave() {
        let mut is = [0.0f32; SAMPLES_PER_GR];
        for (i, v) in is.iter_mut().enumerate() {
            *v = i as f32;
        }
        reorder(&stereo_header(), &short_granule(), &mut is);
        // 重排后: re[j*3+win] = 原 win*4+j
        assert_eq!(is[0], 0.0); // j=0 win=0
        assert_eq!(is[1], 4.0); // j=0 win=1
        assert_eq!(is[2], 8.0); // j=0 win=2
        assert_eq!(is[3], 1.0); // j=1 win=0
        assert_eq!(is[11], 11.0); // j=3 win=2
    }

    #[test]
    fn test_mixed_block_preserves_long_part() {
        let mut is = [0.0f32; SAMPLES_PER_GR];
        for (i, v) in is.iter_mut().enumerate() {
            *v = i as f32;
        }
        let mut g = short_granule();
        g.mixed_block_flag = true;
        reorder(&stereo_header(), &g, &mut is);
        for i in 0..36 {
            assert_eq!(is[i], i as f32, "样本 {i} 不应被重排");
        }
        // sfb3 宽 4, 起始 36: re[j*3+win] = 原 36 + win*4 + j
        assert_eq!(is[36], 36.0);
        assert_eq!(is[37], 40.0);
        assert_eq!(is[38], 44.0);
    }
}
