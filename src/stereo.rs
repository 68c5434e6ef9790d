//! MP3 联合立体声处理 (MS Stereo 与 Intensity Stereo)
//!
//! MS 立体声: 对两声道 count1 上界内的频线做中/侧分量重建
//! `(L, R) <- ((M+S)/sqrt2, (M-S)/sqrt2)`.
//!
//! 强度立体声: 右声道 count1 之上的比例因子带仅传输强度位置
//! (借用左声道比例因子), 按比率表拆回左右声道.

use crate::header::FrameHeader;
use crate::maindata::MainData;
use crate::side_info::SideInfo;
use crate::tables::{SF_BAND_INDICES_LONG, SF_BAND_INDICES_SHORT};

/// tan(is_pos * pi / 12), is_pos 0-5
const IS_RATIOS: [f32; 6] = [0.000000, 0.267949, 0.577350, 1.000000, 1.732051, 3.732051];

const INV_SQRT2: f32 = std::f32::consts::SQRT_2 / 2.0;

/// 由强度位置求 (左, 右) 比率. is_pos = 6 对应 tan(pi/2), 单独处理.
fn intensity_ratio(is_pos: u8) -> (f32, f32) {
    if is_pos == 6 {
        (1.0, 0.0)
    } else {
        let t = IS_RATIOS[is_pos as usize];
        (t / (1.0 + t), 1.0 / (1.0 + t))
    }
}

/// 长块单带强度立体声
fn process_intensity_long(
    header: &FrameHeader,
    main_data: &mut MainData,
    gr: usize,
    sfb: usize,
) {
    // is_pos >= 7 表示该带不做强度立体声
    let is_pos = main_data.scalefac_l[gr][0][sfb];
    if is_pos >= 7 {
        return;
    }
    let long = &SF_BAND_INDICES_LONG[header.sampling_frequency()];
    let (ratio_l, ratio_r) = intensity_ratio(is_pos);
    for i in long[sfb]..long[sfb + 1] {
        let m = main_data.is[gr][0][i];
        main_data.is[gr][0][i] = m * ratio_l;
        main_data.is[gr][1][i] = m * ratio_r;
    }
}

/// 短块单带强度立体声, 三个窗口各有独立强度位置
fn process_intensity_short(
    header: &FrameHeader,
    main_data: &mut MainData,
    gr: usize,
    sfb: usize,
) {
    let short = &SF_BAND_INDICES_SHORT[header.sampling_frequency()];
    let win_len = short[sfb + 1] - short[sfb];
    for win in 0..3 {
        let is_pos = main_data.scalefac_s[gr][0][sfb][win];
        if is_pos >= 7 {
            continue;
        }
        let (ratio_l, ratio_r) = intensity_ratio(is_pos);
        let start = short[sfb] * 3 + win_len * win;
        for i in start..start + win_len {
            let m = main_data.is[gr][0][i];
            main_data.is[gr][0][i] = m * ratio_l;
            main_data.is[gr][1][i] = m * ratio_r;
        }
    }
}

/// 对一个 granule 做联合立体声重建 (双声道, 联合立体声模式时生效)
pub fn stereo(header: &FrameHeader, side_info: &SideInfo, main_data: &mut MainData, gr: usize) {
    if header.use_ms_stereo() {
        // 变换范围取两声道 count1 的较大者
        let max_pos = side_info.granules[gr][0]
            .count1
            .max(side_info.granules[gr][1].count1);
        let (ch0, ch1) = main_data.is[gr].split_at_mut(1);
        let (left, right) = (&mut ch0[0], &mut ch1[0]);
        for i in 0..max_pos {
            let mid = left[i];
            let side = right[i];
            left[i] = (mid + side) * INV_SQRT2;
            right[i] = (mid - side) * INV_SQRT2;
        }
    }

    if header.use_intensity_stereo() {
        let sfreq = header.sampling_frequency();
        let long = &SF_BAND_INDICES_LONG[sfreq];
        let short = &SF_BAND_INDICES_SHORT[sfreq];
        // 仅处理右声道 count1 之上的比例因子带
        let right_count1 = side_info.granules[gr][1].count1;
        let g0 = &side_info.granules[gr][0];

        if g0.win_switch_flag && g0.block_type == 2 {
            if g0.mixed_block_flag {
                for sfb in 0..8 {
                    if long[sfb] >= right_count1 {
                        process_intensity_long(header, main_data, gr, sfb);
                    }
                }
                for sfb in 3..12 {
                    if short[sfb] * 3 >= right_count1 {
                        process_intensity_short(header, main_data, gr, sfb);
                    }
                }
            } else {
                for sfb in 0..12 {
                    if short[sfb] * 3 >= right_count1 {
                        process_intensity_short(header, main_data, gr, sfb);
                    }
                }
            }
        } else {
            for sfb in 0..21 {
                if long[sfb] >= right_count1 {
                    process_intensity_long(header, main_data, gr, sfb);
                }
            }
        }
    }
}
