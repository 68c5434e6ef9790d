//! MP3 混叠消除 (Alias Reduction)
//!
//! 在相邻子带边界的 8 对频线上做蝴蝶运算. 纯短块不做混叠消除;
//! 混合块仅处理前两个子带之间的边界.

use crate::header::SAMPLES_PER_GR;
use crate::side_info::Granule;

/// 蝴蝶系数 cs[i] = 1/sqrt(1+ci^2), ca[i] = ci/sqrt(1+ci^2)
const CS: [f32; 8] = [
    0.857493, 0.881742, 0.949629, 0.983315, 0.995518, 0.999161, 0.999899, 0.999993,
];
const CA: [f32; 8] = [
    -0.514496, -0.471732, -0.313377, -0.181913, -0.094574, -0.040966, -0.014199, -0.003700,
];

/// 对一个 (granule, channel) 的频谱做混叠消除
pub fn antialias(g: &Granule, is: &mut [f32; SAMPLES_PER_GR]) {
    if g.win_switch_flag && g.block_type == 2 && !g.mixed_block_flag {
        return;
    }
    let sblim = if g.win_switch_flag && g.block_type == 2 && g.mixed_block_flag {
        2
    } else {
        32
    };

    for sb in 1..sblim {
        for i in 0..8 {
            let li = 18 * sb - 1 - i;
            let ui = 18 * sb + i;
            let lb = is[li] * CS[i] - is[ui] * CA[i];
            let ub = is[ui] * CS[i] + is[li] * CA[i];
            is[li] = lb;
            is[ui] = ub;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pure_short_block_skipped() {
        let g = Granule {
            win_switch_flag: true,
            block_type: 2,
            ..Granule::default()
        };
        let mut is = [1.0f32; SAMPLES_PER_GR];
        antialias(&g, &mut is);
        assert!(is.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_mixed_block_only_first_boundary() {
        let g = Granule {
            win_switch_flag: true,
            block_type: 2,
            mixed_block_flag: true,
            ..Granule::default()
        };
        let mut is = [1.0f32; SAMPLES_PER_GR];
        antialias(&g, &mut is);
        // 子带 0/1 边界 (频线 10..26) 被变换
        assert!((is[17] - (CS[0] - CA[0])).abs() < 1e-6);
        // 子带 1/2 边界保持不变
        assert_eq!(is[35], 1.0);
        assert_eq!(is[36], 1.0);
    }

    /// 蝴蝶系数满足 cs^2 + ca^2 = 1, 变换保持能量
    #[test]
    fn test_butterfly_preserves_energy() {
        let g = Granule::default();
        let mut is = [0.0f32; SAMPLES_PER_GR];
        for (i, v) in is.iter_mut().enumerate() {
            *v = ((i * 31 + 7) % 13) as f32 - 6.0;
        }
        let before: f64 = is.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
        antialias(&g, &mut is);
        let after: f64 = is.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
        assert!((before - after).abs() / before < 1e-4);
    }
}
