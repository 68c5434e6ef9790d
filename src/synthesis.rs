//! MP3 多相子带合成滤波器组
//!
//! 频率反转修正 IMDCT 输出的奇子带相位; 随后每个时间行经 32->64
//! 余弦矩阵, 1024 样本 V 向量移位, 512 抽头 D 窗加权与 16 段累加,
//! 产出 32 个 PCM 样本, 饱和到 16 位有符号小端写入输出区.

use crate::header::SAMPLES_PER_GR;
use std::f64::consts::PI;
use std::sync::OnceLock;

/// 合成矩阵 N[i][j] = cos((16+i)(2j+1) * pi/64)
static SYNTH_NWIN: OnceLock<Box<[[f32; 32]; 64]>> = OnceLock::new();

fn synth_nwin() -> &'static [[f32; 32]; 64] {
    SYNTH_NWIN.get_or_init(|| {
        let mut n = Box::new([[0.0f32; 32]; 64]);
        for (i, row) in n.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (((16 + i) * (2 * j + 1)) as f64 * (PI / 64.0)).cos() as f32;
            }
        }
        n
    })
}

/// ISO/IEC 11172-3 附录 B.2 的 512 抽头合成窗口 D
#[rustfmt::skip]
const SYNTH_DTBL: [f32; 512] = [
    0.000000000, -0.000015259, -0.000015259, -0.000015259,
    -0.000015259, -0.000015259, -0.000015259, -0.000030518,
    -0.000030518, -0.000030518, -0.000030518, -0.000045776,
    -0.000045776, -0.000061035, -0.000061035, -0.000076294,
    -0.000076294, -0.000091553, -0.000106812, -0.000106812,
    -0.000122070, -0.000137329, -0.000152588, -0.000167847,
    -0.000198364, -0.000213623, -0.000244141, -0.000259399,
    -0.000289917, -0.000320435, -0.000366211, -0.000396729,
    -0.000442505, -0.000473022, -0.000534058, -0.000579834,
    -0.000625610, -0.000686646, -0.000747681, -0.000808716,
    -0.000885010, -0.000961304, -0.001037598, -0.001113892,
    -0.001205444, -0.001296997, -0.001388550, -0.001480103,
    -0.001586914, -0.001693726, -0.001785278, -0.001907349,
    -0.002014160, -0.002120972, -0.002243042, -0.002349854,
    -0.002456665, -0.002578735, -0.002685547, -0.002792358,
    -0.002899170, -0.002990723, -0.003082275, -0.003173828,
    0.003250122, 0.003326416, 0.003387451, 0.003433228,
    0.003463745, 0.003479004, 0.003479004, 0.003463745,
    0.003417969, 0.003372192, 0.003280640, 0.003173828,
    0.003051758, 0.002883911, 0.002700806, 0.002487183,
    0.002227783, 0.001937866, 0.001617432, 0.001266479,
    0.000869751, 0.000442505, -0.000030518, -0.000549316,
    -0.001098633, -0.001693726, -0.002334595, -0.003005981,
    -0.003723145, -0.004486084, -0.005294800, -0.006118774,
    -0.007003784, -0.007919312, -0.008865356, -0.009841919,
    -0.010848999, -0.011886597, -0.012939453, -0.014022827,
    -0.015121460, -0.016235352, -0.017349243, -0.018463135,
    -0.019577026, -0.020690918, -0.021789551, -0.022857666,
    -0.023910522, -0.024932861, -0.025909424, -0.026840210,
    -0.027725220, -0.028533936, -0.029281616, -0.029937744,
    -0.030532837, -0.031005859, -0.031387329, -0.031661987,
    -0.031814575, -0.031845093, -0.031738281, -0.031478882,
    0.031082153, 0.030517578, 0.029785156, 0.028884888,
    0.027801514, 0.026535034, 0.025085449, 0.023422241,
    0.021575928, 0.019531250, 0.017257690, 0.014801025,
    0.012115479, 0.009231567, 0.006134033, 0.002822876,
    -0.000686646, -0.004394531, -0.008316040, -0.012420654,
    -0.016708374, -0.021179199, -0.025817871, -0.030609131,
    -0.035552979, -0.040634155, -0.045837402, -0.051132202,
    -0.056533813, -0.061996460, -0.067520142, -0.073059082,
    -0.078628540, -0.084182739, -0.089706421, -0.095169067,
    -0.100540161, -0.105819702, -0.110946655, -0.115921021,
    -0.120697021, -0.125259399, -0.129562378, -0.133590698,
    -0.137298584, -0.140670776, -0.143676758, -0.146255493,
    -0.148422241, -0.150115967, -0.151306152, -0.151962280,
    -0.152069092, -0.151596069, -0.150497437, -0.148773193,
    -0.146362305, -0.143264771, -0.139450073, -0.134887695,
    -0.129577637, -0.123474121, -0.116577148, -0.108856201,
    0.100311279, 0.090927124, 0.080688477, 0.069595337,
    0.057617188, 0.044784546, 0.031082153, 0.016510010,
    0.001068115, -0.015228271, -0.032379150, -0.050354004,
    -0.069168091, -0.088775635, -0.109161377, -0.130310059,
    -0.152206421, -0.174789429, -0.198059082, -0.221984863,
    -0.246505737, -0.271591187, -0.297210693, -0.323318481,
    -0.349868774, -0.376800537, -0.404083252, -0.431655884,
    -0.459472656, -0.487472534, -0.515609741, -0.543823242,
    -0.572036743, -0.600219727, -0.628295898, -0.656219482,
    -0.683914185, -0.711318970, -0.738372803, -0.765029907,
    -0.791213989, -0.816864014, -0.841949463, -0.866363525,
    -0.890090942, -0.913055420, -0.935195923, -0.956481934,
    -0.976852417, -0.996246338, -1.014617920, -1.031936646,
    -1.048156738, -1.063217163, -1.077117920, -1.089782715,
    -1.101211548, -1.111373901, -1.120223999, -1.127746582,
    -1.133926392, -1.138763428, -1.142211914, -1.144287109,
    1.144989014, 1.144287109, 1.142211914, 1.138763428,
    1.133926392, 1.127746582, 1.120223999, 1.111373901,
    1.101211548, 1.089782715, 1.077117920, 1.063217163,
    1.048156738, 1.031936646, 1.014617920, 0.996246338,
    0.976852417, 0.956481934, 0.935195923, 0.913055420,
    0.890090942, 0.866363525, 0.841949463, 0.816864014,
    0.791213989, 0.765029907, 0.738372803, 0.711318970,
    0.683914185, 0.656219482, 0.628295898, 0.600219727,
    0.572036743, 0.543823242, 0.515609741, 0.487472534,
    0.459472656, 0.431655884, 0.404083252, 0.376800537,
    0.349868774, 0.323318481, 0.297210693, 0.271591187,
    0.246505737, 0.221984863, 0.198059082, 0.174789429,
    0.152206421, 0.130310059, 0.109161377, 0.088775635,
    0.069168091, 0.050354004, 0.032379150, 0.015228271,
    -0.001068115, -0.016510010, -0.031082153, -0.044784546,
    -0.057617188, -0.069595337, -0.080688477, -0.090927124,
    0.100311279, 0.108856201, 0.116577148, 0.123474121,
    0.129577637, 0.134887695, 0.139450073, 0.143264771,
    0.146362305, 0.148773193, 0.150497437, 0.151596069,
    0.152069092, 0.151962280, 0.151306152, 0.150115967,
    0.148422241, 0.146255493, 0.143676758, 0.140670776,
    0.137298584, 0.133590698, 0.129562378, 0.125259399,
    0.120697021, 0.115921021, 0.110946655, 0.105819702,
    0.100540161, 0.095169067, 0.089706421, 0.084182739,
    0.078628540, 0.073059082, 0.067520142, 0.061996460,
    0.056533813, 0.051132202, 0.045837402, 0.040634155,
    0.035552979, 0.030609131, 0.025817871, 0.021179199,
    0.016708374, 0.012420654, 0.008316040, 0.004394531,
    0.000686646, -0.002822876, -0.006134033, -0.009231567,
    -0.012115479, -0.014801025, -0.017257690, -0.019531250,
    -0.021575928, -0.023422241, -0.025085449, -0.026535034,
    -0.027801514, -0.028884888, -0.029785156, -0.030517578,
    0.031082153, 0.031478882, 0.031738281, 0.031845093,
    0.031814575, 0.031661987, 0.031387329, 0.031005859,
    0.030532837, 0.029937744, 0.029281616, 0.028533936,
    0.027725220, 0.026840210, 0.025909424, 0.024932861,
    0.023910522, 0.022857666, 0.021789551, 0.020690918,
    0.019577026, 0.018463135, 0.017349243, 0.016235352,
    0.015121460, 0.014022827, 0.012939453, 0.011886597,
    0.010848999, 0.009841919, 0.008865356, 0.007919312,
    0.007003784, 0.006118774, 0.005294800, 0.004486084,
    0.003723145, 0.003005981, 0.002334595, 0.001693726,
    0.001098633, 0.000549316, 0.000030518, -0.000442505,
    -0.000869751, -0.001266479, -0.001617432, -0.001937866,
    -0.002227783, -0.002487183, -0.002700806, -0.002883911,
    -0.003051758, -0.003173828, -0.003280640, -0.003372192,
    -0.003417969, -0.003463745, -0.003479004, -0.003479004,
    -0.003463745, -0.003433228, -0.003387451, -0.003326416,
    0.003250122, 0.003173828, 0.003082275, 0.002990723,
    0.002899170, 0.002792358, 0.002685547, 0.002578735,
    0.002456665, 0.002349854, 0.002243042, 0.002120972,
    0.002014160, 0.001907349, 0.001785278, 0.001693726,
    0.001586914, 0.001480103, 0.001388550, 0.001296997,
    0.001205444, 0.001113892, 0.001037598, 0.000961304,
    0.000885010, 0.000808716, 0.000747681, 0.000686646,
    0.000625610, 0.000579834, 0.000534058, 0.000473022,
    0.000442505, 0.000396729, 0.000366211, 0.000320435,
    0.000289917, 0.000259399, 0.000244141, 0.000213623,
    0.000198364, 0.000167847, 0.000152588, 0.000137329,
    0.000122070, 0.000106812, 0.000106812, 0.000091553,
    0.000076294, 0.000076294, 0.000061035, 0.000061035,
    0.000045776, 0.000045776, 0.000030518, 0.000030518,
    0.000030518, 0.000030518, 0.000015259, 0.000015259,
    0.000015259, 0.000015259, 0.000015259, 0.000015259,
];

/// 频率反转: 奇子带的奇数时间样本取反,
/// 补偿多相滤波器组对奇子带的频谱镜像.
pub fn frequency_inversion(is: &mut [f32; SAMPLES_PER_GR]) {
    for sb in (1..32).step_by(2) {
        for i in (1..18).step_by(2) {
            is[sb * 18 + i] = -is[sb * 18 + i];
        }
    }
}

/// 多相子带合成: 一个 (granule, channel) 的 576 个时域样本
/// 合成为 PCM 并写入输出区 (16 位小端, 双声道交织).
///
/// `out` 为该 granule 的 2304 字节输出区; 单声道写入左右两个槽位.
pub fn subband_synthesis(
    v_vec: &mut [f32; 1024],
    is: &[f32; SAMPLES_PER_GR],
    ch: usize,
    nch: usize,
    out: &mut [u8],
) {
    let nwin = synth_nwin();
    let mut u_vec = [0.0f32; 512];
    let mut s_vec = [0.0f32; 32];

    for ss in 0..18 {
        // V 向量下移 64
        v_vec.copy_within(0..1024 - 64, 64);

        for (i, s) in s_vec.iter_mut().enumerate() {
            *s = is[i * 18 + ss];
        }
        for i in 0..64 {
            let mut sum = 0.0f32;
            for j in 0..32 {
                sum += nwin[i][j] * s_vec[j];
            }
            v_vec[i] = sum;
        }

        // U 向量: 交替抽取 V 的 32 样本块
        for i in (0..512).step_by(64) {
            u_vec[i..i + 32].copy_from_slice(&v_vec[(i << 1)..(i << 1) + 32]);
            u_vec[i + 32..i + 64].copy_from_slice(&v_vec[(i << 1) + 96..(i << 1) + 128]);
        }
        for (u, d) in u_vec.iter_mut().zip(SYNTH_DTBL.iter()) {
            *u *= d;
        }

        for i in 0..32 {
            let mut sum = 0.0f32;
            for j in (0..512).step_by(32) {
                sum += u_vec[j + i];
            }
            // 饱和到 [-32767, 32767] 的 16 位样本
            let samp = ((sum * 32767.0) as i32).clamp(-32767, 32767) as i16;
            let bytes = samp.to_le_bytes();
            let idx = 4 * (32 * ss + i);
            if nch == 1 {
                // 单声道源复制到左右两个槽位
                out[idx..idx + 2].copy_from_slice(&bytes);
                out[idx + 2..idx + 4].copy_from_slice(&bytes);
            } else if ch == 0 {
                out[idx..idx + 2].copy_from_slice(&bytes);
            } else {
                out[idx + 2..idx + 4].copy_from_slice(&bytes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 频率反转两次应用为恒等变换 (精确)
    #[test]
    fn test_frequency_inversion_involution() {
        let mut is = [0.0f32; SAMPLES_PER_GR];
        for (i, v) in is.iter_mut().enumerate() {
            *v = (i as f32) - 288.0;
        }
        let orig = is;
        frequency_inversion(&mut is);
        assert_ne!(is, orig);
        frequency_inversion(&mut is);
        assert_eq!(is, orig);
    }

    #[test]
    fn test_zero_input_zero_output() {
        let mut v = [0.0f32; 1024];
        let is = [0.0f32; SAMPLES_PER_GR];
        let mut out = vec![0xFFu8; 2304];
        subband_synthesis(&mut v, &is, 0, 1, &mut out);
        assert!(out.iter().all(|&b| b == 0));
    }

    /// 极端输入下输出饱和但不越界
    #[test]
    fn test_saturation() {
        let mut v = [0.0f32; 1024];
        let is = [1.0e6f32; SAMPLES_PER_GR];
        let mut out = vec![0u8; 2304];
        subband_synthesis(&mut v, &is, 0, 1, &mut out);
        for k in 0..(2304 / 2) {
            let s = i16::from_le_bytes([out[2 * k], out[2 * k + 1]]);
            assert!((-32767..=32767).contains(&s));
        }
    }

    #[test]
    fn test_mono_duplicates_channels() {
        let mut v = [0.0f32; 1024];
        let mut is = [0.0f32; SAMPLES_PER_GR];
        for (i, x) in is.iter_mut().enumerate() {
            *x = ((i % 37) as f32 - 18.0) / 64.0;
        }
        let mut out = vec![0u8; 2304];
        subband_synthesis(&mut v, &is, 0, 1, &mut out);
        for k in 0..576 {
            assert_eq!(out[4 * k], out[4 * k + 2]);
            assert_eq!(out[4 * k + 1], out[4 * k + 3]);
        }
    }

    #[test]
    fn test_synth_window_antisymmetry_pattern() {
        // D 窗以 64 样本为段交替变号, 段内值与镜像段一致
        assert_eq!(SYNTH_DTBL.len(), 512);
        assert_eq!(SYNTH_DTBL[0], 0.0);
        assert!((SYNTH_DTBL[256] - 1.144989014).abs() < 1e-9);
        assert!((SYNTH_DTBL[255] + 1.144287109).abs() < 1e-9);
        assert!((SYNTH_DTBL[257] - 1.144287109).abs() < 1e-9);
    }
}
