//! MP3 混合滤波器组合成 (IMDCT + 窗口 + 重叠相加)
//!
//! 每个子带 18 条频线经 36 点 IMDCT (长块) 或 3 个 12 点 IMDCT
//! (短块) 变换到时域并加窗; 输出前半与上一 granule 存储的后半
//! 重叠相加, 本次输出的后半存入 overlap 供下一 granule 使用.

use crate::header::SAMPLES_PER_GR;
use crate::side_info::Granule;
use std::f64::consts::PI;
use std::sync::OnceLock;

/// 四种窗口: 0=长窗, 1=起始窗, 2=短窗, 3=终止窗
static IMDCT_WINDOWS: OnceLock<[[f32; 36]; 4]> = OnceLock::new();
/// 12 点 IMDCT 余弦表 [输入][输出]
static COS_N12: OnceLock<[[f32; 12]; 6]> = OnceLock::new();
/// 36 点 IMDCT 余弦表 [输入][输出]
static COS_N36: OnceLock<[[f32; 36]; 18]> = OnceLock::new();

fn imdct_windows() -> &'static [[f32; 36]; 4] {
    IMDCT_WINDOWS.get_or_init(|| {
        let mut w = [[0.0f32; 36]; 4];
        // 长窗
        for i in 0..36 {
            w[0][i] = (PI / 36.0 * (i as f64 + 0.5)).sin() as f32;
        }
        // 起始窗: 长 -> 短 过渡
        for i in 0..18 {
            w[1][i] = (PI / 36.0 * (i as f64 + 0.5)).sin() as f32;
        }
        for i in 18..24 {
            w[1][i] = 1.0;
        }
        for i in 24..30 {
            w[1][i] = (PI / 12.0 * (i as f64 + 0.5 - 18.0)).sin() as f32;
        }
        // 短窗 (12 点)
        for i in 0..12 {
            w[2][i] = (PI / 12.0 * (i as f64 + 0.5)).sin() as f32;
        }
        // 终止窗: 短 -> 长 过渡
        for i in 6..12 {
            w[3][i] = (PI / 12.0 * (i as f64 + 0.5 - 6.0)).sin() as f32;
        }
        for i in 12..18 {
            w[3][i] = 1.0;
        }
        for i in 18..36 {
            w[3][i] = (PI / 36.0 * (i as f64 + 0.5)).sin() as f32;
        }
        w
    })
}

fn cos_n12() -> &'static [[f32; 12]; 6] {
    COS_N12.get_or_init(|| {
        let mut t = [[0.0f32; 12]; 6];
        for (i, row) in t.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (PI / 24.0 * ((2 * j + 7) as f64) * ((2 * i + 1) as f64)).cos() as f32;
            }
        }
        t
    })
}

fn cos_n36() -> &'static [[f32; 36]; 18] {
    COS_N36.get_or_init(|| {
        let mut t = [[0.0f32; 36]; 18];
        for (i, row) in t.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (PI / 72.0 * ((2 * j + 19) as f64) * ((2 * i + 1) as f64)).cos() as f32;
            }
        }
        t
    })
}

/// 单子带 IMDCT 与加窗: 18 条频线 -> 36 个时域样本.
///
/// 短块 (block_type=2) 输入为重排序后的窗口交织布局 `in[win + 3*p]`,
/// 三个 12 点变换的输出以 6 样本步距叠入 36 点缓冲.
pub fn win(input: &[f32; 18], block_type: u8) -> [f32; 36] {
    let windows = imdct_windows();
    let mut out = [0.0f32; 36];

    if block_type == 2 {
        let cos12 = cos_n12();
        for i in 0..3 {
            for p in 0..12 {
                let mut sum = 0.0f32;
                for m in 0..6 {
                    sum += input[i + 3 * m] * cos12[m][p];
                }
                out[6 * i + p + 6] += sum * windows[2][p];
            }
        }
    } else {
        let cos36 = cos_n36();
        let window = &windows[block_type as usize];
        for (p, o) in out.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for (m, &x) in input.iter().enumerate() {
                sum += x * cos36[m][p];
            }
            *o = sum * window[p];
        }
    }
    out
}

/// 对一个 (granule, channel) 的 32 个子带做混合合成.
///
/// 混合块的前两个子带强制按长块处理; 输出前半与 overlap 相加写回
/// 频谱缓冲区, 后半存入 overlap.
pub fn hybrid_synthesis(
    g: &Granule,
    is: &mut [f32; SAMPLES_PER_GR],
    store: &mut [[f32; 18]; 32],
) {
    for sb in 0..32 {
        let mut bt = g.block_type;
        if g.win_switch_flag && g.mixed_block_flag && sb < 2 {
            bt = 0;
        }

        let mut input = [0.0f32; 18];
        input.copy_from_slice(&is[sb * 18..sb * 18 + 18]);
        let rawout = win(&input, bt);

        for i in 0..18 {
            is[sb * 18 + i] = rawout[i] + store[sb][i];
            store[sb][i] = rawout[i + 18];
        }
    }
}
