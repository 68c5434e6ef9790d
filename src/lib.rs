//! # qu-mp3
//!
//! 纯 Rust 实现的 MPEG-1 Audio Layer III (MP3) 解码器.
//!
//! 字节进, PCM 出: 解码输出始终为 16 位有符号小端双声道
//! (单声道源复制到两个声道), 采样率与码流一致. 解码器实现
//! `std::io::Read`; 以可定位源构造时额外实现 `std::io::Seek`
//! 并支持总长度查询.
//!
//! 支持范围为 MPEG-1 Layer III; Layer 1/2 与 MPEG-2/2.5 返回
//! [`Mp3Error::Unsupported`]. 损坏的码流尽量解码, 随后以流结束收尾.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::Read;
//!
//! let file = File::open("song.mp3")?;
//! let mut decoder = qu_mp3::Mp3Decoder::new_seekable(file)?;
//! println!("采样率: {} Hz", decoder.sample_rate());
//! if let Some(d) = decoder.duration() {
//!     println!("时长: {:.1} 秒", d.as_secs_f64());
//! }
//!
//! let mut pcm = Vec::new();
//! decoder.read_to_end(&mut pcm)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # 模块结构
//!
//! | 模块 | 职责 |
//! |------|------|
//! | `bitreader` | 位流游标 |
//! | `header` | 帧头同步与校验 |
//! | `side_info` | 侧边信息解析 |
//! | `maindata` | 比特储备库与比例因子/频线读取 |
//! | `huffman` / `tables` | Huffman 码本与解码 |
//! | `requantize` .. `synthesis` | 数值管线各阶段 |
//! | `frame` | 帧驱动 |
//! | `decoder` | 公开接口 (`Read`/`Seek`) |

mod alias;
mod bitreader;
mod decoder;
mod error;
mod frame;
mod header;
mod huffman;
mod imdct;
mod maindata;
mod reorder;
mod requantize;
mod side_info;
mod source;
mod stereo;
mod synthesis;
mod tables;

pub use decoder::Mp3Decoder;
pub use error::{Mp3Error, Mp3Result};
pub use frame::{BYTES_PER_FRAME, SAMPLES_PER_FRAME};
