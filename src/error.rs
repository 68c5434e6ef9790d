//! 统一错误类型定义.
//!
//! 解码管线内所有错误通过返回值传播, 不跨越 API 边界抛出 panic.

use thiserror::Error;

/// MP3 解码统一错误类型
#[derive(Debug, Error)]
pub enum Mp3Error {
    /// 源在帧边界处正常结束
    #[error("码流结束")]
    Eof,

    /// 源在结构中途结束, 携带发生位置 (帧头/CRC/侧边信息/主数据)
    #[error("码流在 {0} 中途结束")]
    UnexpectedEof(&'static str),

    /// 不支持的码流 (MPEG-2/2.5, 非 Layer III, 自由格式码率)
    #[error("不支持的码流: {0}")]
    Unsupported(String),

    /// 无效数据 (损坏的码流)
    #[error("无效数据: {0}")]
    Malformed(String),

    /// 比特储备库历史数据不足, 本帧跳过数值解码 (可恢复)
    #[error("比特储备库不足: main_data_begin={needed}, 可用 {available} 字节")]
    InsufficientReservoir { needed: usize, available: usize },

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// MP3 解码统一 Result 类型
pub type Mp3Result<T> = Result<T, Mp3Error>;
