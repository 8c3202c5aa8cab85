use std::fmt;

use crate::sync::Collection;

#[derive(Debug)]
pub enum MiniTrackError {
    /// 宿主环境没有暴露云存储能力（或能力对象不完整）
    RemoteUnavailable,
    /// 单个集合序列化后超过云端单 key 大小上限
    Oversize {
        collection: Collection,
        size: usize,
        limit: usize,
    },
    /// 云端/本地数据解析失败（非法 JSON 或形状不符）
    Parse {
        collection: Collection,
        message: String,
    },
    /// 导入文档校验失败（整体拒绝，零部分写入）
    Validation(String),
    /// 实体数据校验失败（amount <= 0 等）
    InvalidData(String),
    /// 本地 KV 存储错误
    LocalStore(String),
    /// 云端存储传输错误（单次 get/set 失败）
    Remote(String),
    /// 序列化错误
    Serialization(String),
    NotFound(String),
    IO(String),
    /// SDK 未初始化
    NotInitialized(String),
    /// 正在关闭
    ShuttingDown(String),
    Config(String),
}

impl fmt::Display for MiniTrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiniTrackError::RemoteUnavailable => write!(f, "Cloud storage is not available"),
            MiniTrackError::Oversize {
                collection,
                size,
                limit,
            } => write!(
                f,
                "Payload for '{}' is {} bytes, exceeds the {} byte limit",
                collection.key(),
                size,
                limit
            ),
            MiniTrackError::Parse {
                collection,
                message,
            } => write!(f, "Failed to parse '{}': {}", collection.key(), message),
            MiniTrackError::Validation(e) => write!(f, "Validation error: {}", e),
            MiniTrackError::InvalidData(e) => write!(f, "Invalid data: {}", e),
            MiniTrackError::LocalStore(e) => write!(f, "Local store error: {}", e),
            MiniTrackError::Remote(e) => write!(f, "Remote store error: {}", e),
            MiniTrackError::Serialization(e) => write!(f, "Serialization error: {}", e),
            MiniTrackError::NotFound(e) => write!(f, "Not found: {}", e),
            MiniTrackError::IO(e) => write!(f, "IO error: {}", e),
            MiniTrackError::NotInitialized(e) => write!(f, "Not initialized: {}", e),
            MiniTrackError::ShuttingDown(e) => write!(f, "Shutting down: {}", e),
            MiniTrackError::Config(e) => write!(f, "Config error: {}", e),
        }
    }
}

impl std::error::Error for MiniTrackError {}

impl From<serde_json::Error> for MiniTrackError {
    fn from(error: serde_json::Error) -> Self {
        MiniTrackError::Serialization(error.to_string())
    }
}

impl From<sled::Error> for MiniTrackError {
    fn from(error: sled::Error) -> Self {
        MiniTrackError::LocalStore(error.to_string())
    }
}

impl From<std::io::Error> for MiniTrackError {
    fn from(error: std::io::Error) -> Self {
        MiniTrackError::IO(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MiniTrackError>;
