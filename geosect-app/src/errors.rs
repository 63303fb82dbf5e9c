use geosect_engine::errors::EngineError;
use geosect_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("配置无效: {0}")]
    Engine(#[from] EngineError),
    #[error("读取输入失败: {0}")]
    Io(#[from] IoError),
    #[error("命令行参数错误: {0}")]
    Usage(String),
}
