use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub region: RegionConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 从显式路径加载配置并校验数值范围。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `GEOSECT_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("GEOSECT_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let region = &self.region;
        let finite = [
            region.min_latitude,
            region.max_latitude,
            region.min_longitude,
            region.max_longitude,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite
            || region.min_latitude >= region.max_latitude
            || region.min_longitude >= region.max_longitude
        {
            return Err(ConfigError::Invalid(format!(
                "作业区域范围无效: 纬度 [{}, {}], 经度 [{}, {}]",
                region.min_latitude, region.max_latitude, region.min_longitude, region.max_longitude
            )));
        }
        if !(-90.0..=90.0).contains(&region.min_latitude)
            || !(-90.0..=90.0).contains(&region.max_latitude)
        {
            return Err(ConfigError::Invalid("纬度必须位于 [-90, 90]".to_string()));
        }
        if !self.selection.default_buffer_m.is_finite() || self.selection.default_buffer_m <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "默认缓冲距离必须为正数: {}",
                self.selection.default_buffer_m
            )));
        }
        if self.transform.cache_capacity == 0 {
            return Err(ConfigError::Invalid("转换缓存容量必须大于 0".to_string()));
        }
        if !self.log.page_depth_m.is_finite() || self.log.page_depth_m <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "分页深度必须为正数: {}",
                self.log.page_depth_m
            )));
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    #[default]
    BritishNationalGrid,
    IrishGrid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub grid: GridKind,
    /// 是否缓存坐标转换结果。
    #[serde(default = "TransformConfig::default_cache")]
    pub cache: bool,
    /// 缓存最多保留的条目数，写满后整体清空。
    #[serde(default = "TransformConfig::default_cache_capacity")]
    pub cache_capacity: usize,
}

impl TransformConfig {
    fn default_cache() -> bool {
        true
    }

    fn default_cache_capacity() -> usize {
        65_536
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            grid: GridKind::default(),
            cache: Self::default_cache(),
            cache_capacity: Self::default_cache_capacity(),
        }
    }
}

/// 有效坐标范围（WGS84 度）。默认覆盖不列颠群岛。
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            min_latitude: 49.0,
            max_latitude: 61.0,
            min_longitude: -11.0,
            max_longitude: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferCapKind {
    #[default]
    Flat,
    Round,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainmentKind {
    #[default]
    Winding,
    RayCasting,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub buffer_cap: BufferCapKind,
    #[serde(default)]
    pub containment: ContainmentKind,
    /// 线选区未携带缓冲距离时使用（米）。
    #[serde(default = "SelectionConfig::default_buffer")]
    pub default_buffer_m: f64,
}

impl SelectionConfig {
    fn default_buffer() -> f64 {
        50.0
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            buffer_cap: BufferCapKind::default(),
            containment: ContainmentKind::default(),
            default_buffer_m: Self::default_buffer(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "LogConfig::default_page_depth")]
    pub page_depth_m: f64,
}

impl LogConfig {
    fn default_page_depth() -> f64 {
        10.0
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            page_depth_m: Self::default_page_depth(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("配置无效: {0}")]
    Invalid(String),
}
