//! 全局配置：集群名、编组版本与用户 Externalizer 列表。
//!
//! ## 意图（Why）
//! - 用户插件既可以由程序直接构造后传入，也可以在 TOML 中按类名引用；
//!   按类名的条目在 `start` 时经类型目录解析为工厂。
//!
//! ## 文件格式（What）
//! ```toml
//! cluster_name = "orders"
//!
//! [serialization]
//! marshall_version = 1
//!
//! [[serialization.externalizers]]
//! class = "orders.LineItemExternalizer"
//! id = 1024
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::externalizer::Externalizer;

/// 当前节点写入独立缓冲时使用的编组版本。
pub const DEFAULT_MARSHALL_VERSION: u16 = 1;

const DEFAULT_CLUSTER_NAME: &str = "spark-cluster";

/// 节点级配置。
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfiguration {
    pub cluster_name: String,
    pub serialization: SerializationConfig,
}

impl Default for GlobalConfiguration {
    fn default() -> Self {
        Self {
            cluster_name: DEFAULT_CLUSTER_NAME.to_owned(),
            serialization: SerializationConfig::default(),
        }
    }
}

impl GlobalConfiguration {
    /// 解析 TOML 文本。
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::from_str(input)?)
    }

    /// 读取并解析 TOML 文件。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn serialization(&self) -> &SerializationConfig {
        &self.serialization
    }

    pub fn serialization_mut(&mut self) -> &mut SerializationConfig {
        &mut self.serialization
    }
}

/// 序列化相关配置。
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerializationConfig {
    pub marshall_version: u16,
    pub externalizers: Vec<ExternalizerConfig>,
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            marshall_version: DEFAULT_MARSHALL_VERSION,
            externalizers: Vec::new(),
        }
    }
}

impl SerializationConfig {
    /// 追加一个插件实例，标识取插件自身声明的默认值。
    pub fn add_externalizer(&mut self, externalizer: Arc<dyn Externalizer>) -> &mut Self {
        self.externalizers.push(ExternalizerConfig {
            externalizer: Some(externalizer),
            class_name: None,
            id: None,
        });
        self
    }

    /// 追加一个插件实例并显式指定标识。
    pub fn add_externalizer_with_id(
        &mut self,
        id: i64,
        externalizer: Arc<dyn Externalizer>,
    ) -> &mut Self {
        self.externalizers.push(ExternalizerConfig {
            externalizer: Some(externalizer),
            class_name: None,
            id: Some(id),
        });
        self
    }

    /// 按类名追加插件，`start` 时经类型目录实例化。
    pub fn add_externalizer_class(
        &mut self,
        class_name: impl Into<String>,
        id: Option<i64>,
    ) -> &mut Self {
        self.externalizers.push(ExternalizerConfig {
            externalizer: None,
            class_name: Some(class_name.into()),
            id,
        });
        self
    }

    pub fn externalizers(&self) -> &[ExternalizerConfig] {
        &self.externalizers
    }
}

/// 单个用户插件条目。
///
/// 实例优先于类名；`id` 为空时使用插件描述符中的默认标识。
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalizerConfig {
    #[serde(skip)]
    pub externalizer: Option<Arc<dyn Externalizer>>,
    #[serde(rename = "class", default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub id: Option<i64>,
}

impl fmt::Debug for ExternalizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalizerConfig")
            .field(
                "externalizer",
                &self.externalizer.as_ref().map(|ext| ext.implementation()),
            )
            .field("class_name", &self.class_name)
            .field("id", &self.id)
            .finish()
    }
}
