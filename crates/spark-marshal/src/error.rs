//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 将注册表可能出现的故障拆分为两个错误域：启动期的 [`ConfigurationError`] 与运行期的 [`MarshalError`]；
//! - 运行期错误必须能区分“节点正在停机”与“字节流损坏”，否则上层线协议会把停机竞态误判为数据污染并触发重连风暴。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，兼容 `std::error::Error` 与 `?` 传播；
//! - 每个变体都暴露稳定错误码（`marshal.<域>.<语义>`），供日志聚合与告警使用；
//! - [`MarshalError::category`] 给出结构化分类，调用方据此决定重试、关闭或放弃。

use std::any::TypeId;
use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

use crate::ids::ReaderIndex;

/// 稳定错误码集合，统一使用 `<域>.<语义>` 命名。
pub mod codes {
    pub const CONFIG_MISSING_ID: &str = "marshal.config.missing_id";
    pub const CONFIG_INTERNAL_ID_RANGE: &str = "marshal.config.internal_id_range";
    pub const CONFIG_FOREIGN_ID_NEGATIVE: &str = "marshal.config.foreign_id_negative";
    pub const CONFIG_FOREIGN_ID_RANGE: &str = "marshal.config.foreign_id_range";
    pub const CONFIG_NO_HANDLED_TYPES: &str = "marshal.config.no_handled_types";
    pub const CONFIG_DUPLICATE_ID: &str = "marshal.config.duplicate_id";
    pub const CONFIG_UNRESOLVED_TYPE: &str = "marshal.config.unresolved_type";
    pub const CONFIG_UNKNOWN_CLASS: &str = "marshal.config.unknown_class";
    pub const CONFIG_MISSING_EXTERNALIZER: &str = "marshal.config.missing_externalizer";
    pub const CONFIG_ALREADY_STARTED: &str = "marshal.config.already_started";
    pub const CONFIG_PARSE: &str = "marshal.config.parse";
    pub const CONFIG_IO: &str = "marshal.config.io";

    pub const TYPE_UNKNOWN: &str = "marshal.type.unknown";
    pub const TYPE_NOT_MARSHALLABLE: &str = "marshal.type.not_marshallable";
    pub const TYPE_MISMATCH: &str = "marshal.type.mismatch";
    pub const LIFECYCLE_SHUTTING_DOWN: &str = "marshal.lifecycle.shutting_down";
    pub const LIFECYCLE_NOT_RUNNING: &str = "marshal.lifecycle.not_running";
    pub const STREAM_TRUNCATED: &str = "marshal.stream.truncated";
    pub const STREAM_VARINT_OVERFLOW: &str = "marshal.stream.varint_overflow";
    pub const STREAM_MALFORMED: &str = "marshal.stream.malformed";
    pub const STREAM_VERSION: &str = "marshal.stream.version";
    pub const STREAM_NESTING_DEPTH: &str = "marshal.stream.nesting_depth";
    pub const CODEC_FAILURE: &str = "marshal.codec.failure";
}

/// 错误分类枚举，驱动线协议层的自动化容错策略。
///
/// # 契约说明（What）
/// - `Retryable`：暂时不可用（例如注册表尚未启动或已停止），稍后重试可能成功；
/// - `NonRetryable`：调用方编程错误或插件内部失败，重试无意义；
/// - `ProtocolViolation`：字节流内容无法被理解，应关闭连接；
/// - `Cancelled`：调用上下文已被取消，失败是停机的副作用而非数据问题。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    Retryable,
    NonRetryable,
    ProtocolViolation,
    Cancelled,
}

/// 停机期间被取消的调用所携带的底层原因。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Error)]
#[error("calling context was cancelled while the node is stopping")]
pub struct Interrupted;

/// 启动与配置阶段的错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：所有配置错误都在 `start` 时一次性暴露并中止启动，注册表不会进入部分填充的运行态；
/// - **契约 (What)**：变体携带出错的 Externalizer 实现名与标识，足以在日志中定位冲突双方；
/// - **风险 (Trade-offs)**：使用 `String` 保存实现名，牺牲少量分配换取易读性，启动路径对此不敏感。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// 插件既没有声明标识，也没有在配置中显式给出。
    #[error("no externalizer identifier set for externalizer {externalizer}")]
    MissingId { externalizer: String },

    /// 内置插件的标识越界：必须位于 `[0, 255)`，255 保留为外部标识哨兵。
    #[error(
        "internal {externalizer} externalizer is using an id({id}) that exceeds the limit; it needs to be within [0, 255)"
    )]
    InternalIdOutOfRange { externalizer: String, id: i64 },

    /// 用户插件使用了负数标识。
    #[error(
        "foreign {externalizer} externalizer is using a negative id({id}); only positive id values are allowed"
    )]
    NegativeForeignId { externalizer: String, id: i64 },

    /// 用户插件标识超出读索引空间（最高位保留给外部命名空间标记）。
    #[error(
        "foreign {externalizer} externalizer is using an id({id}) larger than {max}",
        max = crate::ids::MAX_FOREIGN_ID
    )]
    ForeignIdOutOfRange { externalizer: String, id: i64 },

    /// 插件描述符没有声明任何处理类型。
    #[error("externalizer {externalizer} must declare at least one handled type")]
    NoHandledTypes { externalizer: String },

    /// 两个不同的插件实现争用同一读索引。
    #[error(
        "duplicate id found! externalizer id={externalizer_id} for {type_name} ({rejected}) is shared by another externalizer ({existing}); reader index is {reader_index}"
    )]
    DuplicateId {
        externalizer_id: u32,
        type_name: &'static str,
        rejected: String,
        existing: String,
        reader_index: ReaderIndex,
    },

    /// 按名称声明的处理类型无法在类型目录中解析。
    #[error("externalizer {externalizer} declares type `{type_name}` which cannot be resolved")]
    UnresolvedType {
        externalizer: String,
        type_name: String,
    },

    /// 配置按类名引用的 Externalizer 未在目录中登记。
    #[error("externalizer class `{class}` is not registered")]
    UnknownExternalizerClass { class: String },

    /// 配置条目既没有实例也没有类名。
    #[error("externalizer entry #{position} provides neither an instance nor a class name")]
    MissingExternalizer { position: usize },

    /// 在运行态再次调用 `start`。
    #[error("externalizer table is already started")]
    AlreadyStarted,

    /// TOML 解析失败。
    #[error("failed to parse global configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// 读取配置文件失败。
    #[error("failed to read configuration file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigurationError {
    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingId { .. } => codes::CONFIG_MISSING_ID,
            Self::InternalIdOutOfRange { .. } => codes::CONFIG_INTERNAL_ID_RANGE,
            Self::NegativeForeignId { .. } => codes::CONFIG_FOREIGN_ID_NEGATIVE,
            Self::ForeignIdOutOfRange { .. } => codes::CONFIG_FOREIGN_ID_RANGE,
            Self::NoHandledTypes { .. } => codes::CONFIG_NO_HANDLED_TYPES,
            Self::DuplicateId { .. } => codes::CONFIG_DUPLICATE_ID,
            Self::UnresolvedType { .. } => codes::CONFIG_UNRESOLVED_TYPE,
            Self::UnknownExternalizerClass { .. } => codes::CONFIG_UNKNOWN_CLASS,
            Self::MissingExternalizer { .. } => codes::CONFIG_MISSING_EXTERNALIZER,
            Self::AlreadyStarted => codes::CONFIG_ALREADY_STARTED,
            Self::Parse(_) => codes::CONFIG_PARSE,
            Self::Io { .. } => codes::CONFIG_IO,
        }
    }
}

/// 运行期编解码错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把“未知类型”“停机竞态”“流截断”等情况显式建模，交由线协议层决定重试或重连；
/// - **契约 (What)**：本模块从不在内部重试，错误原样返回给直接调用方；
/// - **执行 (How)**：[`category`](Self::category) 将变体映射为 [`ErrorCategory`]，[`code`](Self::code) 提供稳定码值。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MarshalError {
    /// 注册表处于运行态，但读索引未登记任何 Externalizer。
    #[error("type of data read is unknown; id={reader_index} is not amongst known reader indexes")]
    UnknownType { reader_index: ReaderIndex },

    /// 查表未命中且调用上下文已被取消：停机竞态。
    #[error("cache manager is shutting down, so {subject} cannot be resolved; interruption being pushed up")]
    ShuttingDown {
        subject: String,
        #[source]
        source: Interrupted,
    },

    /// 查表未命中，注册表未运行且调用方未被取消：启动或停机的生命周期竞态。
    #[error(
        "cache manager is either starting up or shutting down but the caller is not cancelled, so type (id={reader_index}) cannot be resolved"
    )]
    NotRunning { reader_index: ReaderIndex },

    /// 写入的值没有对应的 Externalizer。
    #[error("no externalizer registered for runtime type {type_id:?}")]
    NotMarshallable { type_id: TypeId },

    /// Externalizer 收到了与声明不符的值。
    #[error("externalizer expected a value of type `{expected}`")]
    TypeMismatch { expected: &'static str },

    /// 输入流在读取途中耗尽。
    #[error("stream truncated: needed {needed} byte(s) but only {remaining} remain")]
    Truncated { needed: usize, remaining: usize },

    /// 变长整数超出目标位宽。
    #[error("variable-length integer does not fit into {bits} bits")]
    VarintOverflow { bits: u32 },

    /// 负载结构无法识别。
    #[error("malformed payload: {detail}")]
    Malformed { detail: String },

    /// 嵌套帧层数超过上限，通常意味着字节流被破坏或被恶意构造。
    #[error("nested object depth exceeds the limit of {limit}")]
    NestingTooDeep { limit: u16 },

    /// 独立缓冲的编组版本与本节点不一致。
    #[error("incompatible marshall version: expected {expected}, found {found}")]
    IncompatibleVersion { expected: u16, found: u16 },

    /// 插件或其协作方内部失败。
    #[error("externalizer {externalizer} failed")]
    Codec {
        externalizer: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
}

impl MarshalError {
    /// 构造停机竞态错误，底层原因固定为 [`Interrupted`]。
    pub fn shutting_down(subject: impl Into<String>) -> Self {
        Self::ShuttingDown {
            subject: subject.into(),
            source: Interrupted,
        }
    }

    /// 构造负载结构错误。
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }

    /// 以插件实现名包装底层失败。
    pub fn codec(
        externalizer: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self::Codec {
            externalizer: externalizer.into(),
            source: source.into(),
        }
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownType { .. } => codes::TYPE_UNKNOWN,
            Self::ShuttingDown { .. } => codes::LIFECYCLE_SHUTTING_DOWN,
            Self::NotRunning { .. } => codes::LIFECYCLE_NOT_RUNNING,
            Self::NotMarshallable { .. } => codes::TYPE_NOT_MARSHALLABLE,
            Self::TypeMismatch { .. } => codes::TYPE_MISMATCH,
            Self::Truncated { .. } => codes::STREAM_TRUNCATED,
            Self::VarintOverflow { .. } => codes::STREAM_VARINT_OVERFLOW,
            Self::Malformed { .. } => codes::STREAM_MALFORMED,
            Self::IncompatibleVersion { .. } => codes::STREAM_VERSION,
            Self::NestingTooDeep { .. } => codes::STREAM_NESTING_DEPTH,
            Self::Codec { .. } => codes::CODEC_FAILURE,
        }
    }

    /// 获取结构化错误分类。
    ///
    /// # 契约说明（What）
    /// - 停机竞态（调用方已取消）返回 `Cancelled`；
    /// - 生命周期竞态（未取消）返回 `Retryable`；
    /// - 未知类型与流结构问题返回 `ProtocolViolation`；
    /// - 其余情况返回 `NonRetryable`。
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ShuttingDown { .. } => ErrorCategory::Cancelled,
            Self::NotRunning { .. } => ErrorCategory::Retryable,
            Self::UnknownType { .. }
            | Self::Truncated { .. }
            | Self::VarintOverflow { .. }
            | Self::Malformed { .. }
            | Self::IncompatibleVersion { .. }
            | Self::NestingTooDeep { .. } => ErrorCategory::ProtocolViolation,
            Self::NotMarshallable { .. } | Self::TypeMismatch { .. } | Self::Codec { .. } => {
                ErrorCategory::NonRetryable
            }
        }
    }

    /// 是否为停机竞态导致的失败。
    pub fn is_shutdown(&self) -> bool {
        matches!(self.category(), ErrorCategory::Cancelled)
    }
}
