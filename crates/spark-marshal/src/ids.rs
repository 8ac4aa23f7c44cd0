//! 标识分配与校验。
//!
//! ## 两套命名空间（Why）
//! - **内部标识**：单字节 `0..=254`，供内置类型使用，帧头仅占一个字节；
//! - **外部标识**：用户类型使用的任意非负整数，帧头写入哨兵字节 `255` 后再跟一个变长整数。
//!
//! ## 读索引（How）
//! - 解码侧只维护一张表。内部条目的读索引等于标识本身；外部条目的读索引为
//!   `0x8000_0000 | foreign_id`，最高位将两套命名空间彻底隔开，内部区间永远碰不到该位。
//! - 两个边界（哨兵 255 与最高位标记）决定了已落盘数据的线格式，任何改动都会破坏兼容性。

use std::fmt;

use crate::error::ConfigurationError;

/// 哨兵字节：表示“后面跟随一个外部标识”。内部标识必须严格小于它。
pub const MAX_ID: u8 = u8::MAX;

/// 外部读索引的命名空间标记位。
pub const FOREIGN_READER_FLAG: u32 = 0x8000_0000;

/// 外部标识的最大值，超出后会与标记位重叠。
pub const MAX_FOREIGN_ID: u32 = FOREIGN_READER_FLAG - 1;

// 内置 Externalizer 标识。0..=127 留给核心模块，128..=254 留给按需加载的可选模块。
pub const MAPS: u8 = 2;
pub const NODE_ADDRESS: u8 = 3;
pub const GLOBAL_TRANSACTION: u8 = 5;
pub const MARSHALLED_VALUE: u8 = 9;
pub const SUCCESSFUL_RESPONSE: u8 = 13;
pub const UNSUCCESSFUL_RESPONSE: u8 = 14;
pub const REQUEST_IGNORED_RESPONSE: u8 = 15;
pub const REPLICABLE_COMMAND: u8 = 17;
pub const IMMORTAL_ENTRY: u8 = 20;
pub const MORTAL_ENTRY: u8 = 21;
pub const BYTE_ARRAY_KEY: u8 = 40;

/// 解码表的键。
///
/// # 契约说明（What）
/// - [`internal`](Self::internal) 生成 `0..=254` 范围内的索引；
/// - [`foreign`](Self::foreign) 生成带最高位标记的索引，调用方需保证 `foreign_id <= MAX_FOREIGN_ID`；
/// - 两个构造函数的值域不相交，因此一张表即可同时承载两类条目。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderIndex(u32);

impl ReaderIndex {
    /// 内部标识对应的读索引。
    pub const fn internal(id: u8) -> Self {
        Self(id as u32)
    }

    /// 外部标识对应的读索引。
    pub const fn foreign(foreign_id: u32) -> Self {
        Self(FOREIGN_READER_FLAG | foreign_id)
    }

    /// 原始 32 位键值。
    pub const fn get(self) -> u32 {
        self.0
    }

    /// 是否位于外部命名空间。
    pub const fn is_foreign(self) -> bool {
        self.0 & FOREIGN_READER_FLAG != 0
    }
}

impl fmt::Display for ReaderIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_foreign() {
            write!(
                f,
                "{} (foreign id {})",
                self.0 as i32,
                self.0 & !FOREIGN_READER_FLAG
            )
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// 校验内置插件声明的标识。
///
/// # 契约说明（What）
/// - `None` 表示插件未声明标识，返回 [`ConfigurationError::MissingId`]；
/// - 负数或 `>= 255` 返回 [`ConfigurationError::InternalIdOutOfRange`]；
/// - 成功时返回单字节标识。
pub fn check_internal_id(id: Option<i32>, externalizer: &str) -> Result<u8, ConfigurationError> {
    let id = id.ok_or_else(|| ConfigurationError::MissingId {
        externalizer: externalizer.to_owned(),
    })?;
    match u8::try_from(id) {
        Ok(id) if id < MAX_ID => Ok(id),
        _ => Err(ConfigurationError::InternalIdOutOfRange {
            externalizer: externalizer.to_owned(),
            id: i64::from(id),
        }),
    }
}

/// 校验用户插件的外部标识。
///
/// # 契约说明（What）
/// - 负数返回 [`ConfigurationError::NegativeForeignId`]；
/// - 超过 [`MAX_FOREIGN_ID`] 返回 [`ConfigurationError::ForeignIdOutOfRange`]；
/// - 成功时返回可直接参与读索引合成的 `u32`。
pub fn check_foreign_id(id: i64, externalizer: &str) -> Result<u32, ConfigurationError> {
    if id < 0 {
        return Err(ConfigurationError::NegativeForeignId {
            externalizer: externalizer.to_owned(),
            id,
        });
    }
    match u32::try_from(id) {
        Ok(id) if id <= MAX_FOREIGN_ID => Ok(id),
        _ => Err(ConfigurationError::ForeignIdOutOfRange {
            externalizer: externalizer.to_owned(),
            id,
        }),
    }
}

/// 选择外部标识：配置中的显式值优先，其次是插件自身声明的默认值。
pub fn resolve_foreign_id(
    configured: Option<i64>,
    declared: Option<i32>,
    externalizer: &str,
) -> Result<u32, ConfigurationError> {
    let id = configured
        .or_else(|| declared.map(i64::from))
        .ok_or_else(|| ConfigurationError::MissingId {
            externalizer: externalizer.to_owned(),
        })?;
    check_foreign_id(id, externalizer)
}
