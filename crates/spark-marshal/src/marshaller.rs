use std::any::Any;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::cancellation::Cancellation;
use crate::config::{DEFAULT_MARSHALL_VERSION, GlobalConfiguration};
use crate::error::MarshalError;
use crate::externalizer::Value;
use crate::spi::StreamingMarshaller;
use crate::table::ExternalizerTable;

/// 基于注册表的独立缓冲编组器。
///
/// # 教案式说明
/// - **意图 (Why)**：“已编组值”等场景需要把对象压成一段可独立保存的字节，稍后在另一节点还原；
///   缓冲头部带上编组版本，跨版本的数据在解码时被明确拒绝而不是被误读；
/// - **契约 (What)**：缓冲格式为 `u16 版本（大端）` + 一个完整帧；解码要求版本一致且帧后无残留字节；
/// - **风险 (Trade-offs)**：编组器持有注册表的 `Arc`，而注册表在 `start` 时把编组器注入插件，
///   两者形成引用环，`stop` 清空表后环即被打破。
#[derive(Clone, Debug)]
pub struct GridMarshaller {
    table: Arc<ExternalizerTable>,
    version: u16,
}

impl GridMarshaller {
    pub fn new(table: Arc<ExternalizerTable>) -> Self {
        Self::with_version(table, DEFAULT_MARSHALL_VERSION)
    }

    /// 以配置中的 `serialization.marshall_version` 作为缓冲版本。
    pub fn from_config(table: Arc<ExternalizerTable>, config: &GlobalConfiguration) -> Self {
        Self::with_version(table, config.serialization().marshall_version)
    }

    pub fn with_version(table: Arc<ExternalizerTable>, version: u16) -> Self {
        Self { table, version }
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn table(&self) -> &Arc<ExternalizerTable> {
        &self.table
    }
}

impl StreamingMarshaller for GridMarshaller {
    fn object_to_buffer(
        &self,
        object: &(dyn Any + Send + Sync),
        cancellation: &Cancellation,
    ) -> Result<Bytes, MarshalError> {
        let mut buf = BytesMut::new();
        buf.put_u16(self.version);
        self.table.encode(&mut buf, object, cancellation)?;
        Ok(buf.freeze())
    }

    fn object_from_buffer(
        &self,
        buffer: &[u8],
        cancellation: &Cancellation,
    ) -> Result<Value, MarshalError> {
        let mut input = buffer;
        if input.remaining() < 2 {
            return Err(MarshalError::Truncated {
                needed: 2,
                remaining: input.remaining(),
            });
        }
        let found = input.get_u16();
        if found != self.version {
            return Err(MarshalError::IncompatibleVersion {
                expected: self.version,
                found,
            });
        }
        let value = self.table.decode(&mut input, cancellation)?;
        if input.has_remaining() {
            return Err(MarshalError::malformed(format!(
                "{} trailing byte(s) after the object frame",
                input.remaining()
            )));
        }
        Ok(value)
    }

    fn is_marshallable(&self, object: &(dyn Any + Send + Sync)) -> bool {
        self.table.is_marshallable(object)
    }
}
