//! 启动时注入给少数 Externalizer 的协作方接口。
//!
//! ## 意图（Why）
//! - 绝大多数插件只读写自身负载，但“已编组值”需要一个独立缓冲编组器，
//!   “可复制命令”需要命令工厂按标识重建命令；
//! - 这些协作方由 `start` 统一传入，打包为 [`Dependencies`] 交给内部插件工厂，
//!   插件自行决定是否捕获。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::cancellation::Cancellation;
use crate::error::MarshalError;
use crate::externalizer::Value;
use crate::exts::command::RemoteCommand;

/// 对象与独立字节缓冲之间的互转。
///
/// # 契约说明（What）
/// - [`object_to_buffer`](Self::object_to_buffer) 产出的缓冲必须能被同一节点或兼容版本的
///   [`object_from_buffer`](Self::object_from_buffer) 还原；
/// - 两个方向都接受调用方的取消令牌，以便停机期间的失败被正确归类。
pub trait StreamingMarshaller: Send + Sync + 'static {
    fn object_to_buffer(
        &self,
        object: &(dyn Any + Send + Sync),
        cancellation: &Cancellation,
    ) -> Result<Bytes, MarshalError>;

    fn object_from_buffer(
        &self,
        buffer: &[u8],
        cancellation: &Cancellation,
    ) -> Result<Value, MarshalError>;

    /// 是否存在能编码该值的插件。
    fn is_marshallable(&self, object: &(dyn Any + Send + Sync)) -> bool;
}

/// 按命令标识与参数重建可复制命令。
pub trait RemoteCommandFactory: Send + Sync + 'static {
    fn from_stream(
        &self,
        command_id: u8,
        parameters: Vec<Bytes>,
    ) -> Result<RemoteCommand, MarshalError>;
}

/// 注入给内部插件工厂的协作方集合。
#[derive(Clone)]
pub struct Dependencies {
    command_factory: Arc<dyn RemoteCommandFactory>,
    marshaller: Arc<dyn StreamingMarshaller>,
}

impl Dependencies {
    pub fn new(
        command_factory: Arc<dyn RemoteCommandFactory>,
        marshaller: Arc<dyn StreamingMarshaller>,
    ) -> Self {
        Self {
            command_factory,
            marshaller,
        }
    }

    pub fn command_factory(&self) -> &Arc<dyn RemoteCommandFactory> {
        &self.command_factory
    }

    pub fn marshaller(&self) -> &Arc<dyn StreamingMarshaller> {
        &self.marshaller
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies").finish_non_exhaustive()
    }
}
