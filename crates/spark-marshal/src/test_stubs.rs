//! 测试桩：不依赖任何外部服务的协作方实现，供单元测试、集成测试与基准复用。
//!
//! # 使用方式（How）
//! - 只验证注册表本身时，向 `start` 传入 [`NoopCommandFactory`] 与 [`NoopMarshaller`]；
//! - 需要完整独立缓冲语义时改用 [`GridMarshaller`](crate::GridMarshaller)。

use std::any::Any;

use bytes::Bytes;

use crate::cancellation::Cancellation;
use crate::error::MarshalError;
use crate::externalizer::Value;
use crate::exts::command::RemoteCommand;
use crate::spi::{RemoteCommandFactory, StreamingMarshaller};

/// 按原样重建命令，不校验命令标识。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCommandFactory;

impl RemoteCommandFactory for NoopCommandFactory {
    fn from_stream(
        &self,
        command_id: u8,
        parameters: Vec<Bytes>,
    ) -> Result<RemoteCommand, MarshalError> {
        Ok(RemoteCommand::new(command_id, parameters))
    }
}

/// 拒绝一切独立缓冲编组。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMarshaller;

impl StreamingMarshaller for NoopMarshaller {
    fn object_to_buffer(
        &self,
        _: &(dyn Any + Send + Sync),
        _: &Cancellation,
    ) -> Result<Bytes, MarshalError> {
        Err(MarshalError::codec(
            std::any::type_name::<Self>(),
            "standalone buffers are not supported",
        ))
    }

    fn object_from_buffer(&self, _: &[u8], _: &Cancellation) -> Result<Value, MarshalError> {
        Err(MarshalError::codec(
            std::any::type_name::<Self>(),
            "standalone buffers are not supported",
        ))
    }

    fn is_marshallable(&self, _: &(dyn Any + Send + Sync)) -> bool {
        false
    }
}
