use std::any::Any;
use std::sync::Arc;

use bytes::Bytes;

use crate::descriptor::ExternalizerDescriptor;
use crate::error::MarshalError;
use crate::externalizer::{Externalizer, ObjectInput, ObjectOutput, Value, downcast_object};
use crate::ids;
use crate::spi::RemoteCommandFactory;

/// 可在节点间复制的命令：命令标识 + 已序列化的参数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteCommand {
    pub command_id: u8,
    pub parameters: Vec<Bytes>,
}

impl RemoteCommand {
    pub fn new(command_id: u8, parameters: Vec<Bytes>) -> Self {
        Self {
            command_id,
            parameters,
        }
    }
}

/// 读取时交由注入的命令工厂重建命令，工厂可据此拒绝未知的命令标识。
pub struct ReplicableCommandExternalizer {
    factory: Arc<dyn RemoteCommandFactory>,
}

impl ReplicableCommandExternalizer {
    pub fn new(factory: Arc<dyn RemoteCommandFactory>) -> Self {
        Self { factory }
    }
}

impl Externalizer for ReplicableCommandExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(i32::from(ids::REPLICABLE_COMMAND))
            .handles::<RemoteCommand>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        let command = downcast_object::<RemoteCommand>(object)?;
        output.write_u8(command.command_id);
        output.write_unsigned_long(command.parameters.len() as u64);
        for parameter in &command.parameters {
            output.write_bytes(parameter);
        }
        Ok(())
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        let command_id = input.read_u8()?;
        let count = input.read_unsigned_long()?;
        let mut parameters = Vec::new();
        for _ in 0..count {
            parameters.push(input.read_bytes()?);
        }
        Ok(Box::new(self.factory.from_stream(command_id, parameters)?))
    }
}
