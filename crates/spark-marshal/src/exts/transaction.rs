use std::any::Any;

use crate::descriptor::ExternalizerDescriptor;
use crate::error::MarshalError;
use crate::externalizer::{
    Externalizer, ObjectInput, ObjectOutput, Value, downcast_object, downcast_value,
};
use crate::ids;

/// 集群成员地址。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub name: String,
}

impl NodeAddress {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// 全局事务标识：事务序号 + 发起节点地址。
///
/// 从线上读回的事务总是标记为远端事务。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalTransaction {
    pub id: u64,
    pub address: Option<NodeAddress>,
    pub remote: bool,
}

impl GlobalTransaction {
    pub fn local(id: u64, address: Option<NodeAddress>) -> Self {
        Self {
            id,
            address,
            remote: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct NodeAddressExternalizer;

impl Externalizer for NodeAddressExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(i32::from(ids::NODE_ADDRESS)).handles::<NodeAddress>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        output.write_str(&downcast_object::<NodeAddress>(object)?.name);
        Ok(())
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        Ok(Box::new(NodeAddress {
            name: input.read_string()?,
        }))
    }
}

/// 地址作为嵌套对象经注册表写出，因此地址帧带有自己的标识。
#[derive(Debug, Default)]
pub struct GlobalTransactionExternalizer;

impl Externalizer for GlobalTransactionExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(i32::from(ids::GLOBAL_TRANSACTION))
            .handles::<GlobalTransaction>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        let tx = downcast_object::<GlobalTransaction>(object)?;
        output.write_unsigned_long(tx.id);
        match &tx.address {
            Some(address) => {
                output.write_bool(true);
                output.write_object(address)
            }
            None => {
                output.write_bool(false);
                Ok(())
            }
        }
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        let id = input.read_unsigned_long()?;
        let address = if input.read_bool()? {
            Some(downcast_value::<NodeAddress>(input.read_object()?)?)
        } else {
            None
        };
        Ok(Box::new(GlobalTransaction {
            id,
            address,
            remote: true,
        }))
    }
}
