use std::any::Any;

use bytes::Bytes;

use crate::descriptor::ExternalizerDescriptor;
use crate::error::MarshalError;
use crate::externalizer::{Externalizer, ObjectInput, ObjectOutput, Value, downcast_object};
use crate::ids;

/// 以原始字节作为缓存键。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ByteArrayKey(pub Bytes);

impl ByteArrayKey {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    pub fn data(&self) -> &Bytes {
        &self.0
    }
}

#[derive(Debug, Default)]
pub struct ByteArrayKeyExternalizer;

impl Externalizer for ByteArrayKeyExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(i32::from(ids::BYTE_ARRAY_KEY)).handles::<ByteArrayKey>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        output.write_bytes(&downcast_object::<ByteArrayKey>(object)?.0);
        Ok(())
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        Ok(Box::new(ByteArrayKey(input.read_bytes()?)))
    }
}
