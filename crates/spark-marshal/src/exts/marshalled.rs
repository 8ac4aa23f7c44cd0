use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::cancellation::Cancellation;
use crate::descriptor::ExternalizerDescriptor;
use crate::error::MarshalError;
use crate::externalizer::{Externalizer, ObjectInput, ObjectOutput, Value, downcast_object};
use crate::ids;
use crate::spi::StreamingMarshaller;

/// 以独立缓冲形式保存的值，延迟到真正需要时才反序列化。
///
/// # 契约说明（What）
/// - `raw` 是 [`StreamingMarshaller::object_to_buffer`] 的产出，`hash` 在编组时计算一次并随负载传输；
/// - 从线上读回的值绑定注入的编组器，可直接调用 [`get`](Self::get)；
/// - 相等性只比较 `raw`。
#[derive(Clone)]
pub struct MarshalledValue {
    raw: Bytes,
    hash: u32,
    marshaller: Option<Arc<dyn StreamingMarshaller>>,
}

impl MarshalledValue {
    /// 将 `object` 编组为独立缓冲。
    pub fn marshal(
        object: &(dyn Any + Send + Sync),
        marshaller: &Arc<dyn StreamingMarshaller>,
        cancellation: &Cancellation,
    ) -> Result<Self, MarshalError> {
        let raw = marshaller.object_to_buffer(object, cancellation)?;
        Ok(Self {
            hash: content_hash(&raw),
            raw,
            marshaller: Some(Arc::clone(marshaller)),
        })
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn hash_code(&self) -> u32 {
        self.hash
    }

    /// 还原原始对象。
    pub fn get(&self, cancellation: &Cancellation) -> Result<Value, MarshalError> {
        let marshaller = self.marshaller.as_ref().ok_or_else(|| {
            MarshalError::codec(
                std::any::type_name::<Self>(),
                "no marshaller attached to this value",
            )
        })?;
        marshaller.object_from_buffer(&self.raw, cancellation)
    }
}

impl PartialEq for MarshalledValue {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for MarshalledValue {}

impl fmt::Debug for MarshalledValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshalledValue")
            .field("len", &self.raw.len())
            .field("hash", &self.hash)
            .finish()
    }
}

fn content_hash(raw: &[u8]) -> u32 {
    raw.iter()
        .fold(1u32, |hash, byte| hash.wrapping_mul(31).wrapping_add(u32::from(*byte)))
}

/// 读回的值绑定启动时注入的编组器。
pub struct MarshalledValueExternalizer {
    marshaller: Arc<dyn StreamingMarshaller>,
}

impl MarshalledValueExternalizer {
    pub fn new(marshaller: Arc<dyn StreamingMarshaller>) -> Self {
        Self { marshaller }
    }
}

impl Externalizer for MarshalledValueExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(i32::from(ids::MARSHALLED_VALUE))
            .handles::<MarshalledValue>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        let value = downcast_object::<MarshalledValue>(object)?;
        output.write_bytes(&value.raw);
        output.write_i32(value.hash as i32);
        Ok(())
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        let raw = input.read_bytes()?;
        let hash = input.read_i32()? as u32;
        Ok(Box::new(MarshalledValue {
            raw,
            hash,
            marshaller: Some(Arc::clone(&self.marshaller)),
        }))
    }
}
