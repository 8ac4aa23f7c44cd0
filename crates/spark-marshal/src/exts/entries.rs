use std::any::Any;

use bytes::Bytes;

use crate::descriptor::ExternalizerDescriptor;
use crate::error::MarshalError;
use crate::externalizer::{
    Externalizer, ObjectInput, ObjectOutput, Value, downcast_object, downcast_value,
};
use crate::exts::key::ByteArrayKey;
use crate::ids;

/// 永不过期的缓存条目。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImmortalCacheEntry {
    pub key: ByteArrayKey,
    pub value: Bytes,
}

/// 带创建时间与存活时长（毫秒）的缓存条目。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MortalCacheEntry {
    pub key: ByteArrayKey,
    pub value: Bytes,
    pub created: i64,
    pub lifespan: i64,
}

impl MortalCacheEntry {
    /// `now` 时刻条目是否已过期；负的存活时长表示永不过期。
    pub fn is_expired(&self, now: i64) -> bool {
        self.lifespan >= 0 && self.created.saturating_add(self.lifespan) <= now
    }
}

fn write_key(output: &mut ObjectOutput<'_>, key: &ByteArrayKey) -> Result<(), MarshalError> {
    output.write_object(key)
}

fn read_key(input: &mut ObjectInput<'_>) -> Result<ByteArrayKey, MarshalError> {
    downcast_value::<ByteArrayKey>(input.read_object()?)
}

#[derive(Debug, Default)]
pub struct ImmortalCacheEntryExternalizer;

impl Externalizer for ImmortalCacheEntryExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(i32::from(ids::IMMORTAL_ENTRY))
            .handles::<ImmortalCacheEntry>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        let entry = downcast_object::<ImmortalCacheEntry>(object)?;
        write_key(output, &entry.key)?;
        output.write_bytes(&entry.value);
        Ok(())
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        let key = read_key(input)?;
        let value = input.read_bytes()?;
        Ok(Box::new(ImmortalCacheEntry { key, value }))
    }
}

#[derive(Debug, Default)]
pub struct MortalCacheEntryExternalizer;

impl Externalizer for MortalCacheEntryExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(i32::from(ids::MORTAL_ENTRY)).handles::<MortalCacheEntry>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        let entry = downcast_object::<MortalCacheEntry>(object)?;
        write_key(output, &entry.key)?;
        output.write_bytes(&entry.value);
        output.write_i64(entry.created);
        output.write_i64(entry.lifespan);
        Ok(())
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        let key = read_key(input)?;
        let value = input.read_bytes()?;
        let created = input.read_i64()?;
        let lifespan = input.read_i64()?;
        Ok(Box::new(MortalCacheEntry {
            key,
            value,
            created,
            lifespan,
        }))
    }
}
