use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;

use crate::descriptor::ExternalizerDescriptor;
use crate::error::MarshalError;
use crate::externalizer::{Externalizer, ObjectInput, ObjectOutput, Value};
use crate::ids;

const HASH_MAP: u8 = 0;
const TREE_MAP: u8 = 1;

/// 两种映射实现共用的编解码器。
///
/// 负载为 `实现标记 + 变长条目数 + (键, 值)*`，读取时按实现标记重建原始映射类型。
/// 两种类型登记到同一个适配器上，共享一个读索引。
#[derive(Debug, Default)]
pub struct MapExternalizer;

impl MapExternalizer {
    fn write_entries<'a>(
        output: &mut ObjectOutput<'_>,
        len: usize,
        entries: impl Iterator<Item = (&'a String, &'a Bytes)>,
    ) {
        output.write_unsigned_long(len as u64);
        for (key, value) in entries {
            output.write_str(key);
            output.write_bytes(value);
        }
    }
}

impl Externalizer for MapExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(i32::from(ids::MAPS))
            .handles::<HashMap<String, Bytes>>()
            .handles::<BTreeMap<String, Bytes>>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        if let Some(map) = object.downcast_ref::<HashMap<String, Bytes>>() {
            output.write_u8(HASH_MAP);
            Self::write_entries(output, map.len(), map.iter());
            return Ok(());
        }
        if let Some(map) = object.downcast_ref::<BTreeMap<String, Bytes>>() {
            output.write_u8(TREE_MAP);
            Self::write_entries(output, map.len(), map.iter());
            return Ok(());
        }
        Err(MarshalError::TypeMismatch {
            expected: "HashMap<String, Bytes> or BTreeMap<String, Bytes>",
        })
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        let kind = input.read_u8()?;
        let len = input.read_unsigned_long()?;
        let mut entries = Vec::new();
        for _ in 0..len {
            let key = input.read_string()?;
            let value = input.read_bytes()?;
            entries.push((key, value));
        }
        match kind {
            HASH_MAP => Ok(Box::new(entries.into_iter().collect::<HashMap<_, _>>())),
            TREE_MAP => Ok(Box::new(entries.into_iter().collect::<BTreeMap<_, _>>())),
            other => Err(MarshalError::malformed(format!("unknown map kind {other}"))),
        }
    }
}
