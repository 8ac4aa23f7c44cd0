use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::MarshalError;
use crate::externalizer::{Externalizer, Implementation, ObjectInput, ObjectOutput, Value};
use crate::ids::{MAX_ID, ReaderIndex};

/// 适配器的两种帧格式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterKind {
    /// 单字节标识，`0..=254`。
    Internal,
    /// 哨兵字节 `255` + 变长外部标识。
    Foreign { foreign_id: u32 },
}

/// `ExternalizerAdapter` 将一个插件与其数值标识绑定，并负责编码侧的帧头。
///
/// # 设计初衷（Why）
/// - 帧头格式只与标识类别有关，与插件无关，因此集中在适配器里写出，插件只关心负载；
/// - 同一插件可能处理多个类型（两个映射实现共用一个映射编解码器），写表中多个类型指向同一适配器。
///
/// # 契约说明（What）
/// - 相等性与哈希定义在 `(帧标识, 插件实现类型)` 上，与处理类型的数量无关；
///   外部适配器的帧标识固定为哨兵 `255`；
/// - [`externalizer_id`](Self::externalizer_id) 返回对外可见的标识：内部适配器为原始标识，
///   外部适配器为外部标识，永远不是哨兵；
/// - [`read_object`](Self::read_object) 直接委托插件，标识已由注册表消费。
#[derive(Clone)]
pub struct ExternalizerAdapter {
    id: u8,
    kind: AdapterKind,
    externalizer: Arc<dyn Externalizer>,
    implementation: Implementation,
}

impl ExternalizerAdapter {
    /// 内部适配器。调用方需保证 `id < 255`。
    pub fn internal(id: u8, externalizer: Arc<dyn Externalizer>) -> Self {
        debug_assert!(id < MAX_ID, "internal ids must stay below the sentinel");
        let implementation = externalizer.implementation();
        Self {
            id,
            kind: AdapterKind::Internal,
            externalizer,
            implementation,
        }
    }

    /// 外部适配器，帧标识固定为哨兵。
    pub fn foreign(foreign_id: u32, externalizer: Arc<dyn Externalizer>) -> Self {
        let implementation = externalizer.implementation();
        Self {
            id: MAX_ID,
            kind: AdapterKind::Foreign { foreign_id },
            externalizer,
            implementation,
        }
    }

    /// 写出帧头，再委托插件写负载。
    pub fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        output.write_u8(self.id);
        if let AdapterKind::Foreign { foreign_id } = self.kind {
            output.write_unsigned_int(foreign_id);
        }
        self.externalizer.write_object(output, object)
    }

    pub fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        self.externalizer.read_object(input)
    }

    /// 对外可见的标识。
    pub fn externalizer_id(&self) -> u32 {
        match self.kind {
            AdapterKind::Internal => u32::from(self.id),
            AdapterKind::Foreign { foreign_id } => foreign_id,
        }
    }

    /// 帧中的首字节。
    pub fn frame_id(&self) -> u8 {
        self.id
    }

    /// 该适配器在解码表中的键。
    pub fn reader_index(&self) -> ReaderIndex {
        match self.kind {
            AdapterKind::Internal => ReaderIndex::internal(self.id),
            AdapterKind::Foreign { foreign_id } => ReaderIndex::foreign(foreign_id),
        }
    }

    pub fn kind(&self) -> AdapterKind {
        self.kind
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self.kind, AdapterKind::Foreign { .. })
    }

    pub fn implementation(&self) -> Implementation {
        self.implementation
    }

    pub fn externalizer(&self) -> &Arc<dyn Externalizer> {
        &self.externalizer
    }
}

impl PartialEq for ExternalizerAdapter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.implementation == other.implementation
    }
}

impl Eq for ExternalizerAdapter {}

impl Hash for ExternalizerAdapter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.implementation.hash(state);
    }
}

// 适配器以其委托的插件实现名呈现。
impl fmt::Display for ExternalizerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.implementation, f)
    }
}

impl fmt::Debug for ExternalizerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalizerAdapter")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("implementation", &self.implementation)
            .finish()
    }
}
