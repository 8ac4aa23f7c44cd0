use std::any::{Any, TypeId, type_name};
use std::fmt;

use bytes::{Buf, BufMut, Bytes};

use crate::cancellation::Cancellation;
use crate::descriptor::ExternalizerDescriptor;
use crate::error::MarshalError;
use crate::table::ExternalizerTable;
use crate::varint;

/// 单次解码允许的最大嵌套帧层数，含最外层帧。
pub const MAX_NESTING_DEPTH: u16 = 128;

/// 解码产物：类型擦除后的拥有型值，调用方按约定类型 `downcast`。
pub type Value = Box<dyn Any + Send + Sync>;

/// `Externalizer` 是一个或多个逻辑类型的编解码插件。
///
/// # 设计初衷（Why）
/// - 注册表只负责“类型 → 标识 → 插件”的调度，具体负载格式由插件自行决定；
/// - 插件以 trait 对象形式存放在注册表中，因此接口保持对象安全，值以 `dyn Any` 传递。
///
/// # 契约说明（What）
/// - [`descriptor`](Self::descriptor)：声明默认标识与处理类型，在启动时读取一次；
/// - [`write_object`](Self::write_object)：只写负载，帧头已由适配器写入；
/// - [`read_object`](Self::read_object)：只读负载，帧头已被注册表消费；
/// - [`implementation`](Self::implementation)：具体实现类型的身份，适配器相等性以此为准，实现方不应覆盖。
///
/// # 风险提示（Trade-offs）
/// - 每次编码都需要一次 `downcast`，可借助 [`downcast_object`] 统一生成类型不匹配错误。
pub trait Externalizer: Send + Sync + 'static {
    /// 返回插件的静态描述符。
    fn descriptor(&self) -> ExternalizerDescriptor;

    /// 将 `object` 的负载写入输出流。
    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError>;

    /// 从输入流读取负载并重建值。
    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError>;

    /// 返回具体实现类型的身份。
    fn implementation(&self) -> Implementation {
        Implementation::of::<Self>()
    }
}

/// 插件实现类型的身份：`TypeId` 参与相等性，名称用于日志。
#[derive(Clone, Copy)]
pub struct Implementation {
    id: TypeId,
    name: &'static str,
}

impl Implementation {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Implementation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Implementation {}

impl std::hash::Hash for Implementation {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 将类型擦除的值还原为 `T`，失败时返回 [`MarshalError::TypeMismatch`]。
pub fn downcast_object<T: Any>(object: &(dyn Any + Send + Sync)) -> Result<&T, MarshalError> {
    object
        .downcast_ref::<T>()
        .ok_or(MarshalError::TypeMismatch {
            expected: type_name::<T>(),
        })
}

/// 取出嵌套读取得到的拥有型值。
pub fn downcast_value<T: Any>(value: Value) -> Result<T, MarshalError> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| MarshalError::TypeMismatch {
            expected: type_name::<T>(),
        })
}

/// 值的运行时类型。
pub(crate) fn runtime_type(object: &(dyn Any + Send + Sync)) -> TypeId {
    let object: &dyn Any = object;
    object.type_id()
}

/// 编码侧的对象输出流。
///
/// # 教案式说明
/// - **意图 (Why)**：插件除了写入基本类型，还需要把嵌套对象交回注册表编码（例如事务里的节点地址），
///   因此输出流同时持有底层缓冲、注册表引用与调用方的取消令牌；
/// - **契约 (What)**：基本类型按大端写入；字节串与字符串以变长长度前缀；
///   [`write_object`](Self::write_object) 写出完整的帧（标识 + 负载）。
pub struct ObjectOutput<'a> {
    buf: &'a mut dyn BufMut,
    table: &'a ExternalizerTable,
    cancellation: &'a Cancellation,
}

impl<'a> ObjectOutput<'a> {
    pub fn new(
        buf: &'a mut dyn BufMut,
        table: &'a ExternalizerTable,
        cancellation: &'a Cancellation,
    ) -> Self {
        Self {
            buf,
            table,
            cancellation,
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_unsigned_int(&mut self, value: u32) {
        varint::write_unsigned_int(self.buf, value);
    }

    pub fn write_unsigned_long(&mut self, value: u64) {
        varint::write_unsigned_long(self.buf, value);
    }

    /// 写入带变长长度前缀的字节串。
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        varint::write_unsigned_long(self.buf, bytes.len() as u64);
        self.buf.put_slice(bytes);
    }

    /// 写入 UTF-8 字符串。
    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// 将嵌套对象交回注册表，写出完整的帧。
    pub fn write_object(&mut self, object: &(dyn Any + Send + Sync)) -> Result<(), MarshalError> {
        let table = self.table;
        table.write_object(self, object)
    }

    pub fn cancellation(&self) -> &Cancellation {
        self.cancellation
    }
}

/// 解码侧的对象输入流，与 [`ObjectOutput`] 对称。
///
/// 所有读取在数据不足时返回 [`MarshalError::Truncated`]，不会越界 panic。
/// 嵌套帧层数受 [`MAX_NESTING_DEPTH`] 约束，超过时返回 [`MarshalError::NestingTooDeep`]。
pub struct ObjectInput<'a> {
    buf: &'a mut dyn Buf,
    table: &'a ExternalizerTable,
    cancellation: &'a Cancellation,
    depth: u16,
}

impl<'a> ObjectInput<'a> {
    pub fn new(
        buf: &'a mut dyn Buf,
        table: &'a ExternalizerTable,
        cancellation: &'a Cancellation,
    ) -> Self {
        Self {
            buf,
            table,
            cancellation,
            depth: 0,
        }
    }

    /// 当前所处的嵌套帧层数；最外层帧读取期间为 1。
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// 剩余可读字节数。
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), MarshalError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(MarshalError::Truncated { needed, remaining });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, MarshalError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self) -> Result<bool, MarshalError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(MarshalError::malformed(format!(
                "invalid boolean marker {other}"
            ))),
        }
    }

    pub fn read_u16(&mut self) -> Result<u16, MarshalError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_i32(&mut self) -> Result<i32, MarshalError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_i64(&mut self) -> Result<i64, MarshalError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_unsigned_int(&mut self) -> Result<u32, MarshalError> {
        varint::read_unsigned_int(self.buf)
    }

    pub fn read_unsigned_long(&mut self) -> Result<u64, MarshalError> {
        varint::read_unsigned_long(self.buf)
    }

    /// 读取带变长长度前缀的字节串。
    pub fn read_bytes(&mut self) -> Result<Bytes, MarshalError> {
        let len = self.read_unsigned_long()?;
        let len = usize::try_from(len).map_err(|_| MarshalError::VarintOverflow {
            bits: usize::BITS,
        })?;
        self.ensure(len)?;
        Ok(self.buf.copy_to_bytes(len))
    }

    /// 读取 UTF-8 字符串。
    pub fn read_string(&mut self) -> Result<String, MarshalError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|err| MarshalError::malformed(format!("invalid utf-8 string: {err}")))
    }

    /// 读取一个完整的嵌套帧。
    ///
    /// 进入前检查层数，返回后恢复层数；失败路径同样恢复，输入流可继续用于诊断。
    pub fn read_object(&mut self) -> Result<Value, MarshalError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(MarshalError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
            });
        }
        self.depth += 1;
        let table = self.table;
        let result = table.read_object(self);
        self.depth -= 1;
        result
    }

    pub fn cancellation(&self) -> &Cancellation {
        self.cancellation
    }
}
