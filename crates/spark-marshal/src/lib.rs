#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]
#![doc = "spark-marshal: 数据网格的对象编组注册表。"]
#![doc = ""]
#![doc = "== 职责 =="]
#![doc = "1. 为内置类型分配单字节内部标识（0..=254），为用户类型分配变长外部标识（哨兵字节 255 之后跟随）。"]
#![doc = "2. 编码侧按运行时类型调度插件并写出帧头；解码侧解析帧头并调度插件读取负载。"]
#![doc = "3. 管理注册表生命周期，并在查找未命中时区分“节点停机”“生命周期竞态”与“数据损坏”。"]
#![doc = ""]
#![doc = "== 线格式 =="]
#![doc = "`frame := id(0..=254) payload | 255 varint(foreign_id) payload`。两个边界（哨兵 255 与读索引最高位）决定了已落盘数据的兼容性，不可更改。"]

pub mod adapter;
pub mod cancellation;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod externalizer;
pub mod exts;
pub mod ids;
pub mod internal;
pub mod marshaller;
pub mod spi;
pub mod table;
/// 测试桩命名空间，集中暴露 `Noop` 协作方实现，供测试与基准复用。
pub mod test_stubs;
pub mod varint;

pub use adapter::{AdapterKind, ExternalizerAdapter};
pub use cancellation::Cancellation;
pub use config::{
    DEFAULT_MARSHALL_VERSION, ExternalizerConfig, GlobalConfiguration, SerializationConfig,
};
pub use descriptor::{ExternalizerDescriptor, HandledType, TypeCatalog, TypeDescriptor};
pub use error::{ConfigurationError, ErrorCategory, Interrupted, MarshalError, codes};
pub use externalizer::{
    Externalizer, Implementation, MAX_NESTING_DEPTH, ObjectInput, ObjectOutput, Value,
    downcast_object, downcast_value,
};
pub use ids::ReaderIndex;
pub use internal::{ExternalizerFactory, InternalExternalizer};
pub use marshaller::GridMarshaller;
pub use spi::{Dependencies, RemoteCommandFactory, StreamingMarshaller};
pub use table::ExternalizerTable;
