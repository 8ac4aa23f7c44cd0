//! # table 模块说明
//!
//! ## 角色定位（Why）
//! - `ExternalizerTable` 是编组层的核心：编码侧按运行时类型查找适配器，解码侧按读索引查找适配器；
//! - 它同时是生命周期控制器，负责在 `start` 时一次性装配全部插件，在 `stop` 时整体清空。
//!
//! ## 并发模型（How）
//! - 两张表与运行标记组成一个不可变快照 `Tables`，由 `ArcSwap` 持有：
//!   读路径零锁，写路径整表替换；
//! - 运行标记随快照一同发布，查找方不会观察到“表已填充但标记为停止”或相反的撕裂状态；
//! - `start`/`stop` 由单一生命周期线程调用，彼此不做并发保护，但其效果对并发查找立即可见。
//!
//! ## 错误归类（What）
//! - 解码未命中时：运行中为 [`MarshalError::UnknownType`]；已停止且调用方已取消为
//!   [`MarshalError::ShuttingDown`]；已停止但未取消为 [`MarshalError::NotRunning`]；
//! - 编码侧查找未命中且调用方已取消时升级为 [`MarshalError::ShuttingDown`]，否则返回 `None` 供探测使用。

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::{Buf, BufMut};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace};

use crate::adapter::ExternalizerAdapter;
use crate::cancellation::Cancellation;
use crate::config::{ExternalizerConfig, GlobalConfiguration};
use crate::descriptor::{ExternalizerDescriptor, HandledType, TypeCatalog, TypeDescriptor};
use crate::error::{ConfigurationError, MarshalError};
use crate::externalizer::{ObjectInput, ObjectOutput, Value, runtime_type};
use crate::exts::builtin_externalizers;
use crate::ids::{self, MAX_FOREIGN_ID, MAX_ID, ReaderIndex};
use crate::internal::{ExternalizerFactory, InternalExternalizer};
use crate::spi::{Dependencies, RemoteCommandFactory, StreamingMarshaller};

/// 已发布的查找快照。
#[derive(Clone, Default)]
struct Tables {
    started: bool,
    writers: HashMap<TypeId, Arc<ExternalizerAdapter>>,
    readers: HashMap<ReaderIndex, Arc<ExternalizerAdapter>>,
}

impl Tables {
    /// 登记一个适配器及其处理的全部类型。
    ///
    /// 同一读索引只允许相等的适配器重复出现；不同实现争用同一索引即为配置错误。
    fn register(
        &mut self,
        types: &[TypeDescriptor],
        adapter: Arc<ExternalizerAdapter>,
    ) -> Result<(), ConfigurationError> {
        let reader_index = adapter.reader_index();
        for ty in types {
            if let Some(existing) = self.readers.get(&reader_index)
                && **existing != *adapter
            {
                return Err(ConfigurationError::DuplicateId {
                    externalizer_id: adapter.externalizer_id(),
                    type_name: ty.name(),
                    rejected: adapter.to_string(),
                    existing: existing.to_string(),
                    reader_index,
                });
            }
            if let Some(previous) = self.writers.insert(ty.id(), Arc::clone(&adapter))
                && *previous != *adapter
            {
                debug!(
                    type_name = ty.name(),
                    previous = %previous,
                    current = %adapter,
                    "writer entry replaced by a later externalizer"
                );
            }
            trace!(
                type_name = ty.name(),
                externalizer = %adapter,
                reader_index = %reader_index,
                "registered externalizer"
            );
            self.readers.insert(reader_index, Arc::clone(&adapter));
        }
        Ok(())
    }
}

/// 对象编组注册表。
///
/// # 教案式说明
/// - **意图 (Why)**：为内置类型分配单字节标识、为用户类型分配变长外部标识，并在两套命名空间之间保证永不冲突；
/// - **契约 (What)**：
///   - 注册表要么为空（停止），要么完整填充（运行），`start` 失败不会留下部分填充的表；
///   - 类型目录与 [`add_internal_externalizer`](Self::add_internal_externalizer) 必须在 `start` 之前完成；
///   - 所有查找方法可被任意多个线程并发调用；
/// - **风险 (Trade-offs)**：整表替换意味着 `unregister_type` 需要复制两张表，适用于低频的模块卸载而非热路径。
pub struct ExternalizerTable {
    internal_externalizers: Mutex<Vec<InternalExternalizer>>,
    catalog: RwLock<TypeCatalog>,
    tables: ArcSwap<Tables>,
}

impl Default for ExternalizerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalizerTable {
    pub fn new() -> Self {
        Self {
            internal_externalizers: Mutex::new(Vec::new()),
            catalog: RwLock::new(TypeCatalog::new()),
            tables: ArcSwap::from_pointee(Tables::default()),
        }
    }

    /// 在启动前追加一个内置插件，同名声明只保留第一次。
    ///
    /// 返回是否真正追加；运行态调用返回 [`ConfigurationError::AlreadyStarted`]。
    pub fn add_internal_externalizer(
        &self,
        externalizer: InternalExternalizer,
    ) -> Result<bool, ConfigurationError> {
        if self.is_started() {
            return Err(ConfigurationError::AlreadyStarted);
        }
        let mut extras = self.internal_externalizers.lock();
        if extras.iter().any(|known| known.name() == externalizer.name()) {
            return Ok(false);
        }
        extras.push(externalizer);
        Ok(true)
    }

    /// 以名称登记类型，供按名称声明的处理类型解析。
    pub fn register_type<T: Any>(&self, name: impl Into<Cow<'static, str>>) {
        self.catalog.write().register_type::<T>(name);
    }

    /// 以类名登记插件工厂，供配置文件引用。
    pub fn register_externalizer_class(
        &self,
        class: impl Into<Cow<'static, str>>,
        factory: Arc<dyn ExternalizerFactory>,
    ) {
        self.catalog.write().register_externalizer(class, factory);
    }

    /// 装配并发布全部插件。
    ///
    /// # 执行步骤（How）
    /// 1. 以注入的协作方实例化内置插件与额外登记的内部插件，校验标识后登记；
    /// 2. 按配置顺序加载用户插件，解析外部标识后登记；
    /// 3. 全部成功后一次性发布带运行标记的快照。任一步失败则直接返回错误，已发布的快照保持不变。
    pub fn start(
        &self,
        command_factory: Arc<dyn RemoteCommandFactory>,
        marshaller: Arc<dyn StreamingMarshaller>,
        config: &GlobalConfiguration,
    ) -> Result<(), ConfigurationError> {
        if self.is_started() {
            return Err(ConfigurationError::AlreadyStarted);
        }
        let dependencies = Dependencies::new(command_factory, marshaller);
        let catalog = self.catalog.read();
        let extras = self.internal_externalizers.lock().clone();

        let mut tables = Tables::default();
        let mut seen = HashSet::new();
        for declaration in builtin_externalizers().into_iter().chain(extras) {
            if !seen.insert(declaration.name().to_owned()) {
                continue;
            }
            load_internal(&mut tables, &catalog, &dependencies, &declaration)?;
        }
        for (position, entry) in config.serialization().externalizers().iter().enumerate() {
            load_foreign(&mut tables, &catalog, &dependencies, position, entry)?;
        }

        trace!(readers = ?DumpReaders(&tables.readers), "reader index table after start");
        trace!(writers = ?DumpWriters(&tables.writers), "writer index table after start");
        tables.started = true;
        let (readers, writers) = (tables.readers.len(), tables.writers.len());
        self.tables.store(Arc::new(tables));
        info!(
            cluster = %config.cluster_name,
            readers,
            writers,
            "externalizer table started"
        );
        Ok(())
    }

    /// 清空全部表与额外登记的内部插件，并翻转运行标记。幂等。
    pub fn stop(&self) {
        self.internal_externalizers.lock().clear();
        let previous = self.tables.swap(Arc::new(Tables::default()));
        if previous.started {
            debug!("externalizer table stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.tables.load().started
    }

    /// 查找编码 `object` 的适配器。
    ///
    /// 未命中且调用方已取消时返回 [`MarshalError::ShuttingDown`]，否则返回 `Ok(None)`。
    pub fn object_writer(
        &self,
        object: &(dyn Any + Send + Sync),
        cancellation: &Cancellation,
    ) -> Result<Option<Arc<ExternalizerAdapter>>, MarshalError> {
        let type_id = runtime_type(object);
        if let Some(adapter) = self.tables.load().writers.get(&type_id) {
            return Ok(Some(Arc::clone(adapter)));
        }
        trace!(?type_id, "no externalizer registered for runtime type");
        if cancellation.is_cancelled() {
            return Err(MarshalError::shutting_down(format!("type {type_id:?}")));
        }
        Ok(None)
    }

    /// 写出 `object` 的完整帧；没有对应插件时返回 [`MarshalError::NotMarshallable`]。
    pub fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        let adapter = self
            .object_writer(object, output.cancellation())?
            .ok_or_else(|| MarshalError::NotMarshallable {
                type_id: runtime_type(object),
            })?;
        adapter.write_object(output, object)
    }

    /// 读取一个完整帧：先解析标识，再委托适配器读负载。
    pub fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        let id = input.read_u8()?;
        let reader_index = if id == MAX_ID {
            let foreign_id = input.read_unsigned_int()?;
            if foreign_id > MAX_FOREIGN_ID {
                return Err(MarshalError::malformed(format!(
                    "foreign id {foreign_id} overlaps the reader namespace flag"
                )));
            }
            ReaderIndex::foreign(foreign_id)
        } else {
            ReaderIndex::internal(id)
        };

        let adapter = {
            let tables = self.tables.load();
            match tables.readers.get(&reader_index) {
                Some(adapter) => Arc::clone(adapter),
                None => return Err(reader_miss(&tables, reader_index, input.cancellation())),
            }
        };
        adapter.read_object(input)
    }

    /// 将 `object` 编码到 `buf`。
    pub fn encode(
        &self,
        buf: &mut dyn BufMut,
        object: &(dyn Any + Send + Sync),
        cancellation: &Cancellation,
    ) -> Result<(), MarshalError> {
        ObjectOutput::new(buf, self, cancellation).write_object(object)
    }

    /// 从 `buf` 解码一个值。
    pub fn decode(
        &self,
        buf: &mut dyn Buf,
        cancellation: &Cancellation,
    ) -> Result<Value, MarshalError> {
        ObjectInput::new(buf, self, cancellation).read_object()
    }

    /// 写表中是否存在 `object` 运行时类型的条目。
    pub fn is_marshallable(&self, object: &(dyn Any + Send + Sync)) -> bool {
        self.tables.load().writers.contains_key(&runtime_type(object))
    }

    /// `object` 对应插件的对外标识；外部插件返回外部标识而非哨兵。
    ///
    /// 类型未登记时返回 `None`，调用方应视为编程错误。
    pub fn externalizer_id(&self, object: &(dyn Any + Send + Sync)) -> Option<u32> {
        self.tables
            .load()
            .writers
            .get(&runtime_type(object))
            .map(|adapter| adapter.externalizer_id())
    }

    /// 移除一个类型的写表条目。若该适配器不再被任何类型引用，同时移除其读表条目。
    ///
    /// 返回是否移除了条目。
    pub fn unregister_type(&self, ty: TypeDescriptor) -> bool {
        let mut removed = false;
        self.tables.rcu(|current| {
            let mut next = Tables::clone(current);
            removed = false;
            if let Some(adapter) = next.writers.remove(&ty.id()) {
                removed = true;
                let still_referenced = next.writers.values().any(|other| **other == *adapter);
                let reader_index = adapter.reader_index();
                if !still_referenced
                    && next
                        .readers
                        .get(&reader_index)
                        .is_some_and(|entry| **entry == *adapter)
                {
                    next.readers.remove(&reader_index);
                }
            }
            next
        });
        if removed {
            debug!(type_name = ty.name(), "externalizer type unregistered");
        }
        removed
    }

    pub fn reader_count(&self) -> usize {
        self.tables.load().readers.len()
    }

    pub fn writer_count(&self) -> usize {
        self.tables.load().writers.len()
    }
}

impl fmt::Debug for ExternalizerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.load();
        f.debug_struct("ExternalizerTable")
            .field("started", &tables.started)
            .field("readers", &tables.readers.len())
            .field("writers", &tables.writers.len())
            .finish()
    }
}

fn reader_miss(
    tables: &Tables,
    reader_index: ReaderIndex,
    cancellation: &Cancellation,
) -> MarshalError {
    if tables.started {
        trace!(
            %reader_index,
            known = ?DumpReaders(&tables.readers),
            "unknown reader index"
        );
        MarshalError::UnknownType { reader_index }
    } else if cancellation.is_cancelled() {
        MarshalError::shutting_down(format!("type (id={reader_index})"))
    } else {
        MarshalError::NotRunning { reader_index }
    }
}

fn load_internal(
    tables: &mut Tables,
    catalog: &TypeCatalog,
    dependencies: &Dependencies,
    declaration: &InternalExternalizer,
) -> Result<(), ConfigurationError> {
    let externalizer = declaration.instantiate(dependencies);
    let name = externalizer.implementation().name();
    let descriptor = externalizer.descriptor();
    let id = ids::check_internal_id(descriptor.id(), name)?;
    let types = match resolve_types(&descriptor, catalog, name) {
        Ok(types) => types,
        Err(err @ ConfigurationError::UnresolvedType { .. }) if declaration.is_optional() => {
            debug!(
                externalizer = declaration.name(),
                error = %err,
                "optional externalizer skipped"
            );
            return Ok(());
        }
        Err(err) => return Err(err),
    };
    tables.register(&types, Arc::new(ExternalizerAdapter::internal(id, externalizer)))
}

fn load_foreign(
    tables: &mut Tables,
    catalog: &TypeCatalog,
    dependencies: &Dependencies,
    position: usize,
    entry: &ExternalizerConfig,
) -> Result<(), ConfigurationError> {
    let externalizer = match (&entry.externalizer, &entry.class_name) {
        (Some(externalizer), _) => Arc::clone(externalizer),
        (None, Some(class)) => catalog
            .externalizer(class)
            .ok_or_else(|| ConfigurationError::UnknownExternalizerClass {
                class: class.clone(),
            })?
            .instantiate(dependencies),
        (None, None) => return Err(ConfigurationError::MissingExternalizer { position }),
    };
    let name = externalizer.implementation().name();
    let descriptor = externalizer.descriptor();
    let foreign_id = ids::resolve_foreign_id(entry.id, descriptor.id(), name)?;
    let types = resolve_types(&descriptor, catalog, name)?;
    tables.register(
        &types,
        Arc::new(ExternalizerAdapter::foreign(foreign_id, externalizer)),
    )
}

fn resolve_types(
    descriptor: &ExternalizerDescriptor,
    catalog: &TypeCatalog,
    externalizer: &str,
) -> Result<Vec<TypeDescriptor>, ConfigurationError> {
    if descriptor.types().is_empty() {
        return Err(ConfigurationError::NoHandledTypes {
            externalizer: externalizer.to_owned(),
        });
    }
    descriptor
        .types()
        .iter()
        .map(|handled| match handled {
            HandledType::Type(ty) => Ok(*ty),
            HandledType::Named(type_name) => catalog.resolve_type(type_name).ok_or_else(|| {
                ConfigurationError::UnresolvedType {
                    externalizer: externalizer.to_owned(),
                    type_name: type_name.to_string(),
                }
            }),
        })
        .collect()
}

struct DumpReaders<'a>(&'a HashMap<ReaderIndex, Arc<ExternalizerAdapter>>);

impl fmt::Debug for DumpReaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by_key(|(index, _)| **index);
        f.debug_map()
            .entries(entries.into_iter().map(|(index, adapter)| (index.get(), adapter.to_string())))
            .finish()
    }
}

struct DumpWriters<'a>(&'a HashMap<TypeId, Arc<ExternalizerAdapter>>);

impl fmt::Debug for DumpWriters<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.values().map(|adapter| adapter.to_string()))
            .finish()
    }
}
