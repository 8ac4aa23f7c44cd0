//! 插件的静态描述符与按名称解析的类型目录。
//!
//! ## 意图（Why）
//! - 插件不再通过扫描注解发现自身标识与处理类型，而是在注册时附带一份显式描述符；
//! - 可选模块或配置文件只能以名称引用类型与插件类，[`TypeCatalog`] 由组合二进制在启动前填充，
//!   取代运行时的反射加载。

use std::any::{Any, TypeId, type_name};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::internal::ExternalizerFactory;

/// 运行时类型的稳定标识，附带可读名称用于日志与错误信息。
///
/// 相等性与哈希只比较 [`TypeId`]。
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
}

impl TypeDescriptor {
    /// 构造 `T` 的描述符。
    pub fn of<T: Any>() -> Self {
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

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 插件声明的一个处理类型：直接给出描述符，或给出待解析的类型名。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandledType {
    Type(TypeDescriptor),
    Named(Cow<'static, str>),
}

/// 插件的静态描述符：可选的默认标识 + 有序的处理类型列表。
///
/// # 契约说明（What）
/// - 内置插件必须声明标识；用户插件的标识可由配置覆盖，未声明时由配置提供；
/// - 处理类型至少一个，否则启动失败；
/// - 多个类型可共享同一插件，例如 `HashMap` 与 `BTreeMap` 共用同一个映射编解码器。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExternalizerDescriptor {
    id: Option<i32>,
    types: Vec<HandledType>,
}

impl ExternalizerDescriptor {
    /// 创建未声明标识、未声明类型的空描述符。
    pub fn new() -> Self {
        Self::default()
    }

    /// 以给定默认标识创建描述符。
    pub fn with_id(id: i32) -> Self {
        Self {
            id: Some(id),
            types: Vec::new(),
        }
    }

    /// 追加一个直接给出的处理类型。
    pub fn handles<T: Any>(mut self) -> Self {
        self.types.push(HandledType::Type(TypeDescriptor::of::<T>()));
        self
    }

    /// 追加一个按名称声明的处理类型，启动时经 [`TypeCatalog`] 解析。
    pub fn handles_named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.types.push(HandledType::Named(name.into()));
        self
    }

    pub fn id(&self) -> Option<i32> {
        self.id
    }

    pub fn types(&self) -> &[HandledType] {
        &self.types
    }
}

/// 名称到类型、名称到插件工厂的目录。
///
/// # 教案式说明
/// - **意图 (Why)**：配置文件只能以字符串引用插件类，可选模块也只能以名称声明处理类型；
///   目录在启动前由各模块显式登记，取代运行时类加载；
/// - **契约 (What)**：重复登记同名条目时以后者为准；目录不随 `stop` 清空，语义上等同于“类路径”；
/// - **风险 (Trade-offs)**：名称拼写错误只会在 `start` 时暴露，调用方应在集成测试中覆盖配置文件。
#[derive(Default)]
pub struct TypeCatalog {
    types: HashMap<Cow<'static, str>, TypeDescriptor>,
    externalizers: HashMap<Cow<'static, str>, Arc<dyn ExternalizerFactory>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以名称登记类型 `T`。
    pub fn register_type<T: Any>(&mut self, name: impl Into<Cow<'static, str>>) {
        self.types.insert(name.into(), TypeDescriptor::of::<T>());
    }

    /// 以名称登记插件工厂，供配置按类名引用。
    pub fn register_externalizer(
        &mut self,
        class: impl Into<Cow<'static, str>>,
        factory: Arc<dyn ExternalizerFactory>,
    ) {
        self.externalizers.insert(class.into(), factory);
    }

    /// 按名称解析类型。
    pub fn resolve_type(&self, name: &str) -> Option<TypeDescriptor> {
        self.types.get(name).copied()
    }

    /// 按类名查找插件工厂。
    pub fn externalizer(&self, class: &str) -> Option<Arc<dyn ExternalizerFactory>> {
        self.externalizers.get(class).cloned()
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .field(
                "externalizers",
                &self.externalizers.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
