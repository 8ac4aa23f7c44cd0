use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::externalizer::Externalizer;
use crate::spi::Dependencies;

/// 根据启动时注入的协作方实例化一个 Externalizer。
///
/// # 设计初衷（Why）
/// - 插件实例与注入的协作方绑定，必须在 `start` 时才能构造，因此注册阶段只保存工厂；
/// - 闭包自动实现该 trait，组合二进制可以直接写 `|deps| Arc::new(..)`。
pub trait ExternalizerFactory: Send + Sync + 'static {
    fn instantiate(&self, dependencies: &Dependencies) -> Arc<dyn Externalizer>;
}

impl<F> ExternalizerFactory for F
where
    F: Fn(&Dependencies) -> Arc<dyn Externalizer> + Send + Sync + 'static,
{
    fn instantiate(&self, dependencies: &Dependencies) -> Arc<dyn Externalizer> {
        self(dependencies)
    }
}

/// 内置 Externalizer 的声明：名称、工厂与是否属于可选模块。
///
/// # 契约说明（What）
/// - `name` 用于去重：同名声明只保留第一次登记；
/// - `optional = true` 时，插件按名称声明的处理类型若无法解析，则跳过该插件并记录 debug 日志；
///   否则启动失败。
#[derive(Clone)]
pub struct InternalExternalizer {
    name: Cow<'static, str>,
    factory: Arc<dyn ExternalizerFactory>,
    optional: bool,
}

impl InternalExternalizer {
    /// 必需的内置插件。
    pub fn new(name: impl Into<Cow<'static, str>>, factory: Arc<dyn ExternalizerFactory>) -> Self {
        Self {
            name: name.into(),
            factory,
            optional: false,
        }
    }

    /// 属于可选模块的内置插件。
    pub fn optional(
        name: impl Into<Cow<'static, str>>,
        factory: Arc<dyn ExternalizerFactory>,
    ) -> Self {
        Self {
            optional: true,
            ..Self::new(name, factory)
        }
    }

    /// 以类型名为名称、以 `Default` 构造的无依赖插件。
    pub fn of<E>() -> Self
    where
        E: Externalizer + Default,
    {
        let factory: Arc<dyn ExternalizerFactory> =
            Arc::new(|_: &Dependencies| -> Arc<dyn Externalizer> { Arc::new(E::default()) });
        Self::new(std::any::type_name::<E>(), factory)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn instantiate(&self, dependencies: &Dependencies) -> Arc<dyn Externalizer> {
        self.factory.instantiate(dependencies)
    }
}

impl fmt::Debug for InternalExternalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalExternalizer")
            .field("name", &self.name)
            .field("optional", &self.optional)
            .finish()
    }
}
