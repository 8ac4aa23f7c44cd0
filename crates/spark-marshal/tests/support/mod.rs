//! 集成测试共享夹具：用户类型、对应的 Externalizer 与启动辅助函数。
//!
//! 各测试二进制只使用其中一部分，因此放宽未使用告警。
#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;

use spark_marshal::test_stubs::NoopCommandFactory;
use spark_marshal::{
    ConfigurationError, ExternalizerDescriptor, ExternalizerTable, Externalizer,
    GlobalConfiguration, GridMarshaller, MarshalError, ObjectInput, ObjectOutput, Value,
    downcast_object,
};

/// 二维坐标，外部插件的典型负载。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// 文本标签。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label(pub String);

/// 与 [`Label`] 共享插件的第二个类型。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag(pub String);

/// 声明默认标识 300 的坐标插件。
#[derive(Debug, Default)]
pub struct PointExternalizer;

impl Externalizer for PointExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(300).handles::<Point>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        let point = downcast_object::<Point>(object)?;
        output.write_i32(point.x);
        output.write_i32(point.y);
        Ok(())
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        Ok(Box::new(Point {
            x: input.read_i32()?,
            y: input.read_i32()?,
        }))
    }
}

/// 与 [`PointExternalizer`] 声明相同默认标识、但实现不同的插件。
#[derive(Debug, Default)]
pub struct RivalPointExternalizer;

impl Externalizer for RivalPointExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(300).handles::<Label>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        output.write_str(&downcast_object::<Label>(object)?.0);
        Ok(())
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        Ok(Box::new(Label(input.read_string()?)))
    }
}

/// 未声明标识、同时处理 [`Label`] 与 [`Tag`] 的插件；标识必须由配置给出。
#[derive(Debug, Default)]
pub struct TextExternalizer;

const LABEL: u8 = 0;
const TAG: u8 = 1;

impl Externalizer for TextExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::new()
            .handles::<Label>()
            .handles::<Tag>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        if let Some(label) = object.downcast_ref::<Label>() {
            output.write_u8(LABEL);
            output.write_str(&label.0);
            return Ok(());
        }
        let tag = downcast_object::<Tag>(object)?;
        output.write_u8(TAG);
        output.write_str(&tag.0);
        Ok(())
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        let kind = input.read_u8()?;
        let text = input.read_string()?;
        match kind {
            LABEL => Ok(Box::new(Label(text))),
            TAG => Ok(Box::new(Tag(text))),
            other => Err(MarshalError::malformed(format!("unknown text kind {other}"))),
        }
    }
}

/// 以按配置版本构造的 [`GridMarshaller`] 与无操作命令工厂启动注册表。
pub fn start(
    table: &Arc<ExternalizerTable>,
    config: &GlobalConfiguration,
) -> Result<(), ConfigurationError> {
    table.start(
        Arc::new(NoopCommandFactory),
        Arc::new(GridMarshaller::from_config(Arc::clone(table), config)),
        config,
    )
}

/// 注册表与配置一并构造并启动，启动失败直接 panic。
pub fn started(config: &GlobalConfiguration) -> Arc<ExternalizerTable> {
    let table = Arc::new(ExternalizerTable::new());
    start(&table, config).expect("注册表应能以给定配置启动");
    table
}

/// 仅包含一个外部插件的配置。
pub fn config_with(id: Option<i64>, externalizer: Arc<dyn Externalizer>) -> GlobalConfiguration {
    let mut config = GlobalConfiguration::default();
    match id {
        Some(id) => config
            .serialization_mut()
            .add_externalizer_with_id(id, externalizer),
        None => config.serialization_mut().add_externalizer(externalizer),
    };
    config
}
