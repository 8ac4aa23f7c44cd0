use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::ExternalizerDescriptor;
use crate::error::MarshalError;
use crate::externalizer::{Externalizer, ObjectInput, ObjectOutput, Value, downcast_object};
use crate::ids;

/// 远端调用成功的响应，可携带任意已登记类型的返回值。
#[derive(Clone, Default)]
pub struct SuccessfulResponse {
    value: Option<Arc<dyn Any + Send + Sync>>,
}

impl SuccessfulResponse {
    pub fn new(value: impl Any + Send + Sync) -> Self {
        Self {
            value: Some(Arc::new(value)),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn value(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.value.as_deref()
    }

    /// 以 `T` 视角读取返回值。
    pub fn value_as<T: Any>(&self) -> Option<&T> {
        self.value()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for SuccessfulResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuccessfulResponse")
            .field("has_value", &self.value.is_some())
            .finish()
    }
}

/// 远端调用未成功。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnsuccessfulResponse;

/// 远端节点忽略了请求。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestIgnoredResponse;

#[derive(Debug, Default)]
pub struct SuccessfulResponseExternalizer;

impl Externalizer for SuccessfulResponseExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(i32::from(ids::SUCCESSFUL_RESPONSE))
            .handles::<SuccessfulResponse>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        match downcast_object::<SuccessfulResponse>(object)?.value() {
            Some(value) => {
                output.write_bool(true);
                output.write_object(value)
            }
            None => {
                output.write_bool(false);
                Ok(())
            }
        }
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        let value = if input.read_bool()? {
            Some(Arc::from(input.read_object()?))
        } else {
            None
        };
        Ok(Box::new(SuccessfulResponse { value }))
    }
}

#[derive(Debug, Default)]
pub struct UnsuccessfulResponseExternalizer;

impl Externalizer for UnsuccessfulResponseExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(i32::from(ids::UNSUCCESSFUL_RESPONSE))
            .handles::<UnsuccessfulResponse>()
    }

    fn write_object(
        &self,
        _: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        downcast_object::<UnsuccessfulResponse>(object).map(|_| ())
    }

    fn read_object(&self, _: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        Ok(Box::new(UnsuccessfulResponse))
    }
}

#[derive(Debug, Default)]
pub struct RequestIgnoredResponseExternalizer;

impl Externalizer for RequestIgnoredResponseExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(i32::from(ids::REQUEST_IGNORED_RESPONSE))
            .handles::<RequestIgnoredResponse>()
    }

    fn write_object(
        &self,
        _: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        downcast_object::<RequestIgnoredResponse>(object).map(|_| ())
    }

    fn read_object(&self, _: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        Ok(Box::new(RequestIgnoredResponse))
    }
}
