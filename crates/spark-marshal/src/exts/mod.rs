//! 内置 Externalizer 集合。
//!
//! 每个插件在描述符中声明固定的内部标识（见 [`crate::ids`]）。只有两个插件依赖注入的协作方：
//! [`MarshalledValueExternalizer`](marshalled::MarshalledValueExternalizer) 捕获独立缓冲编组器，
//! [`ReplicableCommandExternalizer`](command::ReplicableCommandExternalizer) 捕获命令工厂。

pub mod collections;
pub mod command;
pub mod entries;
pub mod key;
pub mod marshalled;
pub mod responses;
pub mod transaction;

use std::any::type_name;
use std::sync::Arc;

use crate::externalizer::Externalizer;
use crate::internal::{ExternalizerFactory, InternalExternalizer};
use crate::spi::Dependencies;

use self::command::ReplicableCommandExternalizer;
use self::marshalled::MarshalledValueExternalizer;

/// `start` 每次装配的内置插件列表。
pub fn builtin_externalizers() -> Vec<InternalExternalizer> {
    let marshalled: Arc<dyn ExternalizerFactory> =
        Arc::new(|deps: &Dependencies| -> Arc<dyn Externalizer> {
            Arc::new(MarshalledValueExternalizer::new(Arc::clone(
                deps.marshaller(),
            )))
        });
    let command: Arc<dyn ExternalizerFactory> =
        Arc::new(|deps: &Dependencies| -> Arc<dyn Externalizer> {
            Arc::new(ReplicableCommandExternalizer::new(Arc::clone(
                deps.command_factory(),
            )))
        });

    vec![
        InternalExternalizer::of::<collections::MapExternalizer>(),
        InternalExternalizer::of::<transaction::NodeAddressExternalizer>(),
        InternalExternalizer::of::<transaction::GlobalTransactionExternalizer>(),
        InternalExternalizer::new(type_name::<MarshalledValueExternalizer>(), marshalled),
        InternalExternalizer::of::<responses::SuccessfulResponseExternalizer>(),
        InternalExternalizer::of::<responses::UnsuccessfulResponseExternalizer>(),
        InternalExternalizer::of::<responses::RequestIgnoredResponseExternalizer>(),
        InternalExternalizer::new(type_name::<ReplicableCommandExternalizer>(), command),
        InternalExternalizer::of::<entries::ImmortalCacheEntryExternalizer>(),
        InternalExternalizer::of::<entries::MortalCacheEntryExternalizer>(),
        InternalExternalizer::of::<key::ByteArrayKeyExternalizer>(),
    ]
}
