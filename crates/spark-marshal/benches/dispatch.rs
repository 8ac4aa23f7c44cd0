use std::any::Any;
use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use spark_marshal::exts::key::ByteArrayKey;
use spark_marshal::test_stubs::{NoopCommandFactory, NoopMarshaller};
use spark_marshal::{
    Cancellation, ExternalizerDescriptor, ExternalizerTable, Externalizer, GlobalConfiguration,
    MarshalError, ObjectInput, ObjectOutput, Value, downcast_object,
};

struct Sample(u64);

struct SampleExternalizer;

impl Externalizer for SampleExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(100_000).handles::<Sample>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        output.write_unsigned_long(downcast_object::<Sample>(object)?.0);
        Ok(())
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        Ok(Box::new(Sample(input.read_unsigned_long()?)))
    }
}

/// 内部与外部帧的编解码调度开销。
///
/// # 设计目的（Why）
/// - 查表路径是每条消息都会经过的热路径，基准用于观察 `ArcSwap` 快照读取与帧头编解码的成本；
/// - 内部帧（单字节标识）与外部帧（哨兵 + 三字节变长标识）分开测量，便于对比两种命名空间的差异。
fn bench_dispatch(c: &mut Criterion) {
    let mut config = GlobalConfiguration::default();
    config
        .serialization_mut()
        .add_externalizer(Arc::new(SampleExternalizer));
    let table = ExternalizerTable::new();
    if let Err(err) = table.start(Arc::new(NoopCommandFactory), Arc::new(NoopMarshaller), &config) {
        panic!("benchmark table failed to start: {err}");
    }
    let cancellation = Cancellation::new();

    let key = ByteArrayKey::new(&b"benchmark-key"[..]);
    c.bench_function("encode_decode_internal", |b| {
        let mut buf = Vec::<u8>::with_capacity(64);
        b.iter(|| {
            buf.clear();
            table.encode(&mut buf, black_box(&key), &cancellation).ok();
            black_box(table.decode(&mut buf.as_slice(), &cancellation).ok())
        })
    });

    let sample = Sample(u64::from(u32::MAX));
    c.bench_function("encode_decode_foreign", |b| {
        let mut buf = Vec::<u8>::with_capacity(64);
        b.iter(|| {
            buf.clear();
            table.encode(&mut buf, black_box(&sample), &cancellation).ok();
            black_box(table.decode(&mut buf.as_slice(), &cancellation).ok())
        })
    });

    c.bench_function("is_marshallable", |b| {
        b.iter(|| table.is_marshallable(black_box(&sample)))
    });
}

criterion_group!(marshal_benches, bench_dispatch);
criterion_main!(marshal_benches);
