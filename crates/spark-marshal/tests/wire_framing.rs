//! 线格式与调度测试。
//!
//! # 教案级导览
//!
//! - **Why**：帧格式 `id(0..=254) payload | 255 varint(foreign_id) payload` 决定了已落盘数据能否被读回，
//!   因此对帧头逐字节断言，而不仅仅比较往返结果；
//! - **How**：构造内部标识 50 与外部标识 300 的插件，分别验证编码产物与解码调度；
//!   再对内置插件逐一往返，覆盖经注册表嵌套写出的对象；
//! - **What**：覆盖内部调度、未知标识、外部调度、边界外部标识、内置类型往返与畸形输入。

mod support;

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use spark_marshal::exts::command::RemoteCommand;
use spark_marshal::exts::entries::{ImmortalCacheEntry, MortalCacheEntry};
use spark_marshal::exts::key::ByteArrayKey;
use spark_marshal::exts::marshalled::MarshalledValue;
use spark_marshal::exts::responses::{
    RequestIgnoredResponse, SuccessfulResponse, UnsuccessfulResponse,
};
use spark_marshal::exts::transaction::{GlobalTransaction, NodeAddress};
use spark_marshal::ids::SUCCESSFUL_RESPONSE;
use spark_marshal::{
    Cancellation, ErrorCategory, ExternalizerDescriptor, ExternalizerTable, Externalizer,
    GlobalConfiguration, GridMarshaller, InternalExternalizer, MAX_NESTING_DEPTH, MarshalError,
    ObjectInput, ObjectOutput, ReaderIndex, StreamingMarshaller, Value, codes, downcast_object,
    varint,
};
use support::{Point, PointExternalizer, config_with, start, started};

/// 内部标识 50 的测试类型，负载为单字节。
#[derive(Debug, PartialEq)]
struct Octet(u8);

#[derive(Default)]
struct OctetExternalizer;

impl Externalizer for OctetExternalizer {
    fn descriptor(&self) -> ExternalizerDescriptor {
        ExternalizerDescriptor::with_id(50).handles::<Octet>()
    }

    fn write_object(
        &self,
        output: &mut ObjectOutput<'_>,
        object: &(dyn Any + Send + Sync),
    ) -> Result<(), MarshalError> {
        output.write_u8(downcast_object::<Octet>(object)?.0);
        Ok(())
    }

    fn read_object(&self, input: &mut ObjectInput<'_>) -> Result<Value, MarshalError> {
        Ok(Box::new(Octet(input.read_u8()?.wrapping_add(100))))
    }
}

fn octet_table() -> Arc<ExternalizerTable> {
    let table = Arc::new(ExternalizerTable::new());
    table
        .add_internal_externalizer(InternalExternalizer::of::<OctetExternalizer>())
        .unwrap();
    start(&table, &GlobalConfiguration::default()).unwrap();
    table
}

fn encode(table: &ExternalizerTable, object: &(dyn Any + Send + Sync)) -> Vec<u8> {
    let mut buf = Vec::<u8>::new();
    table
        .encode(&mut buf, object, &Cancellation::new())
        .expect("value should encode");
    buf
}

fn round_trip<T: Any>(table: &ExternalizerTable, object: &T) -> T
where
    T: Send + Sync,
{
    let buf = encode(table, object);
    let mut input = buf.as_slice();
    let value = table
        .decode(&mut input, &Cancellation::new())
        .expect("value should decode");
    assert!(input.is_empty(), "decode must consume the whole frame");
    *value.downcast::<T>().expect("decoded value keeps its type")
}

/// ## 场景：内部调度
///
/// 插件 P 登记在标识 50，对 `[50, payload]` 解码必须得到 P 对负载的解码结果。
#[test]
fn internal_identifier_dispatches_to_its_externalizer() {
    let table = octet_table();
    assert_eq!(encode(&table, &Octet(7)), [50, 7]);

    let mut input: &[u8] = &[50, 1];
    let value = table.decode(&mut input, &Cancellation::new()).unwrap();
    assert_eq!(value.downcast_ref::<Octet>(), Some(&Octet(101)));
}

/// ## 场景：未知标识
///
/// 运行中的注册表在标识 200 上没有插件，解码以未知类型失败并归类为协议错误。
#[test]
fn unknown_identifier_fails_while_running() {
    let table = octet_table();
    let mut input: &[u8] = &[200, 0, 0];
    let err = table.decode(&mut input, &Cancellation::new()).unwrap_err();
    assert!(matches!(
        err,
        MarshalError::UnknownType { reader_index } if reader_index == ReaderIndex::internal(200)
    ));
    assert_eq!(err.category(), ErrorCategory::ProtocolViolation);

    // 运行中的注册表即便调用方已取消，也按未知类型报告。
    let cancelled = Cancellation::new();
    cancelled.cancel();
    let mut input: &[u8] = &[200];
    assert!(matches!(
        table.decode(&mut input, &cancelled),
        Err(MarshalError::UnknownType { .. })
    ));
}

/// ## 场景：外部调度
///
/// 外部标识 300 的帧为 `[255, 0xAC, 0x02, payload]`，解码交回同一插件。
#[test]
fn foreign_identifier_is_framed_behind_the_sentinel() {
    let table = started(&config_with(None, Arc::new(PointExternalizer)));
    let buf = encode(&table, &Point { x: 1, y: -1 });
    assert_eq!(&buf[..3], &[255, 0xAC, 0x02]);
    assert_eq!(&buf[3..], &[0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFF]);

    let value = table
        .decode(&mut buf.as_slice(), &Cancellation::new())
        .unwrap();
    assert_eq!(value.downcast_ref::<Point>(), Some(&Point { x: 1, y: -1 }));
}

/// ## 边界外部标识
///
/// 对每个边界标识：帧首字节恒为 255，紧随其后的变长整数还原出原始标识，`externalizer_id` 保真。
#[test]
fn boundary_foreign_identifiers_survive_framing() {
    for id in [0u32, 1, 127, 128, 16_383, 16_384, 2_147_483_647] {
        let table = started(&config_with(
            Some(i64::from(id)),
            Arc::new(PointExternalizer),
        ));
        let point = Point {
            x: id as i32,
            y: 0,
        };
        let buf = encode(&table, &point);
        assert_eq!(buf[0], 255, "id {id}");

        let mut header = &buf[1..];
        assert_eq!(varint::read_unsigned_int(&mut header).unwrap(), id);
        assert_eq!(header.len(), 8, "payload follows the identifier directly");

        assert_eq!(round_trip(&table, &point), point);
        assert_eq!(table.externalizer_id(&point), Some(id));
        table.stop();
    }
}

/// ## 畸形输入
#[test]
fn malformed_frames_are_protocol_violations() {
    let table = started(&config_with(None, Arc::new(PointExternalizer)));
    let cancellation = Cancellation::new();

    let mut empty: &[u8] = &[];
    assert!(matches!(
        table.decode(&mut empty, &cancellation),
        Err(MarshalError::Truncated { .. })
    ));

    let mut short_payload: &[u8] = &[255, 0xAC, 0x02, 0, 0];
    assert!(matches!(
        table.decode(&mut short_payload, &cancellation),
        Err(MarshalError::Truncated {
            needed: 4,
            remaining: 2
        })
    ));

    let mut flagged = vec![255u8];
    varint::write_unsigned_int(&mut flagged, 0x8000_0000);
    let err = table
        .decode(&mut flagged.as_slice(), &cancellation)
        .unwrap_err();
    assert!(matches!(err, MarshalError::Malformed { .. }));
    assert_eq!(err.category(), ErrorCategory::ProtocolViolation);

    let err = table
        .encode(&mut Vec::<u8>::new(), &"not registered", &cancellation)
        .unwrap_err();
    assert!(matches!(err, MarshalError::NotMarshallable { .. }));
}

/// 构造 `frames` 层嵌套的成功响应：外层均携带返回值，最内层为空响应。
fn nested_responses(frames: usize) -> Vec<u8> {
    let mut buf = [SUCCESSFUL_RESPONSE, 1].repeat(frames - 1);
    buf.extend_from_slice(&[SUCCESSFUL_RESPONSE, 0]);
    buf
}

/// ## 嵌套深度上限
///
/// 持续嵌套响应帧的损坏输入（约 1 MB）必须以错误返回，而不是耗尽线程栈；
/// 恰好处于上限的合法嵌套仍可解码。
#[test]
fn runaway_nesting_is_rejected_before_the_stack_overflows() {
    let table = started(&GlobalConfiguration::default());
    let cancellation = Cancellation::new();

    let hostile = nested_responses(500_001);
    let err = table
        .decode(&mut hostile.as_slice(), &cancellation)
        .unwrap_err();
    assert!(matches!(
        err,
        MarshalError::NestingTooDeep { limit } if limit == MAX_NESTING_DEPTH
    ));
    assert_eq!(err.code(), codes::STREAM_NESTING_DEPTH);
    assert_eq!(err.category(), ErrorCategory::ProtocolViolation);

    let deepest = nested_responses(usize::from(MAX_NESTING_DEPTH));
    let mut input = deepest.as_slice();
    let value = table.decode(&mut input, &cancellation).unwrap();
    assert!(input.is_empty());
    let mut frames = 1;
    let mut current: &(dyn Any + Send + Sync) = value.as_ref();
    while let Some(inner) = current
        .downcast_ref::<SuccessfulResponse>()
        .and_then(SuccessfulResponse::value)
    {
        frames += 1;
        current = inner;
    }
    assert_eq!(frames, MAX_NESTING_DEPTH);

    let one_too_many = nested_responses(usize::from(MAX_NESTING_DEPTH) + 1);
    assert!(matches!(
        table.decode(&mut one_too_many.as_slice(), &cancellation),
        Err(MarshalError::NestingTooDeep { .. })
    ));
    table.stop();
}

/// ## 配置的编组版本写入独立缓冲头部
#[test]
fn configured_marshall_version_is_written_to_the_buffer_header() {
    let config = GlobalConfiguration::from_toml_str(
        r#"
        [serialization]
        marshall_version = 7
        "#,
    )
    .unwrap();
    let table = started(&config);
    let marshaller = GridMarshaller::from_config(Arc::clone(&table), &config);
    let cancellation = Cancellation::new();
    assert_eq!(marshaller.version(), 7);

    let buffer = marshaller
        .object_to_buffer(&ByteArrayKey::new(&b"k"[..]), &cancellation)
        .unwrap();
    assert_eq!(&buffer[..2], &[0, 7]);
    let value = marshaller.object_from_buffer(&buffer, &cancellation).unwrap();
    assert_eq!(
        value.downcast_ref::<ByteArrayKey>(),
        Some(&ByteArrayKey::new(&b"k"[..]))
    );

    let default_version = GridMarshaller::new(Arc::clone(&table));
    assert!(matches!(
        default_version.object_from_buffer(&buffer, &cancellation),
        Err(MarshalError::IncompatibleVersion {
            expected: 1,
            found: 7
        })
    ));
    table.stop();
}

/// ## 内置插件往返
#[test]
fn builtin_values_round_trip() {
    let table = started(&GlobalConfiguration::default());

    let mut hash = HashMap::new();
    hash.insert("a".to_owned(), Bytes::from_static(b"1"));
    hash.insert("b".to_owned(), Bytes::new());
    assert_eq!(round_trip(&table, &hash), hash);

    let tree: BTreeMap<String, Bytes> = hash.clone().into_iter().collect();
    assert_eq!(round_trip(&table, &tree), tree);
    assert_eq!(encode(&table, &tree)[..2], [2, 1]);

    let address = NodeAddress::new("node-a");
    assert_eq!(round_trip(&table, &address), address);

    let key = ByteArrayKey::new(&b"key"[..]);
    assert_eq!(round_trip(&table, &key), key);

    let immortal = ImmortalCacheEntry {
        key: key.clone(),
        value: Bytes::from_static(b"v"),
    };
    assert_eq!(round_trip(&table, &immortal), immortal);

    let mortal = MortalCacheEntry {
        key,
        value: Bytes::from_static(b"v"),
        created: 1_000,
        lifespan: 500,
    };
    assert_eq!(round_trip(&table, &mortal), mortal);
    assert!(mortal.is_expired(1_500));

    assert_eq!(
        round_trip(&table, &UnsuccessfulResponse),
        UnsuccessfulResponse
    );
    assert_eq!(
        round_trip(&table, &RequestIgnoredResponse),
        RequestIgnoredResponse
    );

    let command = RemoteCommand::new(12, vec![Bytes::from_static(b"p0"), Bytes::new()]);
    assert_eq!(round_trip(&table, &command), command);
}

/// ## 复制命令：参数个数以变长整数写出，超出 32 位的个数按截断处理而非溢出
#[test]
fn command_parameter_count_is_a_full_width_varint() {
    let table = started(&GlobalConfiguration::default());
    let cancellation = Cancellation::new();

    let command = RemoteCommand::new(12, vec![Bytes::from_static(b"p0"), Bytes::new()]);
    assert_eq!(encode(&table, &command), [17, 12, 2, 2, b'p', b'0', 0]);

    let mut frame = vec![17u8, 12];
    varint::write_unsigned_long(&mut frame, u64::from(u32::MAX) + 1);
    frame.extend_from_slice(&[1, b'x']);
    assert!(matches!(
        table.decode(&mut frame.as_slice(), &cancellation),
        Err(MarshalError::Truncated { .. })
    ));
    table.stop();
}

/// ## 嵌套对象：事务地址与响应返回值经注册表写出，各自带有完整帧头
#[test]
fn nested_values_carry_their_own_frames() {
    let table = started(&config_with(None, Arc::new(PointExternalizer)));

    let tx = GlobalTransaction::local(42, Some(NodeAddress::new("n1")));
    let buf = encode(&table, &tx);
    // 事务标识 5，序号 42，地址存在标记，地址帧标识 3。
    assert_eq!(&buf[..4], &[5, 42, 1, 3]);
    let decoded = round_trip(&table, &tx);
    assert_eq!(decoded.id, 42);
    assert_eq!(decoded.address, tx.address);
    assert!(decoded.remote, "transactions read off the wire are remote");

    let without_address = round_trip(&table, &GlobalTransaction::local(7, None));
    assert_eq!(without_address.address, None);

    let response = round_trip(&table, &SuccessfulResponse::new(Point { x: 5, y: 6 }));
    assert_eq!(response.value_as::<Point>(), Some(&Point { x: 5, y: 6 }));
    let empty = round_trip(&table, &SuccessfulResponse::empty());
    assert!(empty.value().is_none());
}

/// ## 已编组值：独立缓冲带版本头，读回后绑定注入的编组器
#[test]
fn marshalled_values_resolve_through_the_injected_marshaller() {
    let table = started(&config_with(None, Arc::new(PointExternalizer)));
    let marshaller: Arc<dyn StreamingMarshaller> =
        Arc::new(GridMarshaller::new(Arc::clone(&table)));
    let cancellation = Cancellation::new();

    let value =
        MarshalledValue::marshal(&Point { x: 9, y: 9 }, &marshaller, &cancellation).unwrap();
    assert_eq!(&value.raw()[..2], &[0, 1], "marshall version header");

    let decoded = round_trip(&table, &value);
    assert_eq!(decoded, value);
    assert_eq!(decoded.hash_code(), value.hash_code());
    let point = decoded.get(&cancellation).unwrap();
    assert_eq!(point.downcast_ref::<Point>(), Some(&Point { x: 9, y: 9 }));

    let newer = GridMarshaller::with_version(Arc::clone(&table), 2);
    assert!(matches!(
        newer.object_from_buffer(value.raw(), &cancellation),
        Err(MarshalError::IncompatibleVersion {
            expected: 2,
            found: 1
        })
    ));
    assert!(marshaller.is_marshallable(&Point { x: 0, y: 0 }));
    table.stop();
}
