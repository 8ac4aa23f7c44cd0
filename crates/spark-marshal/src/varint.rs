//! 无符号变长整数编码。
//!
//! 每个字节低 7 位承载数据，最高位为续位标记：置位表示后面还有字节，清零表示这是最后一个字节。
//! 低位分组先写。小的外部标识（常见情况）只占一个字节。

use bytes::{Buf, BufMut};

use crate::error::MarshalError;

const CONTINUATION: u8 = 0x80;
const PAYLOAD: u8 = 0x7F;

/// 写入 32 位无符号变长整数。
pub fn write_unsigned_int(out: &mut dyn BufMut, value: u32) {
    write_unsigned_long(out, u64::from(value));
}

/// 读取 32 位无符号变长整数。
///
/// 输入在数字中途耗尽时返回 [`MarshalError::Truncated`]；数值超出 32 位时返回
/// [`MarshalError::VarintOverflow`]。
pub fn read_unsigned_int(input: &mut dyn Buf) -> Result<u32, MarshalError> {
    let value = read_unsigned(input, u32::BITS)?;
    u32::try_from(value).map_err(|_| MarshalError::VarintOverflow { bits: u32::BITS })
}

/// 写入 64 位无符号变长整数。
pub fn write_unsigned_long(out: &mut dyn BufMut, mut value: u64) {
    while value & !u64::from(PAYLOAD) != 0 {
        out.put_u8((value as u8 & PAYLOAD) | CONTINUATION);
        value >>= 7;
    }
    out.put_u8(value as u8);
}

/// 读取 64 位无符号变长整数。
pub fn read_unsigned_long(input: &mut dyn Buf) -> Result<u64, MarshalError> {
    read_unsigned(input, u64::BITS)
}

/// 计算 `value` 编码后的字节数。
pub fn encoded_len(value: u64) -> usize {
    let significant = (u64::BITS - value.leading_zeros()).max(1);
    significant.div_ceil(7) as usize
}

fn read_unsigned(input: &mut dyn Buf, bits: u32) -> Result<u64, MarshalError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        if !input.has_remaining() {
            return Err(MarshalError::Truncated {
                needed: 1,
                remaining: 0,
            });
        }
        let byte = input.get_u8();
        let group = u64::from(byte & PAYLOAD);
        if shift >= bits || group > (u64::MAX >> (u64::BITS - bits)) >> shift {
            return Err(MarshalError::VarintOverflow { bits });
        }
        value |= group << shift;
        if byte & CONTINUATION == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}
