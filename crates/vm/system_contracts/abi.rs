//! Minimal Solidity ABI codec for the system contract's calldata and return data.

use bytes::Bytes;
use hostevm_common::{Address, BigEndianHash, H256, U256};
use keccak_hash::keccak;

/// Selector of `Error(string)`, the payload of `revert("reason")`.
pub const REVERT_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

const WORD: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("invalid ABI type: {0}")]
    InvalidType(String),
    #[error("invalid function signature: {0}")]
    InvalidSignature(String),
    #[error("ABI data too short: {needed} bytes needed at offset {offset}")]
    DataTooShort { offset: usize, needed: usize },
    #[error("invalid boolean encoding")]
    InvalidBool,
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("value does not fit into {0}")]
    OutOfRange(&'static str),
    #[error("ABI data decodes into more than its own {limit} bytes")]
    Oversized { limit: usize },
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Uint(usize),
    Int(usize),
    Bool,
    Bytes,
    String,
    FixedBytes(usize),
    Array(Box<ParamType>),
    FixedArray(Box<ParamType>, usize),
    Tuple(Vec<ParamType>),
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Value {
    Address(Address),
    Uint(U256),
    /// Two's complement representation
    Int(U256),
    Bool(bool),
    Bytes(Bytes),
    String(String),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    FixedArray(Vec<Value>),
    FixedBytes(Bytes),
}

/// A function signature such as `bind(address,uint256,address,int8)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub inputs: Vec<ParamType>,
}

fn split_top_level(list: &str) -> Result<Vec<&str>, AbiError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| AbiError::InvalidType(list.to_string()))?;
            }
            ',' if depth == 0 => {
                parts.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(AbiError::InvalidType(list.to_string()));
    }
    let last = list[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    Ok(parts)
}

fn parse_bits(kind: &str, digits: &str, max: usize) -> Result<usize, AbiError> {
    if digits.is_empty() {
        return Ok(max);
    }
    let size: usize = digits
        .parse()
        .map_err(|_| AbiError::InvalidType(format!("{kind}{digits}")))?;
    let valid = if kind == "bytes" {
        (1..=32).contains(&size)
    } else {
        size > 0 && size <= 256 && size % 8 == 0
    };
    if !valid {
        return Err(AbiError::InvalidType(format!("{kind}{digits}")));
    }
    Ok(size)
}

impl ParamType {
    pub fn parse(ty: &str) -> Result<Self, AbiError> {
        let ty = ty.trim();
        if let Some(stripped) = ty.strip_suffix(']') {
            let open = stripped
                .rfind('[')
                .ok_or_else(|| AbiError::InvalidType(ty.to_string()))?;
            let inner = Box::new(ParamType::parse(&stripped[..open])?);
            let size = &stripped[open + 1..];
            if size.is_empty() {
                return Ok(ParamType::Array(inner));
            }
            let size = size
                .parse()
                .map_err(|_| AbiError::InvalidType(ty.to_string()))?;
            return Ok(ParamType::FixedArray(inner, size));
        }
        if let Some(fields) = ty.strip_prefix('(').and_then(|ty| ty.strip_suffix(')')) {
            let fields = split_top_level(fields)?
                .into_iter()
                .map(ParamType::parse)
                .collect::<Result<_, _>>()?;
            return Ok(ParamType::Tuple(fields));
        }
        match ty {
            "address" => Ok(ParamType::Address),
            "bool" => Ok(ParamType::Bool),
            "string" => Ok(ParamType::String),
            "bytes" => Ok(ParamType::Bytes),
            _ => {
                if let Some(bits) = ty.strip_prefix("uint") {
                    Ok(ParamType::Uint(parse_bits("uint", bits, 256)?))
                } else if let Some(bits) = ty.strip_prefix("int") {
                    Ok(ParamType::Int(parse_bits("int", bits, 256)?))
                } else if let Some(size) = ty.strip_prefix("bytes") {
                    Ok(ParamType::FixedBytes(parse_bits("bytes", size, 32)?))
                } else {
                    Err(AbiError::InvalidType(ty.to_string()))
                }
            }
        }
    }

    /// Canonical name used in signatures, `uint` becomes `uint256`.
    pub fn canonical(&self) -> String {
        match self {
            ParamType::Address => "address".to_string(),
            ParamType::Uint(bits) => format!("uint{bits}"),
            ParamType::Int(bits) => format!("int{bits}"),
            ParamType::Bool => "bool".to_string(),
            ParamType::Bytes => "bytes".to_string(),
            ParamType::String => "string".to_string(),
            ParamType::FixedBytes(size) => format!("bytes{size}"),
            ParamType::Array(inner) => format!("{}[]", inner.canonical()),
            ParamType::FixedArray(inner, size) => format!("{}[{size}]", inner.canonical()),
            ParamType::Tuple(fields) => {
                let fields: Vec<String> = fields.iter().map(ParamType::canonical).collect();
                format!("({})", fields.join(","))
            }
        }
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::Bytes | ParamType::String | ParamType::Array(_) => true,
            ParamType::FixedArray(inner, _) => inner.is_dynamic(),
            ParamType::Tuple(fields) => fields.iter().any(ParamType::is_dynamic),
            _ => false,
        }
    }

    /// Bytes taken in the head of the enclosing tuple.
    fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return WORD;
        }
        match self {
            ParamType::FixedArray(inner, size) => inner.head_size() * size,
            ParamType::Tuple(fields) => fields.iter().map(ParamType::head_size).sum(),
            _ => WORD,
        }
    }
}

impl Function {
    pub fn parse(signature: &str) -> Result<Self, AbiError> {
        let signature = signature.trim().trim_start_matches("function ");
        let (name, params) = signature
            .split_once('(')
            .ok_or_else(|| AbiError::InvalidSignature(signature.to_string()))?;
        let params = params
            .strip_suffix(')')
            .ok_or_else(|| AbiError::InvalidSignature(signature.to_string()))?;
        let inputs = split_top_level(params)?
            .into_iter()
            .map(ParamType::parse)
            .collect::<Result<_, _>>()?;
        Ok(Self {
            name: name.trim().to_string(),
            inputs,
        })
    }

    pub fn signature(&self) -> String {
        let inputs: Vec<String> = self.inputs.iter().map(ParamType::canonical).collect();
        format!("{}({})", self.name, inputs.join(","))
    }

    pub fn selector(&self) -> [u8; 4] {
        selector(&self.signature())
    }

    pub fn encode_input(&self, values: &[Value]) -> Vec<u8> {
        let mut calldata = self.selector().to_vec();
        calldata.extend_from_slice(&encode(values));
        calldata
    }

    /// Decodes the parameters of calldata that already had its selector stripped.
    pub fn decode_input(&self, data: &[u8]) -> Result<Vec<Value>, AbiError> {
        decode(&self.inputs, data)
    }
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash.as_bytes()[..4]);
    selector
}

impl Value {
    pub fn uint(value: u64) -> Self {
        Value::Uint(U256::from(value))
    }

    pub fn int(value: i64) -> Self {
        if value >= 0 {
            Value::Int(U256::from(value.unsigned_abs()))
        } else {
            Value::Int(U256::MAX - U256::from(value.unsigned_abs() - 1))
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Address(_) => "address",
            Value::Uint(_) => "uint",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
            Value::FixedArray(_) => "fixed array",
            Value::FixedBytes(_) => "fixed bytes",
        }
    }

    fn mismatch(&self, expected: &'static str) -> AbiError {
        AbiError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_address(&self) -> Result<Address, AbiError> {
        match self {
            Value::Address(address) => Ok(*address),
            other => Err(other.mismatch("address")),
        }
    }

    pub fn as_u256(&self) -> Result<U256, AbiError> {
        match self {
            Value::Uint(value) => Ok(*value),
            other => Err(other.mismatch("uint")),
        }
    }

    pub fn as_u64(&self) -> Result<u64, AbiError> {
        let value = self.as_u256()?;
        if value > U256::from(u64::MAX) {
            return Err(AbiError::OutOfRange("u64"));
        }
        Ok(value.low_u64())
    }

    pub fn as_i8(&self) -> Result<i8, AbiError> {
        let Value::Int(value) = self else {
            return Err(self.mismatch("int"));
        };
        if *value <= U256::from(i8::MAX as u64) {
            return Ok(value.low_u64() as i8);
        }
        // negative values are sign extended to 256 bits
        let magnitude = U256::MAX - *value + U256::one();
        if magnitude <= U256::from(128u64) {
            return Ok((-(magnitude.low_u64() as i16)) as i8);
        }
        Err(AbiError::OutOfRange("i8"))
    }

    pub fn as_bytes(&self) -> Result<&Bytes, AbiError> {
        match self {
            Value::Bytes(bytes) | Value::FixedBytes(bytes) => Ok(bytes),
            other => Err(other.mismatch("bytes")),
        }
    }

    pub fn as_str(&self) -> Result<&str, AbiError> {
        match self {
            Value::String(string) => Ok(string),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn as_array(&self) -> Result<&[Value], AbiError> {
        match self {
            Value::Array(values) | Value::FixedArray(values) => Ok(values),
            other => Err(other.mismatch("array")),
        }
    }

    pub fn as_tuple(&self) -> Result<&[Value], AbiError> {
        match self {
            Value::Tuple(values) => Ok(values),
            other => Err(other.mismatch("tuple")),
        }
    }
}

/// Encodes `values` as the components of a tuple (i.e. a parameter list).
pub fn encode(values: &[Value]) -> Vec<u8> {
    encode_tuple(values)
}

fn encode_tuple(values: &[Value]) -> Vec<u8> {
    let mut current_offset = 0;
    let mut current_dynamic_offset: usize = values.iter().map(static_offset_value).sum();

    let mut ret = vec![0; current_dynamic_offset];

    for value in values {
        match value {
            Value::Address(address) => {
                write_word(&mut ret, address_to_word(*address), current_offset);
            }
            Value::Uint(number) | Value::Int(number) => {
                write_word(&mut ret, *number, current_offset);
            }
            Value::Bool(boolean) => {
                write_word(&mut ret, U256::from(u8::from(*boolean)), current_offset);
            }
            Value::FixedBytes(bytes) => {
                let len = bytes.len().min(WORD);
                ret[current_offset..current_offset + len].copy_from_slice(&bytes[..len]);
            }
            Value::Bytes(_) | Value::String(_) | Value::Array(_) => {
                write_word(&mut ret, U256::from(current_dynamic_offset), current_offset);
                let encoding = encode_dynamic(value);
                current_dynamic_offset += encoding.len();
                ret.extend_from_slice(&encoding);
            }
            Value::Tuple(inner) | Value::FixedArray(inner) => {
                let encoding = encode_tuple(inner);
                if is_dynamic(value) {
                    write_word(&mut ret, U256::from(current_dynamic_offset), current_offset);
                    current_dynamic_offset += encoding.len();
                    ret.extend_from_slice(&encoding);
                } else {
                    ret[current_offset..current_offset + encoding.len()]
                        .copy_from_slice(&encoding);
                }
            }
        }
        current_offset += static_offset_value(value);
    }

    ret
}

fn encode_dynamic(value: &Value) -> Vec<u8> {
    match value {
        Value::Bytes(bytes) => encode_bytes(bytes),
        Value::String(string) => encode_bytes(string.as_bytes()),
        Value::Array(values) => {
            let mut ret = word(U256::from(values.len())).to_vec();
            ret.extend_from_slice(&encode_tuple(values));
            ret
        }
        _ => encode_tuple(std::slice::from_ref(value)),
    }
}

fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut ret = word(U256::from(bytes.len())).to_vec();
    ret.extend_from_slice(bytes);
    let padding = (WORD - bytes.len() % WORD) % WORD;
    ret.resize(ret.len() + padding, 0);
    ret
}

fn static_offset_value(value: &Value) -> usize {
    match value {
        Value::Tuple(values) | Value::FixedArray(values) if !is_dynamic(value) => {
            values.iter().map(static_offset_value).sum()
        }
        _ => WORD,
    }
}

fn is_dynamic(value: &Value) -> bool {
    match value {
        Value::Bytes(_) | Value::String(_) | Value::Array(_) => true,
        Value::Tuple(values) => values.iter().any(is_dynamic),
        Value::FixedArray(values) => values.first().is_some_and(is_dynamic),
        _ => false,
    }
}

fn word(number: U256) -> [u8; WORD] {
    H256::from_uint(&number).0
}

fn write_word(buffer: &mut [u8], number: U256, offset: usize) {
    buffer[offset..offset + WORD].copy_from_slice(&word(number));
}

fn address_to_word(address: Address) -> U256 {
    H256::from(address).into_uint()
}

/// Decodes `data` as a tuple of `types`.
///
/// Heads of dynamic values may point anywhere, including at a tail another head already
/// used. The decoded values can therefore never hold more bytes than `data` itself.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Value>, AbiError> {
    Decoder {
        data,
        budget: data.len(),
    }
    .tuple(types, 0)
}

fn read_word(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    data.get(offset..offset.saturating_add(WORD))
        .ok_or(AbiError::DataTooShort {
            offset,
            needed: WORD,
        })
}

struct Decoder<'d> {
    data: &'d [u8],
    /// Bytes the remaining values may still decode into
    budget: usize,
}

impl<'d> Decoder<'d> {
    fn consume(&mut self, size: usize) -> Result<(), AbiError> {
        self.budget = self.budget.checked_sub(size).ok_or(AbiError::Oversized {
            limit: self.data.len(),
        })?;
        Ok(())
    }

    /// Reads a word counted against the budget.
    fn word(&mut self, offset: usize) -> Result<&'d [u8], AbiError> {
        let word = read_word(self.data, offset)?;
        self.consume(WORD)?;
        Ok(word)
    }

    /// Offsets and lengths never exceed the input length.
    fn usize_at(&self, offset: usize) -> Result<usize, AbiError> {
        let value = H256::from_slice(read_word(self.data, offset)?).into_uint();
        if value > U256::from(self.data.len()) {
            return Err(AbiError::OutOfRange("usize"));
        }
        Ok(value.as_usize())
    }

    fn tuple(&mut self, types: &[ParamType], base: usize) -> Result<Vec<Value>, AbiError> {
        let mut values = Vec::with_capacity(types.len());
        let mut head = base;
        for ty in types {
            if ty.is_dynamic() {
                let offset = self.usize_at(head)?;
                values.push(self.value(ty, base.saturating_add(offset))?);
            } else {
                values.push(self.value(ty, head)?);
            }
            head = head.saturating_add(ty.head_size());
        }
        Ok(values)
    }

    fn value(&mut self, ty: &ParamType, at: usize) -> Result<Value, AbiError> {
        match ty {
            ParamType::Address => {
                let word = self.word(at)?;
                Ok(Value::Address(Address::from_slice(&word[12..])))
            }
            ParamType::Uint(_) => Ok(Value::Uint(H256::from_slice(self.word(at)?).into_uint())),
            ParamType::Int(_) => Ok(Value::Int(H256::from_slice(self.word(at)?).into_uint())),
            ParamType::Bool => match H256::from_slice(self.word(at)?).into_uint() {
                value if value.is_zero() => Ok(Value::Bool(false)),
                value if value == U256::one() => Ok(Value::Bool(true)),
                _ => Err(AbiError::InvalidBool),
            },
            ParamType::FixedBytes(size) => {
                let word = self.word(at)?;
                Ok(Value::FixedBytes(Bytes::copy_from_slice(&word[..*size])))
            }
            ParamType::Bytes | ParamType::String => {
                let len = self.usize_at(at)?;
                let start = at.saturating_add(WORD);
                let bytes = self
                    .data
                    .get(start..start.saturating_add(len))
                    .ok_or(AbiError::DataTooShort {
                        offset: start,
                        needed: len,
                    })?;
                self.consume(WORD + len)?;
                if matches!(ty, ParamType::String) {
                    let string =
                        String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)?;
                    Ok(Value::String(string))
                } else {
                    Ok(Value::Bytes(Bytes::copy_from_slice(bytes)))
                }
            }
            ParamType::Array(inner) => {
                let len = self.usize_at(at)?;
                self.consume(WORD)?;
                let types = vec![(**inner).clone(); len];
                Ok(Value::Array(self.tuple(&types, at.saturating_add(WORD))?))
            }
            ParamType::FixedArray(inner, size) => {
                let types = vec![(**inner).clone(); *size];
                Ok(Value::FixedArray(self.tuple(&types, at)?))
            }
            ParamType::Tuple(fields) => Ok(Value::Tuple(self.tuple(fields, at)?)),
        }
    }
}

/// ABI payload of `revert(reason)`.
pub fn encode_revert_reason(reason: &str) -> Bytes {
    let mut data = REVERT_SELECTOR.to_vec();
    data.extend_from_slice(&encode(&[Value::String(reason.to_string())]));
    Bytes::from(data)
}

/// Extracts the reason of an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&REVERT_SELECTOR)?;
    match decode(&[ParamType::String], payload).ok()?.pop()? {
        Value::String(reason) => Some(reason),
        _ => None,
    }
}
