//! Human-readable event descriptors and ABI word decoding.
//!
//! An [`AbiEvent`] is parsed from a declaration such as
//! `Transfer(address indexed from, address indexed to, uint256 value)`.
//! Supported parameter types are `address`, `bool`, `uint<N>`, `int<N>`,
//! `bytes<N>`, `string` and `bytes`. Tuples and arrays are not supported.

use crate::event::Event;
use crate::tracker::EventType;
use alloy_primitives::{keccak256, Address, Bytes, B256, I256, U256};
use blockstate_core::{Error, Result, Value};
use core::fmt;

const WORD: usize = 32;

/// The type of one event parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Address,
    Bool,
    Uint(u16),
    Int(u16),
    FixedBytes(u8),
    String,
    Bytes,
}

impl ParamKind {
    /// Parses a solidity type name. `uint` and `int` are `uint256` and `int256`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "address" => return Some(ParamKind::Address),
            "bool" => return Some(ParamKind::Bool),
            "string" => return Some(ParamKind::String),
            "bytes" => return Some(ParamKind::Bytes),
            "uint" => return Some(ParamKind::Uint(256)),
            "int" => return Some(ParamKind::Int(256)),
            _ => {}
        }
        if let Some(bits) = name.strip_prefix("uint") {
            return parse_bits(bits).map(ParamKind::Uint);
        }
        if let Some(bits) = name.strip_prefix("int") {
            return parse_bits(bits).map(ParamKind::Int);
        }
        if let Some(len) = name.strip_prefix("bytes") {
            let len: u8 = len.parse().ok()?;
            return (1..=32).contains(&len).then_some(ParamKind::FixedBytes(len));
        }
        None
    }

    /// Returns true for types encoded out of line.
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ParamKind::String | ParamKind::Bytes)
    }
}

fn parse_bits(bits: &str) -> Option<u16> {
    if bits.starts_with('0') {
        return None;
    }
    let bits: u16 = bits.parse().ok()?;
    (bits > 0 && bits <= 256 && bits % 8 == 0).then_some(bits)
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Address => f.write_str("address"),
            ParamKind::Bool => f.write_str("bool"),
            ParamKind::Uint(bits) => write!(f, "uint{}", bits),
            ParamKind::Int(bits) => write!(f, "int{}", bits),
            ParamKind::FixedBytes(len) => write!(f, "bytes{}", len),
            ParamKind::String => f.write_str("string"),
            ParamKind::Bytes => f.write_str("bytes"),
        }
    }
}

/// A decoded parameter value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Bool(bool),
    Uint(U256),
    Int(I256),
    /// Fixed-size bytes, right-padded to a word. Indexed dynamic parameters
    /// decode to the hash found in their topic.
    FixedBytes(B256),
    String(String),
    Bytes(Bytes),
}

impl Token {
    fn type_name(&self) -> &'static str {
        match self {
            Token::Address(_) => "address",
            Token::Bool(_) => "bool",
            Token::Uint(_) => "uint",
            Token::Int(_) => "int",
            Token::FixedBytes(_) => "fixed bytes",
            Token::String(_) => "string",
            Token::Bytes(_) => "bytes",
        }
    }
}

/// One parameter of an event declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiParam {
    pub name: String,
    pub kind: ParamKind,
    pub indexed: bool,
}

/// An event shape parsed from its human-readable declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbiEvent {
    name: String,
    params: Vec<AbiParam>,
    signature: String,
    id: B256,
}

impl AbiEvent {
    /// Parses `Name(type [indexed] [name], ...)`. A leading `event` keyword is
    /// accepted. Unnamed parameters are named by their position.
    pub fn parse(declaration: &str) -> Result<Self> {
        let text = declaration.trim();
        let text = text.strip_prefix("event ").map(str::trim).unwrap_or(text);
        let fail = |message: &str| Error::EventDecode {
            event: text.to_string(),
            message: message.to_string(),
        };

        let open = text.find('(').ok_or_else(|| fail("missing '('"))?;
        let body = text[open + 1..]
            .trim_end()
            .strip_suffix(')')
            .ok_or_else(|| fail("missing ')'"))?;
        let name = text[..open].trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(fail("invalid event name"));
        }

        let mut params = Vec::new();
        if !body.trim().is_empty() {
            for (position, part) in body.split(',').enumerate() {
                let mut words = part.split_whitespace();
                let kind_name = words.next().ok_or_else(|| fail("empty parameter"))?;
                let kind = ParamKind::parse(kind_name)
                    .ok_or_else(|| fail(&format!("unsupported type {}", kind_name)))?;
                let mut indexed = false;
                let mut param_name = words.next();
                if param_name == Some("indexed") {
                    indexed = true;
                    param_name = words.next();
                }
                if words.next().is_some() {
                    return Err(fail(&format!("unexpected tokens in {:?}", part.trim())));
                }
                params.push(AbiParam {
                    name: param_name.map_or_else(|| position.to_string(), str::to_string),
                    kind,
                    indexed,
                });
            }
        }
        if params.iter().filter(|p| p.indexed).count() > 3 {
            return Err(fail("more than three indexed parameters"));
        }

        let kinds: Vec<String> = params.iter().map(|p| p.kind.to_string()).collect();
        let signature = format!("{}({})", name, kinds.join(","));
        let id = keccak256(signature.as_bytes());
        Ok(Self {
            name: name.to_string(),
            params,
            signature,
            id,
        })
    }

    /// Returns the parameters in declaration order.
    #[inline]
    pub fn params(&self) -> &[AbiParam] {
        &self.params
    }

    /// Returns the canonical signature, e.g. `Sync(uint112,uint112)`.
    #[inline]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::EventDecode {
            event: self.name.clone(),
            message: message.into(),
        }
    }

    /// Decodes the parameters of a log of this shape.
    pub fn decode_log(&self, event: &Event) -> Result<EventValues> {
        if event.topic0() != Some(&self.id) {
            return Err(self.error("topic does not match"));
        }
        let indexed = self.params.iter().filter(|p| p.indexed).count();
        if event.topics.len() != indexed + 1 {
            return Err(self.error(format!(
                "expected {} topics, found {}",
                indexed + 1,
                event.topics.len()
            )));
        }

        let mut topics = event.topics[1..].iter();
        let data: &[u8] = &event.data;
        let mut head = 0usize;
        let mut values = Vec::with_capacity(self.params.len());

        for param in &self.params {
            let token = if param.indexed {
                let topic = topics
                    .next()
                    .ok_or_else(|| self.error("missing topic"))?;
                if param.kind.is_dynamic() {
                    Token::FixedBytes(*topic)
                } else {
                    decode_static(param.kind, &topic.0)
                        .ok_or_else(|| self.error(format!("bad {} topic", param.name)))?
                }
            } else {
                let word = read_word(data, head)
                    .ok_or_else(|| self.error(format!("data too short for {}", param.name)))?;
                head += 1;
                match param.kind {
                    ParamKind::String | ParamKind::Bytes => {
                        let bytes = word_to_usize(&word)
                            .and_then(|offset| read_dynamic(data, offset))
                            .ok_or_else(|| self.error(format!("bad offset for {}", param.name)))?;
                        if param.kind == ParamKind::String {
                            let text = std::str::from_utf8(bytes)
                                .map_err(|_| self.error(format!("{} is not utf-8", param.name)))?;
                            Token::String(text.to_string())
                        } else {
                            Token::Bytes(Bytes::copy_from_slice(bytes))
                        }
                    }
                    kind => decode_static(kind, &word)
                        .ok_or_else(|| self.error(format!("bad value for {}", param.name)))?,
                }
            };
            values.push((param.name.clone(), token));
        }

        Ok(EventValues {
            event: self.name.clone(),
            values,
        })
    }

    /// Encodes a log of this shape emitted by `address`. Tokens are given in
    /// declaration order.
    pub fn encode_log(&self, address: Address, tokens: &[Token]) -> Result<Event> {
        if tokens.len() != self.params.len() {
            return Err(self.error(format!(
                "expected {} values, got {}",
                self.params.len(),
                tokens.len()
            )));
        }

        let mut topics = vec![self.id];
        let mut heads: Vec<[u8; WORD]> = Vec::new();
        let mut tails: Vec<(usize, Vec<u8>)> = Vec::new();

        for (param, token) in self.params.iter().zip(tokens) {
            let dynamic = match (param.kind, token) {
                (ParamKind::String, Token::String(s)) => Some(s.as_bytes().to_vec()),
                (ParamKind::Bytes, Token::Bytes(b)) => Some(b.to_vec()),
                (kind, token) => {
                    let word = encode_static(kind, token).ok_or_else(|| {
                        self.error(format!(
                            "{} cannot hold a {} value",
                            param.name,
                            token.type_name()
                        ))
                    })?;
                    if param.indexed {
                        topics.push(B256::from(word));
                    } else {
                        heads.push(word);
                    }
                    None
                }
            };
            if let Some(bytes) = dynamic {
                if param.indexed {
                    topics.push(keccak256(&bytes));
                } else {
                    tails.push((heads.len(), bytes));
                    heads.push([0u8; WORD]);
                }
            }
        }

        let mut offset = heads.len() * WORD;
        let mut tail_data = Vec::new();
        for (slot, bytes) in &tails {
            heads[*slot] = U256::from(offset).to_be_bytes::<32>();
            let padded = bytes.len().div_ceil(WORD) * WORD;
            tail_data.extend_from_slice(&U256::from(bytes.len()).to_be_bytes::<32>());
            tail_data.extend_from_slice(bytes);
            tail_data.resize(tail_data.len() + padded - bytes.len(), 0);
            offset += WORD + padded;
        }

        let mut data: Vec<u8> = heads.concat();
        data.extend_from_slice(&tail_data);
        Ok(Event {
            address,
            topics,
            data: Bytes::from(data),
            ..Default::default()
        })
    }
}

impl EventType for AbiEvent {
    fn id(&self) -> B256 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn decode(&self, event: &Event) -> Result<EventValues> {
        self.decode_log(event)
    }
}

/// Decoded parameters of one event, by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventValues {
    event: String,
    values: Vec<(String, Token)>,
}

impl EventValues {
    /// Creates a set of values for `event`.
    pub fn new(event: impl Into<String>, values: Vec<(String, Token)>) -> Self {
        Self {
            event: event.into(),
            values,
        }
    }

    /// Returns the event name.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Returns a parameter by name.
    pub fn get(&self, name: &str) -> Option<&Token> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Iterates over the parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Token)> + '_ {
        self.values.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn expect<'a, T>(
        &'a self,
        name: &str,
        what: &str,
        extract: impl FnOnce(&'a Token) -> Option<T>,
    ) -> Result<T> {
        let token = self.get(name).ok_or_else(|| Error::EventDecode {
            event: self.event.clone(),
            message: format!("no parameter {}", name),
        })?;
        extract(token).ok_or_else(|| Error::EventDecode {
            event: self.event.clone(),
            message: format!("{} is a {}, expected {}", name, token.type_name(), what),
        })
    }

    pub fn address(&self, name: &str) -> Result<Address> {
        self.expect(name, "address", |t| match t {
            Token::Address(a) => Some(*a),
            _ => None,
        })
    }

    pub fn uint(&self, name: &str) -> Result<U256> {
        self.expect(name, "uint", |t| match t {
            Token::Uint(v) => Some(*v),
            _ => None,
        })
    }

    /// Reads a `uint` parameter that fits in 64 bits.
    pub fn u64(&self, name: &str) -> Result<u64> {
        self.expect(name, "uint fitting u64", |t| match t {
            Token::Uint(v) if v.bit_len() <= 64 => Some(v.as_limbs()[0]),
            _ => None,
        })
    }

    pub fn bytes32(&self, name: &str) -> Result<B256> {
        self.expect(name, "fixed bytes", |t| match t {
            Token::FixedBytes(b) => Some(*b),
            _ => None,
        })
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        self.expect(name, "string", |t| match t {
            Token::String(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn boolean(&self, name: &str) -> Result<bool> {
        self.expect(name, "bool", |t| match t {
            Token::Bool(b) => Some(*b),
            _ => None,
        })
    }

    /// Reads a `uint` parameter as a field value.
    pub fn uint_value(&self, name: &str) -> Result<Value> {
        self.uint(name).map(Value::from)
    }
}

/// Returns the first four bytes of the keccak-256 of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Reads the `index`-th 32-byte word.
pub(crate) fn read_word(data: &[u8], index: usize) -> Option<[u8; WORD]> {
    let start = index.checked_mul(WORD)?;
    let slice = data.get(start..start.checked_add(WORD)?)?;
    slice.try_into().ok()
}

/// Reads a length-prefixed byte string starting at `offset`.
pub(crate) fn read_dynamic(data: &[u8], offset: usize) -> Option<&[u8]> {
    let len_word: [u8; WORD] = data.get(offset..offset.checked_add(WORD)?)?.try_into().ok()?;
    let len = word_to_usize(&len_word)?;
    let start = offset + WORD;
    data.get(start..start.checked_add(len)?)
}

pub(crate) fn word_to_usize(word: &[u8; WORD]) -> Option<usize> {
    let value = U256::from_be_bytes(*word);
    if value.bit_len() > 32 {
        return None;
    }
    usize::try_from(value.as_limbs()[0]).ok()
}

pub(crate) fn decode_static(kind: ParamKind, word: &[u8; WORD]) -> Option<Token> {
    let raw = U256::from_be_bytes(*word);
    match kind {
        ParamKind::Address => word[..12]
            .iter()
            .all(|b| *b == 0)
            .then(|| Token::Address(Address::from_slice(&word[12..]))),
        ParamKind::Bool => match raw {
            v if v.is_zero() => Some(Token::Bool(false)),
            v if v == U256::from(1u8) => Some(Token::Bool(true)),
            _ => None,
        },
        ParamKind::Uint(bits) => (raw.bit_len() <= bits as usize).then_some(Token::Uint(raw)),
        ParamKind::Int(bits) => {
            let value = I256::from_raw(raw);
            let magnitude = if value.is_negative() { !raw } else { raw };
            (magnitude.bit_len() < bits as usize).then_some(Token::Int(value))
        }
        ParamKind::FixedBytes(len) => word[len as usize..]
            .iter()
            .all(|b| *b == 0)
            .then(|| Token::FixedBytes(B256::from(*word))),
        ParamKind::String | ParamKind::Bytes => None,
    }
}

fn encode_static(kind: ParamKind, token: &Token) -> Option<[u8; WORD]> {
    let word = match (kind, token) {
        (ParamKind::Address, Token::Address(a)) => {
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(a.as_slice());
            word
        }
        (ParamKind::Bool, Token::Bool(b)) => U256::from(*b as u8).to_be_bytes::<32>(),
        (ParamKind::Uint(_), Token::Uint(v)) => v.to_be_bytes::<32>(),
        (ParamKind::Int(_), Token::Int(v)) => v.into_raw().to_be_bytes::<32>(),
        (ParamKind::FixedBytes(_), Token::FixedBytes(b)) => b.0,
        _ => return None,
    };
    decode_static(kind, &word).map(|_| word)
}
