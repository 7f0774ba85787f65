//! Contract reads with fallbacks.
//!
//! Token contracts in the wild disagree on how they expose metadata: `name()`
//! may return a `string` or a `bytes32`, some use `getName()`. A
//! [`ContractCaller`] keeps an ordered list of candidate calls per alias and
//! returns the first one that succeeds.

use crate::abi::{decode_static, read_dynamic, read_word, selector, word_to_usize, ParamKind, Token};
use alloy_primitives::{Address, Bytes};
use blockstate_core::{Error, Result, Value};
use blockstate_storage::ChainClient;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Turns raw return data into a field value.
pub trait ReturnDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<Value>;
}

/// A dynamic `string` return value.
#[derive(Clone, Copy, Debug, Default)]
pub struct AbiString;

impl ReturnDecoder for AbiString {
    fn decode(&self, data: &[u8]) -> Result<Value> {
        let bytes = read_word(data, 0)
            .and_then(|head| word_to_usize(&head))
            .and_then(|offset| read_dynamic(data, offset))
            .ok_or_else(|| Error::rpc("malformed string return data"))?;
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::rpc("string return data is not utf-8"))?;
        Ok(Value::from(text))
    }
}

/// A `bytes32` holding right-zero-padded text.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bytes32String;

impl ReturnDecoder for Bytes32String {
    fn decode(&self, data: &[u8]) -> Result<Value> {
        let word = read_word(data, 0).ok_or_else(|| Error::rpc("missing bytes32 return data"))?;
        let end = word.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        let text = std::str::from_utf8(&word[..end])
            .map_err(|_| Error::rpc("bytes32 return data is not utf-8"))?;
        Ok(Value::from(text))
    }
}

/// An unsigned integer of at most `bits` bits.
#[derive(Clone, Copy, Debug)]
pub struct AbiUint {
    bits: u16,
}

impl AbiUint {
    pub fn new(bits: u16) -> Self {
        Self { bits }
    }
}

impl Default for AbiUint {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ReturnDecoder for AbiUint {
    fn decode(&self, data: &[u8]) -> Result<Value> {
        let word = read_word(data, 0).ok_or_else(|| Error::rpc("missing uint return data"))?;
        match decode_static(ParamKind::Uint(self.bits), &word) {
            Some(Token::Uint(value)) => Ok(Value::from(value)),
            _ => Err(Error::rpc(format!("uint{} return value out of range", self.bits))),
        }
    }
}

/// One candidate zero-argument call.
#[derive(Clone)]
pub struct Caller {
    function: String,
    selector: [u8; 4],
    decoder: Arc<dyn ReturnDecoder>,
}

impl Caller {
    /// Parses `function name() [view] returns (type)`.
    ///
    /// The return decoder follows the declared type: `string`, `bytes32` or
    /// `uint<N>`.
    pub fn new(declaration: &str) -> Result<Self> {
        let bad = |reason: &str| Error::config(format!("caller {:?}: {}", declaration, reason));
        let rest = declaration.trim();
        let rest = rest.strip_prefix("function ").unwrap_or(rest).trim_start();

        let open = rest.find('(').ok_or_else(|| bad("missing argument list"))?;
        let name = rest[..open].trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(bad("invalid function name"));
        }
        let after = rest[open + 1..].trim_start();
        let after = after
            .strip_prefix(')')
            .ok_or_else(|| bad("only zero-argument calls are supported"))?;

        let returns = after
            .split_once("returns")
            .map(|(_, ret)| ret.trim())
            .ok_or_else(|| bad("missing return type"))?;
        let ret = returns
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .map(str::trim)
            .ok_or_else(|| bad("return type must be parenthesized"))?;
        let ret = ret.split_whitespace().next().unwrap_or_default();

        let decoder: Arc<dyn ReturnDecoder> = match ParamKind::parse(ret) {
            Some(ParamKind::String) => Arc::new(AbiString),
            Some(ParamKind::FixedBytes(32)) => Arc::new(Bytes32String),
            Some(ParamKind::Uint(bits)) => Arc::new(AbiUint::new(bits)),
            _ => return Err(bad("unsupported return type")),
        };

        let function = format!("{}()", name);
        Ok(Self {
            selector: selector(&function),
            function,
            decoder,
        })
    }

    /// Replaces the return decoder.
    pub fn with_decoder(mut self, decoder: impl ReturnDecoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Returns the canonical function signature, e.g. `name()`.
    #[inline]
    pub fn function(&self) -> &str {
        &self.function
    }

    #[inline]
    pub fn selector(&self) -> [u8; 4] {
        self.selector
    }

    /// Performs the call and decodes its return data.
    pub fn call(&self, addr: Address, client: &dyn ChainClient) -> Result<Value> {
        let input = Bytes::copy_from_slice(&self.selector);
        let output = client.call(addr, &input)?;
        self.decoder.decode(&output)
    }
}

/// Named groups of fallback calls.
#[derive(Clone, Default)]
pub struct ContractCaller {
    groups: BTreeMap<String, Vec<Caller>>,
}

impl ContractCaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends candidates to the group `alias`.
    pub fn add_caller(&mut self, alias: impl Into<String>, callers: impl IntoIterator<Item = Caller>) {
        self.groups.entry(alias.into()).or_default().extend(callers);
    }

    /// Builder form of [`ContractCaller::add_caller`] parsing declarations.
    pub fn with(mut self, alias: &str, declarations: &[&str]) -> Result<Self> {
        let callers = declarations
            .iter()
            .map(|d| Caller::new(d))
            .collect::<Result<Vec<_>>>()?;
        self.add_caller(alias, callers);
        Ok(self)
    }

    /// Returns true if `alias` has candidates.
    pub fn contains(&self, alias: &str) -> bool {
        self.groups.contains_key(alias)
    }

    /// Tries each candidate of `alias` in order and returns the first value
    /// that is read and decoded successfully.
    pub fn call(&self, alias: &str, addr: Address, client: &dyn ChainClient) -> Result<Value> {
        let group = self
            .groups
            .get(alias)
            .ok_or_else(|| Error::config(format!("no callers registered for {}", alias)))?;

        for caller in group {
            match caller.call(addr, client) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    debug!(alias, function = caller.function(), %addr, error = %err, "candidate call failed")
                }
            }
        }
        Err(Error::rpc(format!("{}: every candidate call failed for {}", alias, addr)))
    }
}
