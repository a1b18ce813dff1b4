//! Type-tag encode/decode registry
//!
//! Two independently mutable maps from a type tag to an encoder and a decoder
//! function. Both are pre-populated for the built-in value types and can be
//! extended at runtime; registration is last-write-wins and may be one-sided
//! (an encoder without a decoder, or the reverse). There is no rollback;
//! partial registration is an explicit contract.
//!
//! Each dictionary owns its own registry by default. A process-wide instance
//! exists only as the opt-in [`TypeRegistry::shared`] handle.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::error::{Result, VaultDictError};
use crate::value::Value;

/// Encoder: turns a value into its wire payload.
pub type EncodeFn = Arc<dyn Fn(&Value) -> Result<String> + Send + Sync>;

/// Decoder: turns a wire payload back into a value.
pub type DecodeFn = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// A shareable registry handle.
pub type SharedRegistry = Arc<RwLock<TypeRegistry>>;

/// A type that can be stored through the registry under its own tag.
///
/// The tag becomes the envelope prefix; `encode`/`decode` define the type's
/// native string form. `into_value`/`from_value` bridge instances in and out
/// of the [`Value`] model.
///
/// ```
/// use vaultdict::{Extended, Result, VaultDictError};
///
/// struct Customer { name: String, age: i64 }
///
/// impl Extended for Customer {
///     fn type_tag() -> &'static str { "Customer" }
///     fn encode(&self) -> String { format!("{}|{}", self.name, self.age) }
///     fn decode(data: &str) -> Result<Self> {
///         let (name, age) = data.split_once('|').ok_or_else(|| {
///             VaultDictError::Decode { tag: "Customer".into(), reason: "missing separator".into() }
///         })?;
///         Ok(Customer {
///             name: name.to_string(),
///             age: age.parse().map_err(|e| VaultDictError::Decode {
///                 tag: "Customer".into(),
///                 reason: format!("{}", e),
///             })?,
///         })
///     }
/// }
/// ```
pub trait Extended: Sized {
    /// Tag under which values of this type travel on the wire.
    fn type_tag() -> &'static str;

    /// Native string form of this instance.
    fn encode(&self) -> String;

    /// Rebuild an instance from its native string form.
    fn decode(data: &str) -> Result<Self>;

    /// Wrap this instance as a storable [`Value`].
    fn into_value(self) -> Value {
        Value::Ext {
            tag: Self::type_tag().to_string(),
            data: self.encode(),
        }
    }

    /// Recover an instance from a [`Value`] previously produced by this type.
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Ext { tag, data } if tag == Self::type_tag() => Self::decode(data),
            other => Err(VaultDictError::TypeMismatch {
                expected: Self::type_tag(),
                found: other.type_name(),
            }),
        }
    }
}

/// Mapping from type tags to encode/decode behavior.
pub struct TypeRegistry {
    encoders: HashMap<String, EncodeFn>,
    decoders: HashMap<String, DecodeFn>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry pre-populated with the built-in types.
    pub fn new() -> Self {
        let mut registry = Self {
            encoders: HashMap::new(),
            decoders: HashMap::new(),
        };
        for tag in ["str", "int", "float", "bool", "none", "list", "dict"] {
            registry
                .encoders
                .insert(tag.to_string(), Arc::new(default_encode));
        }
        registry
            .decoders
            .insert("str".to_string(), Arc::new(|payload| Ok(Value::Str(payload.to_string()))));
        registry
            .decoders
            .insert("int".to_string(), Arc::new(|payload| parse_literal(payload, "int")));
        registry
            .decoders
            .insert("float".to_string(), Arc::new(|payload| parse_literal(payload, "float")));
        registry
            .decoders
            .insert("bool".to_string(), Arc::new(|payload| parse_literal(payload, "bool")));
        registry
            .decoders
            .insert("none".to_string(), Arc::new(|_| Ok(Value::Null)));
        registry
            .decoders
            .insert("list".to_string(), Arc::new(|payload| parse_container(payload, "list")));
        registry
            .decoders
            .insert("dict".to_string(), Arc::new(|payload| parse_container(payload, "dict")));
        registry
    }

    /// The process-wide registry. Registrations made through this handle are
    /// visible to every dictionary constructed with it; prefer per-instance
    /// registries unless cross-instance sharing is the point.
    pub fn shared() -> SharedRegistry {
        static SHARED: OnceLock<SharedRegistry> = OnceLock::new();
        SHARED
            .get_or_init(|| Arc::new(RwLock::new(TypeRegistry::new())))
            .clone()
    }

    /// Encode a value into its wire payload.
    ///
    /// Looks up the encoder registered for the value's tag; a missing entry
    /// falls back to the built-in encoding (identity for extension values).
    pub fn encode(&self, value: &Value) -> Result<String> {
        match self.encoders.get(value.type_tag()) {
            Some(encode) => encode(value),
            None => default_encode(value),
        }
    }

    /// Decode a wire payload under the given tag.
    ///
    /// An unregistered tag never fails: the default decoder applies a
    /// best-effort literal coercion and otherwise returns the payload as a
    /// string. Errors from a registered decoder propagate.
    pub fn decode(&self, tag: &str, payload: &str) -> Result<Value> {
        match self.decoders.get(tag) {
            Some(decode) => decode(payload),
            None => Ok(default_decode(payload)),
        }
    }

    /// Register an encoder for a tag. Last write wins.
    pub fn register_encoder(&mut self, tag: impl Into<String>, encode: EncodeFn) {
        self.encoders.insert(tag.into(), encode);
    }

    /// Register a decoder for a tag. Last write wins.
    pub fn register_decoder(&mut self, tag: impl Into<String>, decode: DecodeFn) {
        self.decoders.insert(tag.into(), decode);
    }

    /// Remove both registrations for a tag.
    pub fn unregister(&mut self, tag: &str) {
        self.encoders.remove(tag);
        self.decoders.remove(tag);
    }

    /// Register a type implementing [`Extended`] under its own tag.
    ///
    /// The wire payload is the type's native string form; the decoder wraps
    /// it back into [`Value::Ext`] so [`Extended::from_value`] can rebuild
    /// the instance.
    pub fn register<T: Extended + 'static>(&mut self) {
        let tag = T::type_tag();
        self.encoders.insert(
            tag.to_string(),
            Arc::new(move |value| match value {
                Value::Ext { data, .. } => Ok(data.clone()),
                other => Err(VaultDictError::TypeMismatch {
                    expected: tag,
                    found: other.type_name(),
                }),
            }),
        );
        self.decoders.insert(
            tag.to_string(),
            Arc::new(move |payload| {
                // run the type's decoder so malformed payloads fail here,
                // not at first access
                let instance = T::decode(payload)?;
                Ok(instance.into_value())
            }),
        );
    }

    /// Register explicit encode/decode functions for a tag.
    ///
    /// Either side may be omitted; the other registration still takes effect
    /// (no rollback). Supplying neither is an error.
    pub fn extend_with(
        &mut self,
        tag: impl Into<String>,
        encode: Option<EncodeFn>,
        decode: Option<DecodeFn>,
    ) -> Result<()> {
        let tag = tag.into();
        if encode.is_none() && decode.is_none() {
            return Err(VaultDictError::MissingCodec(tag));
        }
        if let Some(encode) = encode {
            self.encoders.insert(tag.clone(), encode);
        }
        if let Some(decode) = decode {
            self.decoders.insert(tag, decode);
        }
        Ok(())
    }

    /// Whether an encoder is registered for `tag`.
    pub fn has_encoder(&self, tag: &str) -> bool {
        self.encoders.contains_key(tag)
    }

    /// Whether a decoder is registered for `tag`.
    pub fn has_decoder(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }
}

/// Built-in encoding for every value variant.
fn default_encode(value: &Value) -> Result<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::List(_) | Value::Dict(_) => Ok(serde_json::to_string(&value.to_json()?)?),
        Value::Ext { data, .. } => Ok(data.clone()),
    }
}

/// Best-effort coercion for payloads whose tag has no registered decoder.
fn default_decode(payload: &str) -> Value {
    if let Ok(i) = payload.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = payload.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Str(payload.to_string())
}

fn parse_literal(payload: &str, tag: &str) -> Result<Value> {
    let decode_err = |reason: String| VaultDictError::Decode {
        tag: tag.to_string(),
        reason,
    };
    match tag {
        "int" => payload
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| decode_err(e.to_string())),
        "float" => payload
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| decode_err(e.to_string())),
        "bool" => payload
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|e| decode_err(e.to_string())),
        _ => Err(decode_err("unknown literal tag".to_string())),
    }
}

fn parse_container(payload: &str, tag: &str) -> Result<Value> {
    let json: serde_json::Value = serde_json::from_str(payload)?;
    match (tag, &json) {
        ("list", serde_json::Value::Array(_)) | ("dict", serde_json::Value::Object(_)) => {
            Ok(Value::from_json(json))
        }
        _ => Err(VaultDictError::Decode {
            tag: tag.to_string(),
            reason: "payload is not the expected container shape".to_string(),
        }),
    }
}
