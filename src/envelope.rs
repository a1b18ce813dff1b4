//! Wire envelope for typed values
//!
//! Every stored value travels as `tag:payload`. The tag names the
//! encoder/decoder pair that governs the value; the payload is whatever that
//! pair produced and may itself contain colons, so the envelope splits on
//! the first colon only.

use nom::{
    bytes::complete::{tag as nom_tag, take_until},
    combinator::rest,
    sequence::separated_pair,
    IResult,
};

use crate::error::{Result, VaultDictError};
use crate::registry::TypeRegistry;
use crate::value::Value;

/// A `tag:payload` pair ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub tag: String,
    pub payload: String,
}

impl Envelope {
    /// Encode a value through the registry into an envelope.
    pub fn seal(registry: &TypeRegistry, value: &Value) -> Result<Envelope> {
        let payload = registry.encode(value)?;
        Ok(Envelope {
            tag: value.type_tag().to_string(),
            payload,
        })
    }

    /// Decode a wire string back into a value through the registry.
    pub fn open(registry: &TypeRegistry, wire: &str) -> Result<Value> {
        let envelope = Envelope::from_wire(wire)?;
        registry.decode(&envelope.tag, &envelope.payload)
    }

    /// Render the wire form.
    pub fn to_wire(&self) -> String {
        format!("{}:{}", self.tag, self.payload)
    }

    /// Parse a wire string into tag and payload.
    pub fn from_wire(wire: &str) -> Result<Envelope> {
        let (_, (tag, payload)) = envelope_parts(wire)
            .map_err(|_| VaultDictError::Envelope(format!("no type tag in {:?}", wire)))?;
        Ok(Envelope {
            tag: tag.to_string(),
            payload: payload.to_string(),
        })
    }
}

/// Split `tag:payload` on the first colon.
fn envelope_parts(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(take_until(":"), nom_tag(":"), rest)(input)
}
