//! Wire contract for cachefarm.
//!
//! Everything in this crate crosses server boundaries: refresher ids, change
//! flag values, payload field names and instruction records must stay stable
//! for every server in a farm.

pub mod changes;
pub mod codec;
pub mod error;
pub mod ids;
pub mod instruction;
pub mod payloads;

pub use changes::{ContentTypeKind, DomainChangeType, LanguageChangeType, TreeChangeTypes};
pub use codec::{Decoded, decode, decode_ids, decode_lenient, encode, encode_ids};
pub use error::WireError;
pub use instruction::{RefreshInstruction, RefreshMethodType, flatten_instructions};
pub use payloads::{
    ContentPayload, ContentTypePayload, DataTypePayload, DomainPayload, LanguagePayload,
    MacroPayload, MediaPayload, MemberPayload, UserPayload,
};
