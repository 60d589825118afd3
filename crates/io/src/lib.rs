mod code;
mod codec;
mod definition;
mod index;
mod instr;
mod listing;
mod module;

pub use code::{CodeBuilder, CodeError, Label};
pub use codec::DecodeError;
pub use definition::{
    Attribute, Class, ClassFlags, Definition, DefinitionIndex, Field, FieldFlags, GenericParam,
    IndexedDefinition, Method, MethodFlags, Parameter, Property, Type, TypeKind, Visibility,
};
pub use index::{
    ClassIndex, DefIndex, FieldIndex, MethodIndex, NameIndex, PoolIndex, PropertyIndex,
    StringIndex, TypeIndex, types,
};
pub use instr::{Instr, Invoke, Offset};
pub use listing::Listing;
pub use module::{Module, PoolItemIndex, PoolItemIndexMut, StringPool};
