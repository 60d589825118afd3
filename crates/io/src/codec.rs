use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::definition::{
    Attribute, Class, ClassFlags, Definition, Field, FieldFlags, GenericParam, Method,
    MethodFlags, Parameter, Property, Type, TypeKind, Visibility,
};
use crate::index::{DefIndex, PoolIndex};
use crate::instr::{Instr, Invoke, Offset};
use crate::module::{Module, PoolItemIndex, StringPool};

type LE = LittleEndian;

struct Header;

impl Header {
    const MAGIC: [u8; 4] = *b"NWMD";
    const SUPPORTED_VERSION: u32 = 1;
}

impl Module {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut input = Cursor::new(bytes);
        let mut magic = [0; 4];
        input.read_exact(&mut magic)?;
        if magic != Header::MAGIC {
            return Err(DecodeError::InvalidMagic);
        }
        let version = input.read_u32::<LE>()?;
        if version != Header::SUPPORTED_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let crc = input.read_u32::<LE>()?;
        let len = input.read_u32::<LE>()? as usize;
        let start = input.position() as usize;
        let payload = bytes
            .get(start..start + len)
            .ok_or(DecodeError::Truncated)?;
        if crc32fast::hash(payload) != crc {
            return Err(DecodeError::ChecksumMismatch);
        }

        let mut decoder = Decoder {
            input: Cursor::new(payload),
        };
        let names = decoder.pool()?;
        let strings = decoder.pool()?;
        let count = decoder.input.read_u32::<LE>()?;
        let mut definitions = vec![Definition::UNDEFINED];
        for _ in 0..count {
            definitions.push(decoder.definition()?);
        }

        let module = Module::from_parts(names, strings, definitions);
        verify(&module)?;
        Ok(module)
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut payload = vec![];
        let mut encoder = Encoder { out: &mut payload };
        encoder.pool(self.names().iter())?;
        encoder.pool(self.strings().iter())?;
        encoder.len(self.definitions().len())?;
        for def in self.definitions() {
            encoder.definition(def)?;
        }

        let mut bytes = Vec::with_capacity(payload.len() + 16);
        bytes.write_all(&Header::MAGIC)?;
        bytes.write_u32::<LE>(Header::SUPPORTED_VERSION)?;
        bytes.write_u32::<LE>(crc32fast::hash(&payload))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "module too large"))?;
        bytes.write_u32::<LE>(len)?;
        bytes.write_all(&payload)?;
        Ok(bytes)
    }
}

struct Encoder<'a> {
    out: &'a mut Vec<u8>,
}

impl Encoder<'_> {
    fn len(&mut self, len: usize) -> io::Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "sequence too long"))?;
        self.out.write_u32::<LE>(len)
    }

    fn str(&mut self, str: &str) -> io::Result<()> {
        let len = u16::try_from(str.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "string too long"))?;
        self.out.write_u16::<LE>(len)?;
        self.out.write_all(str.as_bytes())
    }

    fn pool<'s>(&mut self, strings: impl ExactSizeIterator<Item = &'s str>) -> io::Result<()> {
        self.len(strings.len())?;
        strings.into_iter().try_for_each(|str| self.str(str))
    }

    #[inline]
    fn index(&mut self, index: impl Into<u32>) -> io::Result<()> {
        self.out.write_u32::<LE>(index.into())
    }

    fn opt_index(&mut self, index: Option<impl Into<u32>>) -> io::Result<()> {
        let index: u32 = index.map_or(0, Into::into);
        self.out.write_u32::<LE>(index)
    }

    fn indices<I: Into<u32> + Copy>(&mut self, indices: &[I]) -> io::Result<()> {
        self.len(indices.len())?;
        indices.iter().try_for_each(|&idx| self.index(idx))
    }

    fn attributes(&mut self, attributes: &[Attribute]) -> io::Result<()> {
        self.len(attributes.len())?;
        for attr in attributes {
            self.index(attr.name())?;
            match attr.value() {
                Some(value) => {
                    self.out.write_u8(1)?;
                    self.str(value)?;
                }
                None => self.out.write_u8(0)?,
            }
        }
        Ok(())
    }

    fn definition(&mut self, def: &Definition) -> io::Result<()> {
        self.out.write_u8(def.tag())?;
        self.index(def.name())?;
        match def {
            Definition::Type(typ) => match typ.kind() {
                TypeKind::Primitive => self.out.write_u8(0),
                TypeKind::Class(class) => {
                    self.out.write_u8(1)?;
                    self.index(class)
                }
                TypeKind::MethodParam(n) => {
                    self.out.write_u8(2)?;
                    self.out.write_u16::<LE>(n)
                }
            },
            Definition::Class(class) => {
                self.out.write_u8(class.visibility().tag())?;
                self.out.write_u8(class.flags().into_bits())?;
                self.opt_index(class.base())?;
                self.indices(class.fields())?;
                self.indices(class.properties())?;
                self.indices(class.methods())
            }
            Definition::Field(field) => {
                self.index(field.class())?;
                self.out.write_u8(field.visibility().tag())?;
                self.index(field.type_())?;
                self.out.write_u8(field.flags().into_bits())?;
                self.attributes(field.attributes())
            }
            Definition::Property(prop) => {
                self.index(prop.class())?;
                self.index(prop.type_())?;
                self.opt_index(prop.getter())?;
                self.opt_index(prop.setter())?;
                self.attributes(prop.attributes())
            }
            Definition::Method(method) => {
                self.opt_index(method.class())?;
                self.out.write_u8(method.visibility().tag())?;
                self.out.write_u8(method.flags().into_bits())?;
                self.len(method.type_params().len())?;
                for param in method.type_params() {
                    self.index(param.name())?;
                    self.opt_index(param.constraint())?;
                }
                self.len(method.parameters().len())?;
                for param in method.parameters() {
                    self.index(param.name())?;
                    self.index(param.type_())?;
                }
                self.indices(method.locals())?;
                self.opt_index(method.return_type())?;
                self.len(method.body().len())?;
                method.body().iter().try_for_each(|instr| self.instr(instr))
            }
        }
    }

    fn instr(&mut self, instr: &Instr) -> io::Result<()> {
        self.out.write_u8(instr.opcode())?;
        match instr {
            Instr::LoadArg(n) | Instr::LoadLocal(n) | Instr::StoreLocal(n) => {
                self.out.write_u16::<LE>(*n)
            }
            Instr::LoadArgShort(n)
            | Instr::LoadLocalShort(n)
            | Instr::StoreLocalShort(n)
            | Instr::Concat(n) => self.out.write_u8(*n),
            Instr::StringConst(idx) => self.index(*idx),
            Instr::LoadField(idx) | Instr::StoreField(idx) => self.index(*idx),
            Instr::IsInstance(idx) | Instr::Cast(idx) => self.index(*idx),
            Instr::Call(invoke) | Instr::CallVirtual(invoke) => {
                self.index(invoke.method())?;
                let count = u8::try_from(invoke.type_args().len()).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "too many type arguments")
                })?;
                self.out.write_u8(count)?;
                invoke
                    .type_args()
                    .iter()
                    .try_for_each(|&idx| self.index(idx))
            }
            Instr::New { class, arg_count } => {
                self.index(*class)?;
                self.out.write_u8(*arg_count)
            }
            Instr::Jump(offset) | Instr::JumpIfTrue(offset) | Instr::JumpIfFalse(offset) => {
                self.out.write_i32::<LE>((*offset).into())
            }
            Instr::JumpShort(offset)
            | Instr::JumpIfTrueShort(offset)
            | Instr::JumpIfFalseShort(offset) => {
                let offset = i8::try_from(i32::from(*offset)).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "short branch out of range")
                })?;
                self.out.write_i8(offset)
            }
            Instr::Nop
            | Instr::Null
            | Instr::Dup
            | Instr::Pop
            | Instr::Throw
            | Instr::Return => Ok(()),
        }
    }
}

struct Decoder<'a> {
    input: Cursor<&'a [u8]>,
}

impl Decoder<'_> {
    fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.input.read_u16::<LE>()?;
        let mut buf = vec![0; len as usize];
        self.input.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|_| DecodeError::InvalidUtf8)
    }

    fn len(&mut self) -> Result<usize, DecodeError> {
        let len = self.input.read_u32::<LE>()? as usize;
        let remaining = self.input.get_ref().len() - self.input.position() as usize;
        // every encoded item takes at least one byte
        if len > remaining {
            return Err(DecodeError::Truncated);
        }
        Ok(len)
    }

    fn pool<A>(&mut self) -> Result<StringPool<A>, DecodeError> {
        let mut pool = StringPool::new();
        for _ in 0..self.len()? {
            let str = self.string()?;
            if !pool.push_unique(str.clone()) {
                return Err(DecodeError::DuplicatePoolEntry(str));
            }
        }
        Ok(pool)
    }

    #[inline]
    fn pool_index<A>(&mut self) -> Result<PoolIndex<A>, DecodeError> {
        Ok(PoolIndex::new(self.input.read_u32::<LE>()?))
    }

    fn def_index<A>(&mut self) -> Result<DefIndex<A>, DecodeError> {
        let idx = self.input.read_u32::<LE>()?;
        DefIndex::new(idx).ok_or(DecodeError::InvalidIndex(idx))
    }

    fn opt_def_index<A>(&mut self) -> Result<Option<DefIndex<A>>, DecodeError> {
        Ok(DefIndex::new(self.input.read_u32::<LE>()?))
    }

    fn def_indices<A>(&mut self) -> Result<Vec<DefIndex<A>>, DecodeError> {
        (0..self.len()?).map(|_| self.def_index()).collect()
    }

    fn visibility(&mut self) -> Result<Visibility, DecodeError> {
        let tag = self.input.read_u8()?;
        Visibility::from_tag(tag).ok_or(DecodeError::InvalidTag {
            what: "visibility",
            tag,
        })
    }

    fn attributes(&mut self) -> Result<Vec<Attribute>, DecodeError> {
        (0..self.len()?)
            .map(|_| -> Result<_, DecodeError> {
                let name = self.pool_index()?;
                let value = match self.input.read_u8()? {
                    0 => None,
                    1 => Some(self.string()?),
                    tag => {
                        return Err(DecodeError::InvalidTag {
                            what: "attribute value",
                            tag,
                        });
                    }
                };
                Ok(Attribute::new(name, value))
            })
            .collect()
    }

    fn definition(&mut self) -> Result<Definition, DecodeError> {
        let tag = self.input.read_u8()?;
        let name = self.pool_index()?;
        let def: Definition = match tag {
            0 => {
                let kind = match self.input.read_u8()? {
                    0 => TypeKind::Primitive,
                    1 => TypeKind::Class(self.def_index()?),
                    2 => TypeKind::MethodParam(self.input.read_u16::<LE>()?),
                    tag => {
                        return Err(DecodeError::InvalidTag {
                            what: "type kind",
                            tag,
                        });
                    }
                };
                Type::new(name, kind).into()
            }
            1 => {
                let visibility = self.visibility()?;
                let flags = ClassFlags::from_bits(self.input.read_u8()?);
                Class::new(name, visibility, flags)
                    .with_base(self.opt_def_index()?)
                    .with_fields(self.def_indices()?)
                    .with_properties(self.def_indices()?)
                    .with_methods(self.def_indices()?)
                    .into()
            }
            2 => {
                let class = self.def_index()?;
                let visibility = self.visibility()?;
                let type_ = self.def_index()?;
                let flags = FieldFlags::from_bits(self.input.read_u8()?);
                Field::new(name, class, visibility, type_, flags)
                    .with_attributes(self.attributes()?)
                    .into()
            }
            3 => {
                let class = self.def_index()?;
                let type_ = self.def_index()?;
                Property::new(name, class, type_)
                    .with_getter(self.opt_def_index()?)
                    .with_setter(self.opt_def_index()?)
                    .with_attributes(self.attributes()?)
                    .into()
            }
            4 => {
                let class = self.opt_def_index()?;
                let visibility = self.visibility()?;
                let flags = MethodFlags::from_bits(self.input.read_u8()?);
                let type_params = (0..self.len()?)
                    .map(|_| -> Result<_, DecodeError> {
                        Ok(GenericParam::new(self.pool_index()?, self.opt_def_index()?))
                    })
                    .collect::<Result<Vec<_>, DecodeError>>()?;
                let parameters = (0..self.len()?)
                    .map(|_| -> Result<_, DecodeError> {
                        Ok(Parameter::new(self.pool_index()?, self.def_index()?))
                    })
                    .collect::<Result<Vec<_>, DecodeError>>()?;
                let locals = self.def_indices()?;
                let return_type = self.opt_def_index()?;
                let body = (0..self.len()?)
                    .map(|_| self.instr())
                    .collect::<Result<Vec<_>, _>>()?;
                Method::new(name, visibility, flags)
                    .with_class(class)
                    .with_type_params(type_params)
                    .with_parameters(parameters)
                    .with_locals(locals)
                    .with_return_type(return_type)
                    .with_code(body)
                    .into()
            }
            tag => {
                return Err(DecodeError::InvalidTag {
                    what: "definition",
                    tag,
                });
            }
        };
        Ok(def)
    }

    fn invoke(&mut self) -> Result<Invoke, DecodeError> {
        let method = self.def_index()?;
        let count = self.input.read_u8()?;
        let type_args = (0..count)
            .map(|_| self.def_index())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Invoke::new(method, type_args))
    }

    fn instr(&mut self) -> Result<Instr, DecodeError> {
        let opcode = self.input.read_u8()?;
        let instr = match opcode {
            0x00 => Instr::Nop,
            0x01 => Instr::Null,
            0x02 => Instr::LoadArg(self.input.read_u16::<LE>()?),
            0x03 => Instr::LoadArgShort(self.input.read_u8()?),
            0x04 => Instr::LoadLocal(self.input.read_u16::<LE>()?),
            0x05 => Instr::LoadLocalShort(self.input.read_u8()?),
            0x06 => Instr::StoreLocal(self.input.read_u16::<LE>()?),
            0x07 => Instr::StoreLocalShort(self.input.read_u8()?),
            0x08 => Instr::StringConst(self.pool_index()?),
            0x09 => Instr::Dup,
            0x0A => Instr::Pop,
            0x0B => Instr::LoadField(self.def_index()?),
            0x0C => Instr::StoreField(self.def_index()?),
            0x0D => Instr::Call(self.invoke()?),
            0x0E => Instr::CallVirtual(self.invoke()?),
            0x0F => Instr::New {
                class: self.def_index()?,
                arg_count: self.input.read_u8()?,
            },
            0x10 => Instr::Throw,
            0x11 => Instr::Return,
            0x12 => Instr::IsInstance(self.def_index()?),
            0x13 => Instr::Cast(self.def_index()?),
            0x14 => Instr::Concat(self.input.read_u8()?),
            0x15 => Instr::Jump(self.offset()?),
            0x16 => Instr::JumpShort(self.short_offset()?),
            0x17 => Instr::JumpIfTrue(self.offset()?),
            0x18 => Instr::JumpIfTrueShort(self.short_offset()?),
            0x19 => Instr::JumpIfFalse(self.offset()?),
            0x1A => Instr::JumpIfFalseShort(self.short_offset()?),
            tag => {
                return Err(DecodeError::InvalidTag {
                    what: "opcode",
                    tag,
                });
            }
        };
        Ok(instr)
    }

    #[inline]
    fn offset(&mut self) -> Result<Offset, DecodeError> {
        Ok(Offset::from(self.input.read_i32::<LE>()?))
    }

    #[inline]
    fn short_offset(&mut self) -> Result<Offset, DecodeError> {
        Ok(Offset::from(i32::from(self.input.read_i8()?)))
    }
}

fn check<I>(module: &Module, index: I) -> Result<(), DecodeError>
where
    I: PoolItemIndex + Into<u32> + Copy,
{
    match module.get_item(index) {
        Some(_) => Ok(()),
        None => Err(DecodeError::InvalidIndex(index.into())),
    }
}

fn check_all<I>(module: &Module, indices: impl IntoIterator<Item = I>) -> Result<(), DecodeError>
where
    I: PoolItemIndex + Into<u32> + Copy,
{
    indices.into_iter().try_for_each(|idx| check(module, idx))
}

/// Ensures every reference in a decoded module resolves to a definition of the right kind.
fn verify(module: &Module) -> Result<(), DecodeError> {
    for def in module.definitions() {
        check(module, def.name())?;
        match def {
            Definition::Type(typ) => {
                if let TypeKind::Class(class) = typ.kind() {
                    check(module, class)?;
                }
            }
            Definition::Class(class) => {
                check_all(module, class.base())?;
                check_all(module, class.fields().iter().copied())?;
                check_all(module, class.properties().iter().copied())?;
                check_all(module, class.methods().iter().copied())?;
            }
            Definition::Field(field) => {
                check(module, field.class())?;
                check(module, field.type_())?;
                check_all(module, field.attributes().iter().map(Attribute::name))?;
            }
            Definition::Property(prop) => {
                check(module, prop.class())?;
                check(module, prop.type_())?;
                check_all(module, prop.getter())?;
                check_all(module, prop.setter())?;
                check_all(module, prop.attributes().iter().map(Attribute::name))?;
            }
            Definition::Method(method) => {
                check_all(module, method.class())?;
                for param in method.type_params() {
                    check(module, param.name())?;
                    check_all(module, param.constraint())?;
                }
                for param in method.parameters() {
                    check(module, param.name())?;
                    check(module, param.type_())?;
                }
                check_all(module, method.locals().iter().copied())?;
                check_all(module, method.return_type())?;
                for instr in method.body() {
                    match instr {
                        Instr::StringConst(idx) => check(module, *idx)?,
                        Instr::LoadField(idx) | Instr::StoreField(idx) => check(module, *idx)?,
                        Instr::Call(invoke) | Instr::CallVirtual(invoke) => {
                            check(module, invoke.method())?;
                            check_all(module, invoke.type_args().iter().copied())?;
                        }
                        Instr::New { class, .. } => check(module, *class)?,
                        Instr::IsInstance(idx) | Instr::Cast(idx) => check(module, *idx)?,
                        _ => {}
                    }
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid magic number")]
    InvalidMagic,
    #[error("unsupported version {0}")]
    UnsupportedVersion(u32),
    #[error("unexpected end of input")]
    Truncated,
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("invalid {what} tag {tag}")]
    InvalidTag { what: &'static str, tag: u8 },
    #[error("invalid index {0}")]
    InvalidIndex(u32),
    #[error("duplicate pool entry '{0}'")]
    DuplicatePoolEntry(String),
    #[error("invalid utf-8 string")]
    InvalidUtf8,
}
