use bitfield_struct::bitfield;

use crate::index::{
    self, ClassIndex, FieldIndex, MethodIndex, NameIndex, PropertyIndex, TypeIndex,
};
use crate::instr::Instr;

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Type(Type),
    Class(Box<Class>),
    Field(Box<Field>),
    Property(Box<Property>),
    Method(Box<Method>),
}

impl Definition {
    pub(crate) const UNDEFINED: Self =
        Definition::Type(Type::new(NameIndex::new(0), TypeKind::Primitive));

    pub(crate) fn tag(&self) -> u8 {
        match self {
            Definition::Type(_) => 0,
            Definition::Class(_) => 1,
            Definition::Field(_) => 2,
            Definition::Property(_) => 3,
            Definition::Method(_) => 4,
        }
    }

    pub fn name(&self) -> NameIndex {
        match self {
            Definition::Type(t) => t.name,
            Definition::Class(c) => c.name,
            Definition::Field(f) => f.name,
            Definition::Property(p) => p.name,
            Definition::Method(m) => m.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexedDefinition<'b> {
    Type(TypeIndex, &'b Type),
    Class(ClassIndex, &'b Class),
    Field(FieldIndex, &'b Field),
    Property(PropertyIndex, &'b Property),
    Method(MethodIndex, &'b Method),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    name: NameIndex,
    kind: TypeKind,
}

impl Type {
    #[inline]
    pub const fn new(name: NameIndex, kind: TypeKind) -> Self {
        Self { name, kind }
    }

    #[inline]
    pub fn name(&self) -> NameIndex {
        self.name
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }
}

impl From<Type> for Definition {
    #[inline]
    fn from(t: Type) -> Self {
        Definition::Type(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive,
    Class(ClassIndex),
    /// The n-th generic parameter of the method the type appears in.
    MethodParam(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    name: NameIndex,
    visibility: Visibility,
    flags: ClassFlags,
    base: Option<ClassIndex>,
    fields: Vec<FieldIndex>,
    properties: Vec<PropertyIndex>,
    methods: Vec<MethodIndex>,
}

impl Class {
    pub fn new(name: NameIndex, visibility: Visibility, flags: ClassFlags) -> Self {
        Self {
            name,
            visibility,
            flags,
            base: None,
            fields: vec![],
            properties: vec![],
            methods: vec![],
        }
    }

    #[inline]
    pub fn name(&self) -> NameIndex {
        self.name
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn flags(&self) -> ClassFlags {
        self.flags
    }

    #[inline]
    pub fn base(&self) -> Option<ClassIndex> {
        self.base
    }

    #[inline]
    pub fn fields(&self) -> &[FieldIndex] {
        &self.fields
    }

    #[inline]
    pub fn properties(&self) -> &[PropertyIndex] {
        &self.properties
    }

    #[inline]
    pub fn methods(&self) -> &[MethodIndex] {
        &self.methods
    }

    #[inline]
    pub fn with_base(mut self, base: Option<ClassIndex>) -> Self {
        self.base = base;
        self
    }

    #[inline]
    pub fn with_fields(mut self, fields: impl Into<Vec<FieldIndex>>) -> Self {
        self.fields = fields.into();
        self
    }

    #[inline]
    pub fn with_properties(mut self, properties: impl Into<Vec<PropertyIndex>>) -> Self {
        self.properties = properties.into();
        self
    }

    #[inline]
    pub fn with_methods(mut self, methods: impl Into<Vec<MethodIndex>>) -> Self {
        self.methods = methods.into();
        self
    }

    #[inline]
    pub fn add_field(&mut self, field: FieldIndex) {
        self.fields.push(field);
    }

    #[inline]
    pub fn add_property(&mut self, property: PropertyIndex) {
        self.properties.push(property);
    }

    #[inline]
    pub fn add_method(&mut self, method: MethodIndex) {
        self.methods.push(method);
    }
}

impl From<Class> for Definition {
    #[inline]
    fn from(c: Class) -> Self {
        Definition::Class(Box::new(c))
    }
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct ClassFlags {
    /// Defined in another module and only referenced from this one.
    pub is_import: bool,
    pub is_abstract: bool,
    pub is_sealed: bool,
    #[bits(5)]
    __: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: NameIndex,
    class: ClassIndex,
    visibility: Visibility,
    type_: TypeIndex,
    flags: FieldFlags,
    attributes: Vec<Attribute>,
}

impl Field {
    pub fn new(
        name: NameIndex,
        class: ClassIndex,
        visibility: Visibility,
        type_: TypeIndex,
        flags: FieldFlags,
    ) -> Self {
        Self {
            name,
            class,
            visibility,
            type_,
            flags,
            attributes: vec![],
        }
    }

    #[inline]
    pub fn name(&self) -> NameIndex {
        self.name
    }

    #[inline]
    pub fn class(&self) -> ClassIndex {
        self.class
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn type_(&self) -> TypeIndex {
        self.type_
    }

    #[inline]
    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    #[inline]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    #[inline]
    pub fn with_attributes(mut self, attributes: impl Into<Vec<Attribute>>) -> Self {
        self.attributes = attributes.into();
        self
    }
}

impl From<Field> for Definition {
    #[inline]
    fn from(f: Field) -> Self {
        Definition::Field(Box::new(f))
    }
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct FieldFlags {
    pub is_static: bool,
    pub is_readonly: bool,
    #[bits(6)]
    __: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    name: NameIndex,
    class: ClassIndex,
    type_: TypeIndex,
    getter: Option<MethodIndex>,
    setter: Option<MethodIndex>,
    attributes: Vec<Attribute>,
}

impl Property {
    pub fn new(name: NameIndex, class: ClassIndex, type_: TypeIndex) -> Self {
        Self {
            name,
            class,
            type_,
            getter: None,
            setter: None,
            attributes: vec![],
        }
    }

    #[inline]
    pub fn name(&self) -> NameIndex {
        self.name
    }

    #[inline]
    pub fn class(&self) -> ClassIndex {
        self.class
    }

    #[inline]
    pub fn type_(&self) -> TypeIndex {
        self.type_
    }

    #[inline]
    pub fn getter(&self) -> Option<MethodIndex> {
        self.getter
    }

    #[inline]
    pub fn setter(&self) -> Option<MethodIndex> {
        self.setter
    }

    #[inline]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    #[inline]
    pub fn with_getter(mut self, getter: Option<MethodIndex>) -> Self {
        self.getter = getter;
        self
    }

    #[inline]
    pub fn with_setter(mut self, setter: Option<MethodIndex>) -> Self {
        self.setter = setter;
        self
    }

    #[inline]
    pub fn with_attributes(mut self, attributes: impl Into<Vec<Attribute>>) -> Self {
        self.attributes = attributes.into();
        self
    }
}

impl From<Property> for Definition {
    #[inline]
    fn from(p: Property) -> Self {
        Definition::Property(Box::new(p))
    }
}

/// An attribute instance attached to a member, with its optional string argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: NameIndex,
    value: Option<String>,
}

impl Attribute {
    #[inline]
    pub fn new(name: NameIndex, value: Option<String>) -> Self {
        Self { name, value }
    }

    #[inline]
    pub fn name(&self) -> NameIndex {
        self.name
    }

    #[inline]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    name: NameIndex,
    class: Option<ClassIndex>,
    visibility: Visibility,
    flags: MethodFlags,
    type_params: Vec<GenericParam>,
    parameters: Vec<Parameter>,
    locals: Vec<TypeIndex>,
    return_type: Option<TypeIndex>,
    body: Vec<Instr>,
}

impl Method {
    pub fn new(name: NameIndex, visibility: Visibility, flags: MethodFlags) -> Self {
        Self {
            name,
            class: None,
            visibility,
            flags,
            type_params: vec![],
            parameters: vec![],
            locals: vec![],
            return_type: None,
            body: vec![],
        }
    }

    #[inline]
    pub fn name(&self) -> NameIndex {
        self.name
    }

    #[inline]
    pub fn class(&self) -> Option<ClassIndex> {
        self.class
    }

    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn flags(&self) -> MethodFlags {
        self.flags
    }

    #[inline]
    pub fn type_params(&self) -> &[GenericParam] {
        &self.type_params
    }

    #[inline]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    pub fn locals(&self) -> &[TypeIndex] {
        &self.locals
    }

    #[inline]
    pub fn return_type(&self) -> Option<TypeIndex> {
        self.return_type
    }

    #[inline]
    pub fn body(&self) -> &[Instr] {
        &self.body
    }

    /// Native methods are implemented by the runtime, so they count as having a body.
    #[inline]
    pub fn has_body(&self) -> bool {
        self.flags.is_native() || !self.body.is_empty()
    }

    #[inline]
    pub fn with_class(mut self, class: Option<ClassIndex>) -> Self {
        self.class = class;
        self
    }

    #[inline]
    pub fn with_type_params(mut self, type_params: impl Into<Vec<GenericParam>>) -> Self {
        self.type_params = type_params.into();
        self
    }

    #[inline]
    pub fn with_parameters(mut self, parameters: impl Into<Vec<Parameter>>) -> Self {
        self.parameters = parameters.into();
        self
    }

    #[inline]
    pub fn with_locals(mut self, locals: impl Into<Vec<TypeIndex>>) -> Self {
        self.locals = locals.into();
        self
    }

    #[inline]
    pub fn with_return_type(mut self, return_type: Option<TypeIndex>) -> Self {
        self.return_type = return_type;
        self
    }

    #[inline]
    pub fn with_code(mut self, code: Vec<Instr>) -> Self {
        self.body = code;
        self
    }

    #[inline]
    pub fn set_code(&mut self, code: Vec<Instr>) {
        self.body = code;
    }
}

impl From<Method> for Definition {
    #[inline]
    fn from(m: Method) -> Self {
        Definition::Method(Box::new(m))
    }
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct MethodFlags {
    pub is_static: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_final: bool,
    pub is_native: bool,
    #[bits(3)]
    __: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericParam {
    name: NameIndex,
    constraint: Option<TypeIndex>,
}

impl GenericParam {
    #[inline]
    pub fn new(name: NameIndex, constraint: Option<TypeIndex>) -> Self {
        Self { name, constraint }
    }

    #[inline]
    pub fn name(&self) -> NameIndex {
        self.name
    }

    #[inline]
    pub fn constraint(&self) -> Option<TypeIndex> {
        self.constraint
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter {
    name: NameIndex,
    type_: TypeIndex,
}

impl Parameter {
    #[inline]
    pub fn new(name: NameIndex, type_: TypeIndex) -> Self {
        Self { name, type_ }
    }

    #[inline]
    pub fn name(&self) -> NameIndex {
        self.name
    }

    #[inline]
    pub fn type_(&self) -> TypeIndex {
        self.type_
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Visibility::Public => 0,
            Visibility::Protected => 1,
            Visibility::Private => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Visibility::Public),
            1 => Some(Visibility::Protected),
            2 => Some(Visibility::Private),
            _ => None,
        }
    }
}

pub trait DefinitionIndex: Into<Definition> {
    type Index;
}

impl DefinitionIndex for Type {
    type Index = index::types::Type;
}

impl DefinitionIndex for Class {
    type Index = index::types::Class;
}

impl DefinitionIndex for Field {
    type Index = index::types::Field;
}

impl DefinitionIndex for Property {
    type Index = index::types::Property;
}

impl DefinitionIndex for Method {
    type Index = index::types::Method;
}
