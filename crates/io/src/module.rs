use std::marker::PhantomData;
use std::{fmt, ops};

use indexmap::IndexSet;

use crate::definition::{
    Class, Definition, DefinitionIndex, Field, IndexedDefinition, Method, Property, Type,
    TypeKind,
};
use crate::index::{
    self, ClassIndex, DefIndex, FieldIndex, MethodIndex, NameIndex, PoolIndex, PropertyIndex,
    StringIndex, TypeIndex,
};

/// A compiled module: two string pools and a definition table.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    names: StringPool<index::types::Name>,
    strings: StringPool<index::types::String>,
    definitions: Vec<Definition>,
}

impl Module {
    pub(crate) fn from_parts(
        names: StringPool<index::types::Name>,
        strings: StringPool<index::types::String>,
        definitions: Vec<Definition>,
    ) -> Self {
        Self {
            names,
            strings,
            definitions,
        }
    }

    #[inline]
    pub fn names(&self) -> &StringPool<index::types::Name> {
        &self.names
    }

    #[inline]
    pub fn names_mut(&mut self) -> &mut StringPool<index::types::Name> {
        &mut self.names
    }

    #[inline]
    pub fn strings(&self) -> &StringPool<index::types::String> {
        &self.strings
    }

    #[inline]
    pub fn strings_mut(&mut self) -> &mut StringPool<index::types::String> {
        &mut self.strings
    }

    #[inline]
    pub fn get_item<I>(&self, index: I) -> Option<&I::Output>
    where
        I: PoolItemIndex,
    {
        index.get(self)
    }

    #[inline]
    pub fn get_item_mut<I>(&mut self, index: I) -> Option<&mut I::Output>
    where
        I: PoolItemIndexMut,
    {
        index.get_mut(self)
    }

    /// Number of entries in the definition table, including the reserved one.
    #[inline]
    pub(crate) fn definition_count(&self) -> usize {
        self.definitions.len()
    }

    #[inline]
    pub fn definitions(&self) -> impl ExactSizeIterator<Item = &Definition> {
        self.definitions.iter().skip(1)
    }

    pub fn indexed_definitions(&self) -> impl Iterator<Item = IndexedDefinition<'_>> {
        self.definitions
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(index, def)| {
                let index = index as u32;
                let res = match def {
                    Definition::Type(val) => IndexedDefinition::Type(DefIndex::new(index)?, val),
                    Definition::Class(val) => {
                        IndexedDefinition::Class(DefIndex::new(index)?, val)
                    }
                    Definition::Field(val) => {
                        IndexedDefinition::Field(DefIndex::new(index)?, val)
                    }
                    Definition::Property(val) => {
                        IndexedDefinition::Property(DefIndex::new(index)?, val)
                    }
                    Definition::Method(val) => {
                        IndexedDefinition::Method(DefIndex::new(index)?, val)
                    }
                };
                Some(res)
            })
    }

    pub fn classes(&self) -> impl Iterator<Item = (ClassIndex, &Class)> {
        self.indexed_definitions().filter_map(|def| match def {
            IndexedDefinition::Class(idx, class) => Some((idx, class)),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = (MethodIndex, &Method)> {
        self.indexed_definitions().filter_map(|def| match def {
            IndexedDefinition::Method(idx, method) => Some((idx, method)),
            _ => None,
        })
    }

    /// Looks up a class by its fully qualified name.
    pub fn find_class(&self, name: &str) -> Option<ClassIndex> {
        let name = self.names.get_index(name)?;
        self.classes()
            .find(|(_, class)| class.name() == name)
            .map(|(idx, _)| idx)
    }

    /// Looks up the type entry that refers to the given class.
    pub fn find_class_type(&self, class: ClassIndex) -> Option<TypeIndex> {
        self.indexed_definitions().find_map(|def| match def {
            IndexedDefinition::Type(idx, typ) if typ.kind() == TypeKind::Class(class) => Some(idx),
            _ => None,
        })
    }

    /// Looks up a type entry by name.
    pub fn find_type(&self, name: &str) -> Option<TypeIndex> {
        let name = self.names.get_index(name)?;
        self.indexed_definitions().find_map(|def| match def {
            IndexedDefinition::Type(idx, typ) if typ.name() == name => Some(idx),
            _ => None,
        })
    }

    /// Returns the type entry referring to a class, defining it when missing.
    pub fn class_type(&mut self, class: ClassIndex) -> TypeIndex {
        if let Some(idx) = self.find_class_type(class) {
            return idx;
        }
        let name = self[class].name();
        self.define(Type::new(name, TypeKind::Class(class)))
    }

    #[inline]
    pub fn define<A>(&mut self, def: A) -> DefIndex<A::Index>
    where
        A: DefinitionIndex,
    {
        self.define_and_init(def, |_, _, def| def)
    }

    pub fn define_and_init<A>(
        &mut self,
        def: A,
        init: impl FnOnce(&mut Self, DefIndex<A::Index>, A) -> A,
    ) -> DefIndex<A::Index>
    where
        A: DefinitionIndex,
    {
        let pos = self.definitions.len();
        let index = u32::try_from(pos).expect("index overflow");
        let index = DefIndex::new(index).expect("definition index set to zero");
        self.definitions.push(Definition::UNDEFINED);
        self.definitions[pos] = init(self, index, def).into();
        index
    }
}

impl Default for Module {
    fn default() -> Self {
        Self {
            names: StringPool::new(),
            strings: StringPool::new(),
            definitions: vec![Definition::UNDEFINED],
        }
    }
}

pub trait PoolItemIndex {
    type Output: ?Sized;

    fn get(self, module: &Module) -> Option<&Self::Output>;
}

pub trait PoolItemIndexMut: PoolItemIndex {
    fn get_mut(self, module: &mut Module) -> Option<&mut Self::Output>;
}

impl PoolItemIndex for NameIndex {
    type Output = str;

    #[inline]
    fn get(self, module: &Module) -> Option<&Self::Output> {
        module.names.get(self)
    }
}

impl PoolItemIndex for StringIndex {
    type Output = str;

    #[inline]
    fn get(self, module: &Module) -> Option<&Self::Output> {
        module.strings.get(self)
    }
}

macro_rules! impl_def_item {
    ($idx:ty, $ty:ident) => {
        impl PoolItemIndex for $idx {
            type Output = $ty;

            #[inline]
            fn get(self, module: &Module) -> Option<&Self::Output> {
                match module.definitions.get(self.position()) {
                    Some(Definition::$ty(val)) => Some(val),
                    _ => None,
                }
            }
        }

        impl PoolItemIndexMut for $idx {
            #[inline]
            fn get_mut(self, module: &mut Module) -> Option<&mut Self::Output> {
                match module.definitions.get_mut(self.position()) {
                    Some(Definition::$ty(val)) => Some(val),
                    _ => None,
                }
            }
        }
    };
}

impl_def_item!(TypeIndex, Type);
impl_def_item!(ClassIndex, Class);
impl_def_item!(FieldIndex, Field);
impl_def_item!(PropertyIndex, Property);
impl_def_item!(MethodIndex, Method);

impl<I> ops::Index<I> for Module
where
    I: PoolItemIndex + fmt::Display + Copy,
{
    type Output = I::Output;

    fn index(&self, index: I) -> &Self::Output {
        match I::get(index, self) {
            Some(val) => val,
            None => panic!(
                "unresolved {} index: {index}",
                std::any::type_name::<I::Output>()
            ),
        }
    }
}

impl<I> ops::IndexMut<I> for Module
where
    I: PoolItemIndexMut + fmt::Display + Copy,
{
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        match I::get_mut(index, self) {
            Some(val) => val,
            None => panic!(
                "unresolved {} index: {index}",
                std::any::type_name::<I::Output>()
            ),
        }
    }
}

#[derive(Debug)]
pub struct StringPool<A> {
    strings: IndexSet<String, foldhash::fast::RandomState>,
    phantom: PhantomData<PoolIndex<A>>,
}

impl<A> Clone for StringPool<A> {
    fn clone(&self) -> Self {
        StringPool {
            strings: self.strings.clone(),
            phantom: PhantomData,
        }
    }
}

impl<A> StringPool<A> {
    pub(crate) fn new() -> Self {
        StringPool {
            strings: IndexSet::default(),
            phantom: PhantomData,
        }
    }

    #[inline]
    pub fn add(&mut self, string: impl Into<String>) -> PoolIndex<A> {
        let (index, _) = self.strings.insert_full(string.into());
        PoolIndex::new(index as _)
    }

    /// Appends a string read from a serialized pool, returns false on a duplicate entry.
    pub(crate) fn push_unique(&mut self, string: String) -> bool {
        self.strings.insert(string)
    }

    #[inline]
    pub fn get(&self, index: PoolIndex<A>) -> Option<&str> {
        self.strings
            .get_index(u32::from(index) as _)
            .map(String::as_str)
    }

    #[inline]
    pub fn get_index(&self, str: &str) -> Option<PoolIndex<A>> {
        self.strings
            .get_full(str)
            .map(|(index, _)| PoolIndex::new(index as _))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}

impl<A> PartialEq for StringPool<A> {
    fn eq(&self, other: &Self) -> bool {
        self.strings.iter().eq(other.strings.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ClassFlags, Visibility};

    #[test]
    fn pools_deduplicate() {
        let mut module = Module::default();
        let a = module.names_mut().add("Godot.Node");
        let b = module.names_mut().add("Godot.Node");
        assert_eq!(a, b);
        assert_eq!(&module[a], "Godot.Node");
        assert_eq!(module.names().len(), 1);
    }

    #[test]
    fn typed_lookup_rejects_wrong_kind() {
        let mut module = Module::default();
        let name = module.names_mut().add("Game.Player");
        let class = module.define(Class::new(name, Visibility::Public, ClassFlags::new()));
        let typ = module.class_type(class);

        assert!(module.get_item(class).is_some());
        assert!(module.get_item(typ).is_some());
        let wrong = MethodIndex::new(u32::from(class)).unwrap();
        assert!(module.get_item(wrong).is_none());
        assert_eq!(module.class_type(class), typ);
        assert_eq!(module.find_class("Game.Player"), Some(class));
        assert_eq!(module.find_class("Game.Enemy"), None);
    }
}
