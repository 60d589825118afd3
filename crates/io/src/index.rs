use std::hash::Hash;
use std::marker::PhantomData;
use std::num::NonZeroU32;
use std::{cmp, fmt};

pub type NameIndex = PoolIndex<types::Name>;
pub type StringIndex = PoolIndex<types::String>;

pub type TypeIndex = DefIndex<types::Type>;
pub type ClassIndex = DefIndex<types::Class>;
pub type FieldIndex = DefIndex<types::Field>;
pub type PropertyIndex = DefIndex<types::Property>;
pub type MethodIndex = DefIndex<types::Method>;

/// Index into one of the string pools of a module.
#[repr(transparent)]
pub struct PoolIndex<A>(u32, PhantomData<A>);

impl<A> PoolIndex<A> {
    #[inline]
    pub(crate) const fn new(index: u32) -> Self {
        PoolIndex(index, PhantomData)
    }
}

/// Index into the definition table of a module, zero is reserved for the undefined entry.
#[repr(transparent)]
pub struct DefIndex<A>(NonZeroU32, PhantomData<A>);

impl<A> DefIndex<A> {
    #[inline]
    pub(crate) const fn new(index: u32) -> Option<Self> {
        match NonZeroU32::new(index) {
            Some(index) => Some(DefIndex(index, PhantomData)),
            None => None,
        }
    }

    #[inline]
    pub(crate) fn position(self) -> usize {
        self.0.get() as usize
    }
}

macro_rules! impl_index_traits {
    ($ty:ident, $debug:literal, $get:expr) => {
        impl<A> fmt::Debug for $ty<A> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple($debug).field(&u32::from(*self)).finish()
            }
        }

        impl<A> Clone for $ty<A> {
            #[inline]
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<A> Copy for $ty<A> {}

        impl<A> PartialEq for $ty<A> {
            #[inline]
            fn eq(&self, other: &Self) -> bool {
                self.0 == other.0
            }
        }

        impl<A> Eq for $ty<A> {}

        impl<A> PartialOrd for $ty<A> {
            #[inline]
            fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl<A> Ord for $ty<A> {
            #[inline]
            fn cmp(&self, other: &Self) -> cmp::Ordering {
                self.0.cmp(&other.0)
            }
        }

        impl<A> Hash for $ty<A> {
            #[inline]
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                u32::from(*self).hash(state);
            }
        }

        impl<A> fmt::Display for $ty<A> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", u32::from(*self))
            }
        }

        impl<A> From<$ty<A>> for u32 {
            #[inline]
            fn from(index: $ty<A>) -> u32 {
                let get: fn($ty<A>) -> u32 = $get;
                get(index)
            }
        }
    };
}

impl_index_traits!(PoolIndex, "PoolIndex", |idx| idx.0);
impl_index_traits!(DefIndex, "DefIndex", |idx| idx.0.get());

pub mod types {
    #[derive(Debug, Default)]
    pub struct Name;
    #[derive(Debug, Default)]
    pub struct String;

    #[derive(Debug, Default)]
    pub struct Type;
    #[derive(Debug, Default)]
    pub struct Class;
    #[derive(Debug, Default)]
    pub struct Field;
    #[derive(Debug, Default)]
    pub struct Property;
    #[derive(Debug, Default)]
    pub struct Method;
}
