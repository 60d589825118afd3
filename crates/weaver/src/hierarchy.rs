use hashbrown::HashSet;
use nodewire_io::{Class, ClassIndex, MethodIndex, Module, NameIndex, TypeIndex, TypeKind};

use crate::{Error, class_name};

/// Upper bound on the length of an ancestry chain.
pub const MAX_HIERARCHY_DEPTH: usize = 256;

/// Iterates over a class and its ancestors, nearest first.
///
/// Yields an error and stops when the chain revisits a class, exceeds
/// [`MAX_HIERARCHY_DEPTH`] or refers to something that is not a class.
pub struct Ancestors<'m> {
    module: &'m Module,
    origin: ClassIndex,
    next: Option<ClassIndex>,
    visited: HashSet<ClassIndex>,
}

impl<'m> Iterator for Ancestors<'m> {
    type Item = Result<(ClassIndex, &'m Class), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next.take()?;
        let class = self.module.get_item(index);
        match class {
            Some(class)
                if self.visited.len() < MAX_HIERARCHY_DEPTH && self.visited.insert(index) =>
            {
                self.next = class.base();
                Some(Ok((index, class)))
            }
            _ => Some(Err(Error::InvalidHierarchy {
                class: class_name(self.module, self.origin).to_owned(),
            })),
        }
    }
}

pub fn ancestors(module: &Module, class: ClassIndex) -> Ancestors<'_> {
    Ancestors {
        module,
        origin: class,
        next: Some(class),
        visited: HashSet::new(),
    }
}

pub fn is_subtype_or_self(
    module: &Module,
    class: ClassIndex,
    base: ClassIndex,
) -> Result<bool, Error> {
    for entry in ancestors(module, class) {
        if entry?.0 == base {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Only class types can derive from a class.
pub fn is_type_subtype_or_self(
    module: &Module,
    typ: TypeIndex,
    base: ClassIndex,
) -> Result<bool, Error> {
    match module.get_item(typ).map(|typ| typ.kind()) {
        Some(TypeKind::Class(class)) => is_subtype_or_self(module, class, base),
        _ => Ok(false),
    }
}

/// Finds the first own method named `name` with a body, starting at `class` itself.
pub fn find_nearest_implementation(
    module: &Module,
    class: ClassIndex,
    name: &str,
) -> Result<Option<MethodIndex>, Error> {
    find_method(module, class, name, true)
}

/// Like [`find_nearest_implementation`], but also accepts methods without a body.
pub fn find_nearest_declaration(
    module: &Module,
    class: ClassIndex,
    name: &str,
) -> Result<Option<MethodIndex>, Error> {
    find_method(module, class, name, false)
}

fn find_method(
    module: &Module,
    class: ClassIndex,
    name: &str,
    require_body: bool,
) -> Result<Option<MethodIndex>, Error> {
    let Some(name) = module.names().get_index(name) else {
        return Ok(None);
    };
    for entry in ancestors(module, class) {
        let (_, class) = entry?;
        if let Some(method) = own_method(module, class, name, require_body) {
            return Ok(Some(method));
        }
    }
    Ok(None)
}

pub(crate) fn own_method(
    module: &Module,
    class: &Class,
    name: NameIndex,
    require_body: bool,
) -> Option<MethodIndex> {
    class.methods().iter().copied().find(|&idx| {
        module.get_item(idx).is_some_and(|m| {
            m.name() == name && !m.flags().is_static() && (!require_body || m.has_body())
        })
    })
}
