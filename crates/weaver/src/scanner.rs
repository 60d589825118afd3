use nodewire_io::{Attribute, Class, FieldIndex, Module, NameIndex, PropertyIndex, TypeIndex};

/// A member of a class carrying the marker attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedMember<'m> {
    pub member: MemberRef,
    pub name: &'m str,
    pub type_: TypeIndex,
    /// The path given to the marker, if any.
    pub explicit_path: Option<&'m str>,
}

impl MarkedMember<'_> {
    /// The path the member is resolved from.
    pub fn resolve_path(&self) -> String {
        resolve_path(self.explicit_path, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRef {
    Field(FieldIndex),
    Property(PropertyIndex),
}

/// Collects the own members of a class carrying the marker.
/// All fields come first, then all properties, with no interleaving across the
/// two kinds. Each kind keeps its declaration order.
pub fn scan_class<'m>(
    module: &'m Module,
    class: &Class,
    marker: NameIndex,
) -> Vec<MarkedMember<'m>> {
    let fields = class.fields().iter().filter_map(|&idx| {
        let field = module.get_item(idx)?;
        let attr = find_marker(field.attributes(), marker)?;
        Some(MarkedMember {
            member: MemberRef::Field(idx),
            name: module.get_item(field.name())?,
            type_: field.type_(),
            explicit_path: attr.value(),
        })
    });
    let properties = class.properties().iter().filter_map(|&idx| {
        let prop = module.get_item(idx)?;
        let attr = find_marker(prop.attributes(), marker)?;
        Some(MarkedMember {
            member: MemberRef::Property(idx),
            name: module.get_item(prop.name())?,
            type_: prop.type_(),
            explicit_path: attr.value(),
        })
    });
    fields.chain(properties).collect()
}

fn find_marker(attributes: &[Attribute], marker: NameIndex) -> Option<&Attribute> {
    attributes.iter().find(|attr| attr.name() == marker)
}

/// Derives a node path from a member name: `_health` becomes `%Health`.
pub fn derive_path(name: &str) -> String {
    let name = name.trim_start_matches('_');
    let mut chars = name.chars();
    let mut path = String::with_capacity(name.len() + 1);
    path.push('%');
    if let Some(first) = chars.next() {
        path.extend(first.to_uppercase());
        path.push_str(chars.as_str());
    }
    path
}

/// An empty explicit path counts as no path.
pub fn resolve_path(explicit: Option<&str>, name: &str) -> String {
    match explicit {
        Some(path) if !path.is_empty() => path.to_owned(),
        _ => derive_path(name),
    }
}
