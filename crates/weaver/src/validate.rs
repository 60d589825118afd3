use indexmap::IndexMap;
use nodewire_io::{ClassIndex, FieldIndex, MethodIndex, Module};

use crate::diagnostic::Diagnostic;
use crate::hierarchy::is_type_subtype_or_self;
use crate::scanner::{MarkedMember, MemberRef};
use crate::{Error, class_name, type_name};

/// How a resolved node gets stored into a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberTarget {
    Field(FieldIndex),
    Setter(MethodIndex),
}

/// Checks that a marked member can hold a node of the hierarchy and can be assigned.
pub fn validate_member(
    module: &Module,
    owner: ClassIndex,
    member: &MarkedMember<'_>,
    required_base: ClassIndex,
) -> Result<MemberTarget, Error> {
    let qualified = || format!("{}::{}", class_name(module, owner), member.name);

    if !is_type_subtype_or_self(module, member.type_, required_base)? {
        return Err(Error::InvalidMemberType {
            member: qualified(),
            type_name: type_name(module, member.type_).to_owned(),
            base: class_name(module, required_base).to_owned(),
        });
    }

    match member.member {
        MemberRef::Field(idx) => {
            if module.get_item(idx).is_some_and(|f| f.flags().is_static()) {
                return Err(Error::StaticMember { member: qualified() });
            }
            Ok(MemberTarget::Field(idx))
        }
        MemberRef::Property(idx) => module
            .get_item(idx)
            .and_then(|prop| prop.setter())
            .map(MemberTarget::Setter)
            .ok_or_else(|| Error::MissingSetter { member: qualified() }),
    }
}

/// Reports every path that more than one member of the class resolves from.
pub fn warn_duplicate_paths<'a>(
    class: &str,
    members: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Vec<Diagnostic> {
    let mut by_path: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for (name, path) in members {
        by_path.entry(path).or_default().push(name);
    }
    by_path
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|(path, names)| Diagnostic::DuplicatePath {
            class: class.to_owned(),
            path: path.to_owned(),
            members: names.into_iter().map(str::to_owned).collect(),
        })
        .collect()
}
