use nodewire_io::{ClassIndex, MethodIndex, Module, TypeIndex};

use crate::helper::{HelperHandle, find_helper};
use crate::hierarchy::find_nearest_declaration;
use crate::{Error, WeaverSettings};

/// Everything generated code refers to outside of the woven classes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RuntimeApi {
    pub root: ClassIndex,
    pub string_type: TypeIndex,
    pub lookup: MethodIndex,
    pub exception: ClassIndex,
    pub existing_helper: Option<HelperHandle>,
}

impl RuntimeApi {
    pub fn resolve(
        module: &Module,
        root: ClassIndex,
        settings: &WeaverSettings,
    ) -> Result<Self, Error> {
        let missing = |what, name: &str| Error::MissingRuntimeApi {
            what,
            name: name.to_owned(),
        };

        let string_type = module
            .find_type(&settings.string_type)
            .ok_or_else(|| missing("string type", &settings.string_type))?;
        let lookup = find_nearest_declaration(module, root, &settings.lookup_method)?
            .ok_or_else(|| missing("lookup method", &settings.lookup_method))?;
        let exception = module
            .find_class(&settings.exception_class)
            .ok_or_else(|| missing("exception class", &settings.exception_class))?;
        let existing_helper = find_helper(module, settings)?;

        Ok(Self {
            root,
            string_type,
            lookup,
            exception,
            existing_helper,
        })
    }
}
