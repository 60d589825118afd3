use nodewire_io::{ClassIndex, CodeBuilder, Module, TypeIndex};

mod diagnostic;
mod error;
mod helper;
pub mod hierarchy;
mod runtime;
pub mod scanner;
mod settings;
pub mod validate;
mod weave;

pub use diagnostic::{Diagnostic, Diagnostics};
pub use error::Error;
pub use helper::HelperHandle;
pub use nodewire_io as io;
pub use settings::WeaverSettings;

use crate::helper::{define_helper, find_helper};
use crate::hierarchy::{
    ancestors, find_nearest_implementation, is_subtype_or_self, own_method,
};
use crate::runtime::RuntimeApi;
use crate::scanner::scan_class;
use crate::validate::{validate_member, warn_duplicate_paths};
use crate::weave::{ClassPlan, LifecyclePlan, MemberPlan, is_already_wired, weave_class};

/// Wires every marked member of the module, see [`Weaver`].
pub fn transform(module: &mut Module, settings: &WeaverSettings) -> Result<ScanResult, Error> {
    Weaver::new(settings).run(module)
}

#[derive(Debug)]
pub struct ScanResult {
    pub found_mappings: bool,
    pub diagnostics: Diagnostics,
}

/// A single weaving pass over a module.
///
/// Every class is scanned, validated and planned before the module is touched,
/// and the changes are applied to a copy that replaces the module only once
/// all of them succeed. On error the module is left as it was.
#[derive(Debug)]
pub struct Weaver<'s> {
    settings: &'s WeaverSettings,
    helper: Option<HelperHandle>,
    diagnostics: Diagnostics,
}

impl<'s> Weaver<'s> {
    pub fn new(settings: &'s WeaverSettings) -> Self {
        Self {
            settings,
            helper: None,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn run(mut self, module: &mut Module) -> Result<ScanResult, Error> {
        let mut plans = self.plan(module)?;
        if plans.is_empty() {
            self.diagnostics.push(Diagnostic::NoMappingsFound);
            return Ok(ScanResult {
                found_mappings: false,
                diagnostics: self.diagnostics,
            });
        }

        let root = find_root(module, self.settings)?;
        let api = RuntimeApi::resolve(module, root, self.settings)?;

        let mut staged = module.clone();
        let classes = plans.len();
        plans.sort_by_key(|plan| plan.depth);
        let mut members = 0;
        for plan in plans {
            members += plan.members.len();
            let helper = self.ensure_helper(&mut staged, &api)?;
            weave_class(&mut staged, plan, helper, &self.settings.lifecycle_method)?;
        }
        *module = staged;

        log::info!("Wired {members} members in {classes} classes");
        Ok(ScanResult {
            found_mappings: true,
            diagnostics: self.diagnostics,
        })
    }

    fn ensure_helper(
        &mut self,
        module: &mut Module,
        api: &RuntimeApi,
    ) -> Result<HelperHandle, Error> {
        if let Some(helper) = self.helper {
            return Ok(helper);
        }
        let helper = match api.existing_helper {
            Some(helper) => {
                log::debug!("Reusing helper {}", self.settings.helper_class);
                helper
            }
            None => define_helper(module, api, self.settings)?,
        };
        self.helper = Some(helper);
        Ok(helper)
    }

    fn plan(&mut self, module: &Module) -> Result<Vec<ClassPlan>, Error> {
        let Some(marker) = module.names().get_index(&self.settings.marker_attribute) else {
            return Ok(vec![]);
        };
        let root = module.find_class(&self.settings.root_class);

        let mut plans = vec![];
        for (index, class) in module.classes() {
            if class.flags().is_import() {
                continue;
            }
            let marked = scan_class(module, class, marker);
            if marked.is_empty() {
                continue;
            }
            let name = class_name(module, index).to_owned();

            let in_hierarchy = match root {
                Some(root) => is_subtype_or_self(module, index, root)?,
                None => false,
            };
            let Some(root) = root.filter(|_| in_hierarchy) else {
                log::debug!("Skipping {name}, it is not part of the node hierarchy");
                self.diagnostics.push(Diagnostic::MarkerOutsideHierarchy {
                    class: name,
                    root: self.settings.root_class.clone(),
                });
                continue;
            };

            let members = marked
                .iter()
                .map(|member| -> Result<_, Error> {
                    Ok(MemberPlan {
                        name: member.name.to_owned(),
                        path: member.resolve_path(),
                        type_: member.type_,
                        target: validate_member(module, index, member, root)?,
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?;

            let lifecycle = self.plan_lifecycle(module, index, &name)?;
            if self.already_wired(module, &members, &lifecycle)? {
                log::debug!("Skipping {name}, its members are already wired");
                self.diagnostics.push(Diagnostic::AlreadyWired { class: name });
                continue;
            }

            let warnings = warn_duplicate_paths(
                &name,
                members.iter().map(|m| (m.name.as_str(), m.path.as_str())),
            );
            for warning in warnings {
                self.diagnostics.push(warning);
            }

            let depth = ancestors(module, index).count();
            log::debug!("Planned {} members for {name}", members.len());
            plans.push(ClassPlan {
                class: index,
                name,
                depth,
                members,
                lifecycle,
            });
        }
        Ok(plans)
    }

    /// A class woven by an earlier pass keeps its body as is.
    fn already_wired(
        &self,
        module: &Module,
        members: &[MemberPlan],
        lifecycle: &LifecyclePlan,
    ) -> Result<bool, Error> {
        let LifecyclePlan::Existing { code, .. } = lifecycle else {
            return Ok(false);
        };
        let Some(helper) = find_helper(module, self.settings)? else {
            return Ok(false);
        };
        Ok(is_already_wired(module, helper, members, code))
    }

    fn plan_lifecycle(
        &self,
        module: &Module,
        index: ClassIndex,
        name: &str,
    ) -> Result<LifecyclePlan, Error> {
        let lifecycle = &self.settings.lifecycle_method;
        let class = &module[index];
        let declared = module
            .names()
            .get_index(lifecycle)
            .and_then(|method| own_method(module, class, method, false));

        if let Some(method) = declared.filter(|&m| !module[m].body().is_empty()) {
            let code = CodeBuilder::from_code(module[method].body()).map_err(|source| {
                Error::InvalidMethodBody {
                    method: format!("{name}::{lifecycle}"),
                    source,
                }
            })?;
            return Ok(LifecyclePlan::Existing { method, code });
        }

        let base = match class.base() {
            Some(base) => find_nearest_implementation(module, base, lifecycle)?,
            None => None,
        };
        if base.is_none() {
            return Err(Error::MissingBaseLifecycle {
                class: name.to_owned(),
                method: lifecycle.clone(),
            });
        }
        Ok(LifecyclePlan::Synthesized { declared })
    }
}

fn find_root(module: &Module, settings: &WeaverSettings) -> Result<ClassIndex, Error> {
    module
        .find_class(&settings.root_class)
        .ok_or_else(|| Error::MissingRuntimeApi {
            what: "root class",
            name: settings.root_class.clone(),
        })
}

pub(crate) fn class_name(module: &Module, class: ClassIndex) -> &str {
    module
        .get_item(class)
        .and_then(|class| module.get_item(class.name()))
        .unwrap_or("<unknown>")
}

pub(crate) fn type_name(module: &Module, typ: TypeIndex) -> &str {
    module
        .get_item(typ)
        .and_then(|typ| module.get_item(typ.name()))
        .unwrap_or("<unknown>")
}
