use nodewire_io::{
    ClassIndex, CodeBuilder, Instr, Invoke, Label, Method, MethodFlags, MethodIndex, Module,
    StringIndex, TypeIndex, Visibility,
};

use crate::Error;
use crate::helper::HelperHandle;
use crate::hierarchy::find_nearest_implementation;
use crate::validate::MemberTarget;

/// A validated member together with the path it resolves from.
#[derive(Debug, Clone)]
pub(crate) struct MemberPlan {
    pub name: String,
    pub path: String,
    pub type_: TypeIndex,
    pub target: MemberTarget,
}

#[derive(Debug, Clone)]
pub(crate) enum LifecyclePlan {
    /// The class implements the lifecycle method, its decoded body gets prefixed.
    Existing {
        method: MethodIndex,
        code: CodeBuilder,
    },
    /// The class gets a lifecycle method chaining to its nearest ancestor.
    /// A bodiless own declaration receives the body instead of a new method being added.
    Synthesized { declared: Option<MethodIndex> },
}

#[derive(Debug, Clone)]
pub(crate) struct ClassPlan {
    pub class: ClassIndex,
    pub name: String,
    /// Number of classes in the ancestry chain, the class included.
    pub depth: usize,
    pub members: Vec<MemberPlan>,
    pub lifecycle: LifecyclePlan,
}

pub(crate) fn weave_class(
    module: &mut Module,
    plan: ClassPlan,
    helper: HelperHandle,
    lifecycle_name: &str,
) -> Result<MethodIndex, Error> {
    let (method, mut code) = match plan.lifecycle {
        LifecyclePlan::Existing { method, code } => (method, code),
        LifecyclePlan::Synthesized { declared } => {
            // ancestors are woven first, so this sees their synthesized methods
            let base = match module[plan.class].base() {
                Some(base) => find_nearest_implementation(module, base, lifecycle_name)?,
                None => None,
            };
            let base = base.ok_or_else(|| Error::MissingBaseLifecycle {
                class: plan.name.clone(),
                method: lifecycle_name.to_owned(),
            })?;
            let method = match declared {
                Some(method) => method,
                None => synthesize_lifecycle(module, plan.class, lifecycle_name),
            };
            let mut code = CodeBuilder::new();
            code.emit(Instr::LoadArg(0));
            code.emit(Instr::Call(Invoke::new(base, [])));
            code.emit(Instr::Return);
            (method, code)
        }
    };

    let mut blocks = CodeBuilder::new();
    for member in &plan.members {
        emit_resolution(&mut blocks, module, helper, member);
    }
    code.prepend(blocks);
    module[method].set_code(code.into_code()?);

    log::debug!(
        "Wired {} members into {}::{}",
        plan.members.len(),
        plan.name,
        lifecycle_name
    );
    Ok(method)
}

fn synthesize_lifecycle(module: &mut Module, class: ClassIndex, name: &str) -> MethodIndex {
    let name = module.names_mut().add(name);
    let flags = MethodFlags::new()
        .with_is_virtual(true)
        .with_is_override(true);
    let method =
        module.define(Method::new(name, Visibility::Public, flags).with_class(Some(class)));
    module[class].add_method(method);
    method
}

/// `this.member = Helper.Resolve<T>(this, path, name)`
fn emit_resolution(
    code: &mut CodeBuilder,
    module: &mut Module,
    helper: HelperHandle,
    member: &MemberPlan,
) {
    let path = module.strings_mut().add(member.path.as_str());
    let name = module.strings_mut().add(member.name.as_str());
    for instr in resolution_block(helper, member, path, name) {
        code.emit(instr);
    }
}

fn resolution_block(
    helper: HelperHandle,
    member: &MemberPlan,
    path: StringIndex,
    name: StringIndex,
) -> [Instr<Label>; 6] {
    [
        Instr::LoadArg(0),
        Instr::LoadArg(0),
        Instr::StringConst(path),
        Instr::StringConst(name),
        Instr::Call(Invoke::new(helper.method, [member.type_])),
        match member.target {
            MemberTarget::Field(field) => Instr::StoreField(field),
            MemberTarget::Setter(setter) => Instr::CallVirtual(Invoke::new(setter, [])),
        },
    ]
}

/// Checks whether a decoded lifecycle body already starts with the blocks
/// an earlier pass emitted for these members.
pub(crate) fn is_already_wired(
    module: &Module,
    helper: HelperHandle,
    members: &[MemberPlan],
    code: &CodeBuilder,
) -> bool {
    let mut expected = Vec::with_capacity(members.len() * 6);
    for member in members {
        let strings = module.strings();
        let (Some(path), Some(name)) = (
            strings.get_index(&member.path),
            strings.get_index(&member.name),
        ) else {
            return false;
        };
        expected.extend(resolution_block(helper, member, path, name));
    }
    code.code().starts_with(&expected)
}
