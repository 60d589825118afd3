use nodewire_io::{
    Class, ClassFlags, ClassIndex, CodeBuilder, GenericParam, Instr, Invoke, Method, MethodFlags,
    MethodIndex, Module, Parameter, Type, TypeIndex, TypeKind, Visibility,
};

use crate::runtime::RuntimeApi;
use crate::{Error, WeaverSettings};

/// The module-wide class holding the generic resolution method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelperHandle {
    pub class: ClassIndex,
    pub method: MethodIndex,
}

/// Looks for a helper added by an earlier pass over the same module.
pub(crate) fn find_helper(
    module: &Module,
    settings: &WeaverSettings,
) -> Result<Option<HelperHandle>, Error> {
    let Some(class) = module.find_class(&settings.helper_class) else {
        return Ok(None);
    };
    let method = module
        .names()
        .get_index(&settings.helper_method)
        .and_then(|name| {
            module[class].methods().iter().copied().find(|&idx| {
                module
                    .get_item(idx)
                    .is_some_and(|m| m.name() == name && m.flags().is_static())
            })
        })
        .ok_or_else(|| Error::InvalidHelper {
            class: settings.helper_class.clone(),
            method: settings.helper_method.clone(),
        })?;
    Ok(Some(HelperHandle { class, method }))
}

/// Adds the sealed abstract helper class and its `Resolve<T>(root, path, memberName)` method.
pub(crate) fn define_helper(
    module: &mut Module,
    api: &RuntimeApi,
    settings: &WeaverSettings,
) -> Result<HelperHandle, Error> {
    let root_type = module.class_type(api.root);
    let class_name = module.names_mut().add(settings.helper_class.as_str());
    let flags = ClassFlags::new().with_is_abstract(true).with_is_sealed(true);
    let class = module.define(Class::new(class_name, Visibility::Public, flags));

    let param_name = module.names_mut().add("T");
    let param_type = module.define(Type::new(param_name, TypeKind::MethodParam(0)));
    let parameters = [
        Parameter::new(module.names_mut().add("root"), root_type),
        Parameter::new(module.names_mut().add("path"), api.string_type),
        Parameter::new(module.names_mut().add("memberName"), api.string_type),
    ];
    let code = resolve_body(module, api, param_type, &settings.message_namespace)?;

    let method_name = module.names_mut().add(settings.helper_method.as_str());
    let method = module.define(
        Method::new(
            method_name,
            Visibility::Public,
            MethodFlags::new().with_is_static(true),
        )
        .with_class(Some(class))
        .with_type_params([GenericParam::new(param_name, Some(root_type))])
        .with_parameters(parameters)
        .with_locals([root_type])
        .with_return_type(Some(param_type))
        .with_code(code),
    );
    module[class].add_method(method);

    log::debug!("Added helper {}", settings.helper_class);
    Ok(HelperHandle { class, method })
}

const ROOT: u16 = 0;
const PATH: u16 = 1;
const MEMBER_NAME: u16 = 2;
const NODE: u16 = 0;

fn resolve_body(
    module: &mut Module,
    api: &RuntimeApi,
    param_type: TypeIndex,
    namespace: &str,
) -> Result<Vec<Instr>, Error> {
    let head = format!("{namespace}: Node '");
    let mut code = CodeBuilder::new();
    let found = code.new_label();
    let matched = code.new_label();

    code.emit(Instr::LoadArg(ROOT));
    code.emit(Instr::LoadArg(PATH));
    code.emit(Instr::CallVirtual(Invoke::new(api.lookup, [])));
    code.emit(Instr::StoreLocal(NODE));
    code.emit(Instr::LoadLocal(NODE));
    code.emit(Instr::JumpIfTrue(found));
    emit_throw(
        &mut code,
        module,
        api,
        [head.as_str(), "' was not found for member '", "'"],
    );

    code.mark_label(found);
    code.emit(Instr::LoadLocal(NODE));
    code.emit(Instr::IsInstance(param_type));
    code.emit(Instr::JumpIfTrue(matched));
    emit_throw(
        &mut code,
        module,
        api,
        [
            head.as_str(),
            "' did not match the type of member '",
            "' when instanced",
        ],
    );

    code.mark_label(matched);
    code.emit(Instr::LoadLocal(NODE));
    code.emit(Instr::Cast(param_type));
    code.emit(Instr::Return);

    Ok(code.into_code()?)
}

/// Throws `fragments[0] + path + fragments[1] + memberName + fragments[2]`.
fn emit_throw(
    code: &mut CodeBuilder,
    module: &mut Module,
    api: &RuntimeApi,
    fragments: [&str; 3],
) {
    let [head, middle, tail] = fragments.map(|str| module.strings_mut().add(str));
    code.emit(Instr::StringConst(head));
    code.emit(Instr::LoadArg(PATH));
    code.emit(Instr::StringConst(middle));
    code.emit(Instr::LoadArg(MEMBER_NAME));
    code.emit(Instr::StringConst(tail));
    code.emit(Instr::Concat(5));
    code.emit(Instr::New {
        class: api.exception,
        arg_count: 1,
    });
    code.emit(Instr::Throw);
}
