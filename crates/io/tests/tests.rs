use nodewire_io::{
    Attribute, Class, ClassFlags, CodeBuilder, Definition, Field, FieldFlags, Instr, Invoke,
    Method, MethodFlags, Module, Offset, Parameter, Property, Type, TypeKind, Visibility,
};

#[test]
fn roundtrip_def() {
    let mut module = Module::default();
    let name = module.names_mut().add("System.String");
    let typ = Type::new(name, TypeKind::Primitive);
    let idx = module.define(typ.clone());

    assert_eq!(module[idx], typ);
}

#[test]
fn roundtrip_encode() {
    let mut module = Module::default();
    let node = module.names_mut().add("Godot.Node");
    let player = module.names_mut().add("Game.Player");
    let marker = module.names_mut().add("NodeWire.NodeAttribute");
    let health = module.names_mut().add("_health");
    let label = module.names_mut().add("label");
    let set_label = module.names_mut().add("set_label");
    let value = module.names_mut().add("value");
    let greeting = module.strings_mut().add("hello");

    let node_class = module.define(Class::new(
        node,
        Visibility::Public,
        ClassFlags::new().with_is_import(true),
    ));
    let node_type = module.class_type(node_class);

    let player_class = module.define(Class::new(player, Visibility::Public, ClassFlags::new()));
    let field = module.define(
        Field::new(
            health,
            player_class,
            Visibility::Private,
            node_type,
            FieldFlags::new(),
        )
        .with_attributes([Attribute::new(marker, None)]),
    );
    let setter = module.define_and_init(
        Method::new(set_label, Visibility::Public, MethodFlags::new())
            .with_class(Some(player_class))
            .with_parameters([Parameter::new(value, node_type)]),
        |_, this, method| {
            method.with_code(vec![
                Instr::LoadArgShort(0),
                Instr::LoadArgShort(1),
                Instr::StoreField(field),
                Instr::JumpShort(Offset::from(2)),
                Instr::StringConst(greeting),
                Instr::CallVirtual(Invoke::new(this, [node_type])),
                Instr::Return,
            ])
        },
    );
    let property = module.define(
        Property::new(label, player_class, node_type)
            .with_setter(Some(setter))
            .with_attributes([Attribute::new(marker, Some("UI/Label".to_owned()))]),
    );
    module[player_class] = Class::new(player, Visibility::Public, ClassFlags::new())
        .with_base(Some(node_class))
        .with_fields([field])
        .with_properties([property])
        .with_methods([setter]);

    let bytes = module.to_bytes().unwrap();
    let decoded = Module::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, module);
    assert_eq!(decoded.find_class("Game.Player"), Some(player_class));
}

#[test]
fn rejects_dangling_references() {
    let mut other = Module::default();
    let name = other.names_mut().add("Other");
    other.define(Type::new(name, TypeKind::Primitive));
    let foreign = other.define(Method::new(name, Visibility::Public, MethodFlags::new()));

    let mut module = Module::default();
    let name = module.names_mut().add("Game.Player");
    module.define(
        Class::new(name, Visibility::Public, ClassFlags::new()).with_methods([foreign]),
    );

    let bytes = module.to_bytes().unwrap();
    assert!(Module::from_bytes(&bytes).is_err());
}

#[test]
fn assembled_code_uses_relative_offsets() {
    let mut builder = CodeBuilder::new();
    let skip = builder.new_label();
    builder.emit(Instr::LoadArg(1));
    builder.emit(Instr::JumpIfFalse(skip));
    builder.emit(Instr::Null);
    builder.emit(Instr::Throw);
    builder.mark_label(skip);
    builder.emit(Instr::Return);

    let code = builder.into_code().unwrap();
    let listing = code.iter().map(ToString::to_string).collect::<Vec<_>>();
    assert_eq!(
        listing,
        [
            "arg.load.s 1",
            "jump.if_not.s 4",
            "ref.null",
            "throw",
            "return"
        ]
    );
}

#[test]
fn definitions_skip_reserved_entry() {
    let mut module = Module::default();
    let name = module.names_mut().add("System.String");
    module.define(Type::new(name, TypeKind::Primitive));

    let defs = module.definitions().cloned().collect::<Vec<_>>();
    assert_eq!(
        &defs,
        &[Definition::Type(Type::new(name, TypeKind::Primitive))]
    );
}
