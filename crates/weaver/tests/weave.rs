use nodewire_weaver::io::{
    Attribute, Class, ClassFlags, ClassIndex, Field, FieldFlags, FieldIndex, Instr, Invoke,
    Listing, Method, MethodFlags, MethodIndex, Module, NameIndex, Offset, Parameter, Property,
    Type, TypeIndex, TypeKind, Visibility,
};
use nodewire_weaver::{Diagnostic, Error, WeaverSettings, transform};

#[test]
fn wires_fields_and_properties() {
    let mut fixture = Fixture::new();
    let player = fixture.class("Game.Player", Some(fixture.node));
    fixture.marked_field(player, "_health", fixture.node_type, None);
    fixture.marked_property(player, "label", fixture.label_type, Some("UI/Label"), true);

    let result = transform(&mut fixture.module, &WeaverSettings::default()).unwrap();
    assert!(result.found_mappings);
    assert!(result.diagnostics.is_empty());

    insta::assert_snapshot!(
        "synthesized_lifecycle",
        fixture.listing("Game.Player", "_Ready")
    );
    insta::assert_snapshot!(
        "resolve_helper",
        fixture.listing("NodeWire.Generated.NodeResolver", "Resolve")
    );
}

#[test]
fn prepends_to_existing_lifecycle() {
    let mut fixture = Fixture::new();
    let enemy = fixture.class("Game.Enemy", Some(fixture.node));
    fixture.marked_field(enemy, "_target", fixture.node_type, None);
    let body = vec![
        Instr::Null,
        Instr::JumpIfTrueShort(Offset::from(3)),
        Instr::Nop,
        Instr::Return,
    ];
    let ready = fixture.method(enemy, "_Ready", MethodFlags::new(), body.clone());

    transform(&mut fixture.module, &WeaverSettings::default()).unwrap();

    let module = &fixture.module;
    assert_eq!(module[enemy].methods(), &[ready]);
    let woven = module[ready].body();
    assert_eq!(woven.len(), 10);
    assert_eq!(
        woven[2],
        Instr::StringConst(module.strings().get_index("%Target").unwrap())
    );
    assert_eq!(&woven[6..], &body[..]);
}

#[test]
fn fills_bodiless_lifecycle_declaration() {
    let mut fixture = Fixture::new();
    let player = fixture.class("Game.Player", Some(fixture.node));
    fixture.marked_field(player, "_health", fixture.node_type, None);
    let declared = fixture.method(
        player,
        "_Ready",
        MethodFlags::new().with_is_virtual(true),
        vec![],
    );

    transform(&mut fixture.module, &WeaverSettings::default()).unwrap();

    let module = &fixture.module;
    assert_eq!(module[player].methods(), &[declared]);
    assert_eq!(
        &module[declared].body()[6..],
        &[
            Instr::LoadArgShort(0),
            Instr::Call(Invoke::new(fixture.node_ready, [])),
            Instr::Return,
        ]
    );
}

#[test]
fn derived_classes_chain_to_woven_ancestors() {
    let mut fixture = Fixture::new();
    // declared before its base
    let hero = fixture.class("Game.Hero", None);
    let player = fixture.class("Game.Player", Some(fixture.node));
    fixture.module[hero] = fixture.module[hero].clone().with_base(Some(player));
    fixture.marked_field(hero, "_sword", fixture.node_type, None);
    fixture.marked_field(player, "_health", fixture.node_type, None);

    transform(&mut fixture.module, &WeaverSettings::default()).unwrap();

    let player_ready = fixture.method_of("Game.Player", "_Ready");
    let hero_ready = fixture.method_of("Game.Hero", "_Ready");
    let module = &fixture.module;
    assert_eq!(
        module[hero_ready].body()[7],
        Instr::Call(Invoke::new(player_ready, []))
    );
    assert_eq!(
        module[player_ready].body()[7],
        Instr::Call(Invoke::new(fixture.node_ready, []))
    );
}

#[test]
fn helper_is_shared_between_classes_and_passes() {
    let mut fixture = Fixture::new();
    let player = fixture.class("Game.Player", Some(fixture.node));
    fixture.marked_field(player, "_health", fixture.node_type, None);
    let enemy = fixture.class("Game.Enemy", Some(fixture.node));
    fixture.marked_field(enemy, "_target", fixture.node_type, None);

    transform(&mut fixture.module, &WeaverSettings::default()).unwrap();
    assert_eq!(fixture.helper_count(), 1);

    let helper = fixture.method_of("NodeWire.Generated.NodeResolver", "Resolve");
    let call = Instr::Call(Invoke::new(helper, [fixture.node_type]));
    for class in ["Game.Player", "Game.Enemy"] {
        let ready = fixture.method_of(class, "_Ready");
        assert_eq!(fixture.module[ready].body()[4], call);
    }

    let bodies = ["Game.Player", "Game.Enemy"].map(|class| {
        let ready = fixture.method_of(class, "_Ready");
        fixture.module[ready].body().to_vec()
    });

    let boss = fixture.class("Game.Boss", Some(fixture.node));
    fixture.marked_field(boss, "_minion", fixture.node_type, None);
    transform(&mut fixture.module, &WeaverSettings::default()).unwrap();
    assert_eq!(fixture.helper_count(), 1);

    let ready = fixture.method_of("Game.Boss", "_Ready");
    assert_eq!(fixture.module[ready].body()[4], call);
    for (class, body) in ["Game.Player", "Game.Enemy"].iter().zip(&bodies) {
        let ready = fixture.method_of(class, "_Ready");
        assert_eq!(fixture.module[ready].body(), &body[..]);
    }
}

#[test]
fn second_pass_leaves_wired_classes_unchanged() {
    let mut fixture = Fixture::new();
    let player = fixture.class("Game.Player", Some(fixture.node));
    fixture.marked_field(player, "_health", fixture.node_type, None);
    fixture.marked_property(player, "label", fixture.label_type, Some("UI/Label"), true);

    transform(&mut fixture.module, &WeaverSettings::default()).unwrap();
    let listing = fixture.listing("Game.Player", "_Ready");
    let before = fixture.module.clone();

    let result = transform(&mut fixture.module, &WeaverSettings::default()).unwrap();
    assert!(!result.found_mappings);
    assert_eq!(
        result.diagnostics.into_iter().collect::<Vec<_>>(),
        vec![
            Diagnostic::AlreadyWired {
                class: "Game.Player".into()
            },
            Diagnostic::NoMappingsFound,
        ]
    );
    assert_eq!(fixture.listing("Game.Player", "_Ready"), listing);
    assert_eq!(fixture.module, before);
}

#[test]
fn second_pass_wires_existing_lifecycle_once() {
    let mut fixture = Fixture::new();
    let enemy = fixture.class("Game.Enemy", Some(fixture.node));
    fixture.marked_field(enemy, "_target", fixture.node_type, None);
    let ready = fixture.method(enemy, "_Ready", MethodFlags::new(), vec![Instr::Return]);

    transform(&mut fixture.module, &WeaverSettings::default()).unwrap();
    let body = fixture.module[ready].body().to_vec();
    assert_eq!(body.len(), 7);

    transform(&mut fixture.module, &WeaverSettings::default()).unwrap();
    assert_eq!(fixture.module[ready].body(), &body[..]);
}

#[test]
fn warns_about_duplicate_paths() {
    let mut fixture = Fixture::new();
    let player = fixture.class("Game.Player", Some(fixture.node));
    fixture.marked_field(player, "_health", fixture.node_type, None);
    fixture.marked_field(player, "health", fixture.node_type, None);
    fixture.marked_field(player, "label", fixture.label_type, Some("UI/Label"));

    let result = transform(&mut fixture.module, &WeaverSettings::default()).unwrap();
    assert!(result.found_mappings);
    assert_eq!(
        result.diagnostics.into_iter().collect::<Vec<_>>(),
        vec![Diagnostic::DuplicatePath {
            class: "Game.Player".into(),
            path: "%Health".into(),
            members: vec!["_health".into(), "health".into()],
        }]
    );
}

#[test]
fn rejects_members_outside_node_hierarchy() {
    let mut fixture = Fixture::new();
    let player = fixture.class("Game.Player", Some(fixture.node));
    fixture.marked_field(player, "_health", fixture.node_type, None);
    fixture.marked_field(player, "_name", fixture.string_type, None);
    let before = fixture.module.clone();

    let err = transform(&mut fixture.module, &WeaverSettings::default()).unwrap_err();
    assert_eq!(
        err,
        Error::InvalidMemberType {
            member: "Game.Player::_name".into(),
            type_name: "System.String".into(),
            base: "Godot.Node".into(),
        }
    );
    assert_eq!(fixture.module, before);
}

#[test]
fn rejects_properties_without_setter() {
    let mut fixture = Fixture::new();
    let player = fixture.class("Game.Player", Some(fixture.node));
    fixture.marked_property(player, "label", fixture.label_type, None, false);
    let before = fixture.module.clone();

    let err = transform(&mut fixture.module, &WeaverSettings::default()).unwrap_err();
    assert_eq!(
        err,
        Error::MissingSetter {
            member: "Game.Player::label".into()
        }
    );
    assert_eq!(fixture.module, before);
}

#[test]
fn rejects_static_fields() {
    let mut fixture = Fixture::new();
    let player = fixture.class("Game.Player", Some(fixture.node));
    let marker = fixture.marker;
    let name = fixture.module.names_mut().add("_shared");
    let field = fixture.module.define(
        Field::new(
            name,
            player,
            Visibility::Private,
            fixture.node_type,
            FieldFlags::new().with_is_static(true),
        )
        .with_attributes([Attribute::new(marker, None)]),
    );
    fixture.module[player].add_field(field);
    let before = fixture.module.clone();

    let err = transform(&mut fixture.module, &WeaverSettings::default()).unwrap_err();
    assert_eq!(
        err,
        Error::StaticMember {
            member: "Game.Player::_shared".into()
        }
    );
    assert_eq!(fixture.module, before);
}

#[test]
fn fails_without_base_lifecycle() {
    let mut fixture = Fixture::new();
    let player = fixture.class("Game.Player", Some(fixture.node));
    fixture.marked_field(player, "_health", fixture.node_type, None);
    let before = fixture.module.clone();

    let settings = WeaverSettings {
        lifecycle_method: "_EnterTree".into(),
        ..Default::default()
    };
    let err = transform(&mut fixture.module, &settings).unwrap_err();
    assert_eq!(
        err,
        Error::MissingBaseLifecycle {
            class: "Game.Player".into(),
            method: "_EnterTree".into(),
        }
    );
    assert_eq!(fixture.module, before);
}

#[test]
fn fails_without_runtime_api() {
    let mut fixture = Fixture::new();
    let player = fixture.class("Game.Player", Some(fixture.node));
    fixture.marked_field(player, "_health", fixture.node_type, None);
    let before = fixture.module.clone();

    let settings = WeaverSettings {
        exception_class: "System.InvalidOperationException".into(),
        ..Default::default()
    };
    let err = transform(&mut fixture.module, &settings).unwrap_err();
    assert_eq!(
        err,
        Error::MissingRuntimeApi {
            what: "exception class",
            name: "System.InvalidOperationException".into(),
        }
    );
    assert_eq!(fixture.module, before);
}

#[test]
fn reports_when_nothing_is_marked() {
    let mut fixture = Fixture::new();
    fixture.class("Game.Player", Some(fixture.node));
    let before = fixture.module.clone();

    let result = transform(&mut fixture.module, &WeaverSettings::default()).unwrap();
    assert!(!result.found_mappings);
    assert_eq!(
        result.diagnostics.into_iter().collect::<Vec<_>>(),
        vec![Diagnostic::NoMappingsFound]
    );
    assert_eq!(fixture.module, before);
}

#[test]
fn ignores_markers_outside_hierarchy() {
    let mut fixture = Fixture::new();
    let save = fixture.class("Game.SaveData", None);
    fixture.marked_field(save, "_slot", fixture.node_type, None);
    let before = fixture.module.clone();

    let result = transform(&mut fixture.module, &WeaverSettings::default()).unwrap();
    assert!(!result.found_mappings);
    assert_eq!(
        result.diagnostics.into_iter().collect::<Vec<_>>(),
        vec![
            Diagnostic::MarkerOutsideHierarchy {
                class: "Game.SaveData".into(),
                root: "Godot.Node".into(),
            },
            Diagnostic::NoMappingsFound,
        ]
    );
    assert_eq!(fixture.module, before);
}

#[test]
fn woven_module_survives_encoding() {
    let mut fixture = Fixture::new();
    let player = fixture.class("Game.Player", Some(fixture.node));
    fixture.marked_field(player, "_health", fixture.node_type, None);
    fixture.marked_property(player, "label", fixture.label_type, Some("UI/Label"), true);
    transform(&mut fixture.module, &WeaverSettings::default()).unwrap();

    let bytes = fixture.module.to_bytes().unwrap();
    assert_eq!(Module::from_bytes(&bytes).unwrap(), fixture.module);
}

/// A module importing the parts of the engine runtime the weaver relies on.
struct Fixture {
    module: Module,
    marker: NameIndex,
    node: ClassIndex,
    node_type: TypeIndex,
    node_ready: MethodIndex,
    label_type: TypeIndex,
    string_type: TypeIndex,
}

impl Fixture {
    fn new() -> Self {
        let mut module = Module::default();
        let import = ClassFlags::new().with_is_import(true);
        let native = MethodFlags::new().with_is_native(true);

        let name = module.names_mut().add("System.String");
        let string_type = module.define(Type::new(name, TypeKind::Primitive));
        let name = module.names_mut().add("System.Exception");
        module.define(Class::new(name, Visibility::Public, import));

        let name = module.names_mut().add("Godot.Node");
        let node = module.define(Class::new(name, Visibility::Public, import));
        let node_type = module.class_type(node);

        let name = module.names_mut().add("_Ready");
        let node_ready = module.define(
            Method::new(name, Visibility::Public, native.with_is_virtual(true))
                .with_class(Some(node)),
        );
        let name = module.names_mut().add("GetNodeOrNull");
        let path = module.names_mut().add("path");
        let lookup = module.define(
            Method::new(name, Visibility::Public, native)
                .with_class(Some(node))
                .with_parameters([Parameter::new(path, string_type)])
                .with_return_type(Some(node_type)),
        );
        module[node].add_method(node_ready);
        module[node].add_method(lookup);

        let name = module.names_mut().add("Godot.Label");
        let label = module
            .define(Class::new(name, Visibility::Public, import).with_base(Some(node)));
        let label_type = module.class_type(label);

        let marker = module.names_mut().add("NodeWire.NodeAttribute");

        Self {
            module,
            marker,
            node,
            node_type,
            node_ready,
            label_type,
            string_type,
        }
    }

    fn class(&mut self, name: &str, base: Option<ClassIndex>) -> ClassIndex {
        let name = self.module.names_mut().add(name);
        self.module
            .define(Class::new(name, Visibility::Public, ClassFlags::new()).with_base(base))
    }

    fn marked_field(
        &mut self,
        class: ClassIndex,
        name: &str,
        type_: TypeIndex,
        path: Option<&str>,
    ) -> FieldIndex {
        let name = self.module.names_mut().add(name);
        let field = self.module.define(
            Field::new(name, class, Visibility::Private, type_, FieldFlags::new())
                .with_attributes([Attribute::new(self.marker, path.map(str::to_owned))]),
        );
        self.module[class].add_field(field);
        field
    }

    fn marked_property(
        &mut self,
        class: ClassIndex,
        name: &str,
        type_: TypeIndex,
        path: Option<&str>,
        with_setter: bool,
    ) {
        let setter = if with_setter {
            let setter_name = self.module.names_mut().add(format!("set_{name}"));
            let value = self.module.names_mut().add("value");
            let setter = self.module.define(
                Method::new(setter_name, Visibility::Public, MethodFlags::new())
                    .with_class(Some(class))
                    .with_parameters([Parameter::new(value, type_)])
                    .with_code(vec![Instr::Return]),
            );
            self.module[class].add_method(setter);
            Some(setter)
        } else {
            None
        };
        let name = self.module.names_mut().add(name);
        let property = self.module.define(
            Property::new(name, class, type_)
                .with_setter(setter)
                .with_attributes([Attribute::new(self.marker, path.map(str::to_owned))]),
        );
        self.module[class].add_property(property);
    }

    fn method(
        &mut self,
        class: ClassIndex,
        name: &str,
        flags: MethodFlags,
        body: Vec<Instr>,
    ) -> MethodIndex {
        let name = self.module.names_mut().add(name);
        let method = self.module.define(
            Method::new(name, Visibility::Public, flags)
                .with_class(Some(class))
                .with_code(body),
        );
        self.module[class].add_method(method);
        method
    }

    fn method_of(&self, class: &str, method: &str) -> MethodIndex {
        let class = self.module.find_class(class).unwrap();
        let name = self.module.names().get_index(method).unwrap();
        self.module[class]
            .methods()
            .iter()
            .copied()
            .find(|&idx| self.module[idx].name() == name)
            .unwrap()
    }

    fn listing(&self, class: &str, method: &str) -> String {
        Listing::new(&self.module, self.method_of(class, method))
            .unwrap()
            .to_string()
    }

    fn helper_count(&self) -> usize {
        let name = self
            .module
            .names()
            .get_index("NodeWire.Generated.NodeResolver")
            .unwrap();
        self.module
            .classes()
            .filter(|(_, class)| class.name() == name)
            .count()
    }
}
