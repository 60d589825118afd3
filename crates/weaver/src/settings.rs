/// Names of everything the weaver looks up in or adds to a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaverSettings {
    /// Base class of the hierarchy whose members can be wired.
    pub root_class: String,
    /// Instance method called by the runtime once the object is ready.
    pub lifecycle_method: String,
    /// Attribute that marks a member for wiring.
    pub marker_attribute: String,
    /// Instance method of the root class resolving a path to a node or null.
    pub lookup_method: String,
    /// Class instantiated with a message when resolution fails at runtime.
    pub exception_class: String,
    pub string_type: String,
    pub helper_class: String,
    pub helper_method: String,
    /// Prefix of the messages thrown by the helper.
    pub message_namespace: String,
}

impl Default for WeaverSettings {
    fn default() -> Self {
        Self {
            root_class: "Godot.Node".into(),
            lifecycle_method: "_Ready".into(),
            marker_attribute: "NodeWire.NodeAttribute".into(),
            lookup_method: "GetNodeOrNull".into(),
            exception_class: "System.Exception".into(),
            string_type: "System.String".into(),
            helper_class: "NodeWire.Generated.NodeResolver".into(),
            helper_method: "Resolve".into(),
            message_namespace: "NodeWire".into(),
        }
    }
}
