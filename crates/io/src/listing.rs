use std::fmt;

use crate::definition::Method;
use crate::index::{ClassIndex, FieldIndex, MethodIndex, StringIndex, TypeIndex};
use crate::instr::{Instr, Invoke};
use crate::module::Module;

/// A method body rendered with every pool and definition reference replaced by its name.
#[derive(Debug)]
pub struct Listing<'a> {
    module: &'a Module,
    index: MethodIndex,
    method: &'a Method,
}

impl<'a> Listing<'a> {
    pub fn new(module: &'a Module, index: MethodIndex) -> Option<Self> {
        let method = module.get_item(index)?;
        Some(Self {
            module,
            index,
            method,
        })
    }

    fn string(&self, idx: StringIndex) -> impl fmt::Display + '_ {
        Quoted(self.module.get_item(idx).unwrap_or("<invalid>"))
    }

    fn type_name(&self, idx: TypeIndex) -> &str {
        self.module
            .get_item(idx)
            .and_then(|typ| self.module.get_item(typ.name()))
            .unwrap_or("<invalid>")
    }

    fn class_name(&self, idx: ClassIndex) -> &str {
        self.module
            .get_item(idx)
            .and_then(|class| self.module.get_item(class.name()))
            .unwrap_or("<invalid>")
    }

    fn field_name(&self, idx: FieldIndex) -> String {
        match self.module.get_item(idx) {
            Some(field) => format!(
                "{}::{}",
                self.class_name(field.class()),
                self.module.get_item(field.name()).unwrap_or("<invalid>")
            ),
            None => "<invalid>".to_owned(),
        }
    }

    fn method_name(&self, idx: MethodIndex) -> String {
        let Some(method) = self.module.get_item(idx) else {
            return "<invalid>".to_owned();
        };
        let name = self.module.get_item(method.name()).unwrap_or("<invalid>");
        match method.class() {
            Some(class) => format!("{}::{name}", self.class_name(class)),
            None => name.to_owned(),
        }
    }

    fn invoke(&self, invoke: &Invoke) -> String {
        let mut res = self.method_name(invoke.method());
        if !invoke.type_args().is_empty() {
            let args = invoke
                .type_args()
                .iter()
                .map(|&arg| self.type_name(arg))
                .collect::<Vec<_>>();
            res.push('<');
            res.push_str(&args.join(", "));
            res.push('>');
        }
        res
    }

    fn write_instr(&self, f: &mut fmt::Formatter<'_>, instr: &Instr) -> fmt::Result {
        match instr {
            Instr::StringConst(idx) => write!(f, "string.const {}", self.string(*idx)),
            Instr::LoadField(idx) => write!(f, "field.load {}", self.field_name(*idx)),
            Instr::StoreField(idx) => write!(f, "field.store {}", self.field_name(*idx)),
            Instr::Call(invoke) => write!(f, "invoke.static {}", self.invoke(invoke)),
            Instr::CallVirtual(invoke) => write!(f, "invoke.virtual {}", self.invoke(invoke)),
            Instr::New { class, arg_count } => {
                write!(f, "object.new {} {arg_count}", self.class_name(*class))
            }
            Instr::IsInstance(idx) => write!(f, "ref.isinst {}", self.type_name(*idx)),
            Instr::Cast(idx) => write!(f, "ref.cast {}", self.type_name(*idx)),
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// {}", self.method_name(self.index))?;

        let mut offset = 0;
        for instr in self.method.body() {
            write!(f, "{offset:04}: ")?;
            self.write_instr(f, instr)?;
            writeln!(f)?;
            offset += instr.size();
        }
        Ok(())
    }
}

struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
