//! Runtime catalog: canonical names, C symbols, signatures and classes.
//!
//! The catalog is read from `runtime.def` (one directive per line):
//!
//! ```text
//! FUNC(id, c_symbol, "Canonical.Name", "ret(params)")
//! ALIAS("Canonical.Name", id)
//! CLASS_BEGIN("Class.Name", type_id, layout, ctor_id)
//! PROP("Name", type, getter_id, setter_id | none)
//! METHOD("Name", "ret(params)", target_id)
//! CLASS_END()
//! ```
//!
//! Ids, canonical names (aliases included) and C symbols are unique.
//! Aliases, constructors, accessors and method targets must name a function
//! declared on an earlier line. Method signatures omit the receiver; the
//! target takes it as its first parameter.

mod parse;

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use ks_core::trap::trap;
use ks_il::{Extern, IrBuilder, Type};
use thiserror::Error;

use crate::FastHashMap;

/// The catalog shipped with this crate.
pub const RUNTIME_DEF: &str = include_str!("../../runtime.def");

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub ret: Type,
    pub params: Vec<Type>,
}

impl Signature {
    pub fn parse(text: &str) -> Option<Signature> {
        parse::signature(text, 0).ok()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.ret)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str(")")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncEntry {
    pub id: String,
    pub symbol: String,
    pub canonical: String,
    pub sig: Signature,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropEntry {
    pub name: String,
    pub ty: Type,
    pub getter: String,
    pub setter: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodEntry {
    pub name: String,
    pub sig: Signature,
    pub target: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassEntry {
    pub name: String,
    pub type_id: u64,
    pub layout: String,
    pub ctor: Option<String>,
    pub props: IndexMap<String, PropEntry>,
    pub methods: IndexMap<String, MethodEntry>,
}

impl ClassEntry {
    pub fn prop(&self, name: &str) -> Option<&PropEntry> {
        self.props.get(name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.get(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("line {line}: malformed directive: {msg}")]
    Syntax { line: usize, msg: String },
    #[error("line {line}: unknown directive `{name}`")]
    UnknownDirective { line: usize, name: String },
    #[error("line {line}: {directive} takes {expected} arguments, found {found}")]
    Arity {
        line: usize,
        directive: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: duplicate function id `{id}`")]
    DuplicateId { line: usize, id: String },
    #[error("line {line}: duplicate canonical name `{name}`")]
    DuplicateCanonical { line: usize, name: String },
    #[error("line {line}: duplicate C symbol `{symbol}`")]
    DuplicateSymbol { line: usize, symbol: String },
    #[error("line {line}: alias `{name}` targets unknown id `{id}`")]
    UnknownAliasTarget { line: usize, name: String, id: String },
    #[error("line {line}: {role} `{id}` is not a declared function id")]
    UnknownTarget {
        line: usize,
        role: &'static str,
        id: String,
    },
    #[error("line {line}: malformed signature `{sig}`")]
    BadSignature { line: usize, sig: String },
    #[error("line {line}: unknown type `{name}`")]
    BadType { line: usize, name: String },
    #[error("line {line}: invalid type id `{value}`")]
    BadTypeId { line: usize, value: String },
    #[error("line {line}: {directive} outside a class")]
    OutsideClass { line: usize, directive: &'static str },
    #[error("line {line}: class `{name}` opened inside class `{open}`")]
    NestedClass { line: usize, name: String, open: String },
    #[error("line {line}: CLASS_END without CLASS_BEGIN")]
    UnmatchedEnd { line: usize },
    #[error("line {line}: class `{name}` is never closed")]
    UnclosedClass { line: usize, name: String },
    #[error("line {line}: duplicate class `{name}`")]
    DuplicateClass { line: usize, name: String },
    #[error("line {line}: duplicate member `{member}` in class `{class}`")]
    DuplicateMember {
        line: usize,
        class: String,
        member: String,
    },
    #[error("line {line}: `{member}` does not match the signature of `{id}`")]
    SignatureMismatch {
        line: usize,
        member: String,
        id: String,
    },
}

#[derive(Debug, Default)]
pub struct Registry {
    /// Keyed by id, in declaration order.
    functions: IndexMap<String, FuncEntry>,
    /// Canonical name (including aliases) to id.
    canonical: FastHashMap<String, String>,
    symbols: FastHashMap<String, String>,
    aliases: IndexMap<String, String>,
    classes: IndexMap<String, ClassEntry>,
}

impl Registry {
    pub fn parse(src: &str) -> Result<Registry, RegistryError> {
        let mut loader = Loader::default();
        for (i, line) in src.lines().enumerate() {
            if let Some(d) = parse::directive(line, i + 1)? {
                loader.apply(d, i + 1)?;
            }
        }
        if let Some((line, class)) = loader.open {
            return Err(RegistryError::UnclosedClass {
                line,
                name: class.name,
            });
        }
        Ok(loader.reg)
    }

    pub fn function(&self, id: &str) -> Option<&FuncEntry> {
        self.functions.get(id)
    }

    /// Entry for a canonical name, following aliases.
    pub fn resolve(&self, canonical: &str) -> Option<&FuncEntry> {
        self.canonical.get(canonical).and_then(|id| self.functions.get(id))
    }

    pub fn symbol_for(&self, canonical: &str) -> Option<&str> {
        self.resolve(canonical).map(|f| f.symbol.as_str())
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&FuncEntry> {
        self.symbols.get(symbol).and_then(|id| self.functions.get(id))
    }

    pub fn is_alias(&self, canonical: &str) -> bool {
        self.aliases.contains_key(canonical)
    }

    pub fn class(&self, name: &str) -> Option<&ClassEntry> {
        self.classes.get(name)
    }

    pub fn class_by_type_id(&self, type_id: u64) -> Option<&ClassEntry> {
        self.classes.values().find(|c| c.type_id == type_id)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FuncEntry> {
        self.functions.values()
    }

    /// `(alias, target id)` pairs.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, id)| (a.as_str(), id.as_str()))
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassEntry> {
        self.classes.values()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Extern declaration code generation emits for a canonical name.
    pub fn extern_decl(&self, canonical: &str) -> Option<Extern> {
        self.resolve(canonical).map(|f| Extern {
            name: f.symbol.clone(),
            ret_type: f.sig.ret,
            params: f.sig.params.clone(),
        })
    }

    /// Declares the extern behind `canonical` in the builder's module unless
    /// already present. Returns the C symbol to call.
    pub fn declare(&self, builder: &mut IrBuilder<'_>, canonical: &str) -> Option<String> {
        let f = self.resolve(canonical)?;
        if builder.module().find_extern(&f.symbol).is_none() {
            builder.add_extern(&f.symbol, f.sig.ret, f.sig.params.clone());
        }
        Some(f.symbol.clone())
    }
}

static RUNTIME: LazyLock<Registry> = LazyLock::new(|| match Registry::parse(RUNTIME_DEF) {
    Ok(reg) => {
        log::info!(
            "runtime registry loaded: {} functions, {} aliases, {} classes",
            reg.function_count(),
            reg.aliases.len(),
            reg.class_count()
        );
        reg
    }
    Err(e) => trap(&format!("runtime.def: {e}")),
});

/// The shipped catalog, parsed on first use.
pub fn runtime() -> &'static Registry {
    &RUNTIME
}

// ==================== Loader ====================

#[derive(Default)]
struct Loader {
    reg: Registry,
    /// Class being declared and the line it began on.
    open: Option<(usize, ClassEntry)>,
}

fn arity(d: &parse::Directive<'_>, name: &'static str, expected: usize, line: usize) -> Result<(), RegistryError> {
    if d.args.len() == expected {
        Ok(())
    } else {
        Err(RegistryError::Arity {
            line,
            directive: name,
            expected,
            found: d.args.len(),
        })
    }
}

impl Loader {
    fn apply(&mut self, d: parse::Directive<'_>, line: usize) -> Result<(), RegistryError> {
        match d.name {
            "FUNC" => {
                arity(&d, "FUNC", 4, line)?;
                self.func(d.args, line)
            }
            "ALIAS" => {
                arity(&d, "ALIAS", 2, line)?;
                self.alias(d.args, line)
            }
            "CLASS_BEGIN" => {
                arity(&d, "CLASS_BEGIN", 4, line)?;
                self.class_begin(d.args, line)
            }
            "PROP" => {
                arity(&d, "PROP", 4, line)?;
                self.prop(d.args, line)
            }
            "METHOD" => {
                arity(&d, "METHOD", 3, line)?;
                self.method(d.args, line)
            }
            "CLASS_END" => {
                arity(&d, "CLASS_END", 0, line)?;
                self.class_end(line)
            }
            other => Err(RegistryError::UnknownDirective {
                line,
                name: other.to_string(),
            }),
        }
    }

    fn func(&mut self, args: Vec<String>, line: usize) -> Result<(), RegistryError> {
        let [id, symbol, canonical, sig]: [String; 4] = take(args);
        let sig = parse::signature(&sig, line)?;
        let reg = &mut self.reg;
        if reg.functions.contains_key(&id) {
            return Err(RegistryError::DuplicateId { line, id });
        }
        if reg.canonical.contains_key(&canonical) {
            return Err(RegistryError::DuplicateCanonical { line, name: canonical });
        }
        if reg.symbols.contains_key(&symbol) {
            return Err(RegistryError::DuplicateSymbol { line, symbol });
        }
        reg.canonical.insert(canonical.clone(), id.clone());
        reg.symbols.insert(symbol.clone(), id.clone());
        reg.functions.insert(
            id.clone(),
            FuncEntry {
                id,
                symbol,
                canonical,
                sig,
            },
        );
        Ok(())
    }

    fn alias(&mut self, args: Vec<String>, line: usize) -> Result<(), RegistryError> {
        let [name, id]: [String; 2] = take(args);
        let reg = &mut self.reg;
        if !reg.functions.contains_key(&id) {
            return Err(RegistryError::UnknownAliasTarget { line, name, id });
        }
        if reg.canonical.contains_key(&name) {
            return Err(RegistryError::DuplicateCanonical { line, name });
        }
        reg.canonical.insert(name.clone(), id.clone());
        reg.aliases.insert(name, id);
        Ok(())
    }

    fn target(&self, id: &str, role: &'static str, line: usize) -> Result<&FuncEntry, RegistryError> {
        self.reg.functions.get(id).ok_or_else(|| RegistryError::UnknownTarget {
            line,
            role,
            id: id.to_string(),
        })
    }

    fn class_begin(&mut self, args: Vec<String>, line: usize) -> Result<(), RegistryError> {
        let [name, type_id, layout, ctor]: [String; 4] = take(args);
        if let Some((_, open)) = &self.open {
            return Err(RegistryError::NestedClass {
                line,
                name,
                open: open.name.clone(),
            });
        }
        if self.reg.classes.contains_key(&name) {
            return Err(RegistryError::DuplicateClass { line, name });
        }
        let Some(type_id) = parse::type_id(&type_id) else {
            return Err(RegistryError::BadTypeId { line, value: type_id });
        };
        let ctor = if ctor.is_empty() {
            None
        } else {
            self.target(&ctor, "constructor", line)?;
            Some(ctor)
        };
        self.open = Some((
            line,
            ClassEntry {
                name,
                type_id,
                layout,
                ctor,
                props: IndexMap::new(),
                methods: IndexMap::new(),
            },
        ));
        Ok(())
    }

    fn open_class(&mut self, directive: &'static str, line: usize) -> Result<&mut ClassEntry, RegistryError> {
        match &mut self.open {
            Some((_, class)) => Ok(class),
            None => Err(RegistryError::OutsideClass { line, directive }),
        }
    }

    fn prop(&mut self, args: Vec<String>, line: usize) -> Result<(), RegistryError> {
        let [name, ty, getter, setter]: [String; 4] = take(args);
        self.open_class("PROP", line)?;
        let Some(ty) = parse::def_type(&ty).filter(|t| !t.is_void()) else {
            return Err(RegistryError::BadType { line, name: ty });
        };
        let g = self.target(&getter, "getter", line)?;
        if g.sig.ret != ty || g.sig.params.len() != 1 {
            return Err(RegistryError::SignatureMismatch {
                line,
                member: name,
                id: getter,
            });
        }
        let setter = if setter == "none" || setter.is_empty() {
            None
        } else {
            let s = self.target(&setter, "setter", line)?;
            if s.sig.ret != Type::Void || s.sig.params.len() != 2 || s.sig.params[1] != ty {
                return Err(RegistryError::SignatureMismatch {
                    line,
                    member: name,
                    id: setter,
                });
            }
            Some(setter)
        };
        let class = self.open_class("PROP", line)?;
        if class.props.contains_key(&name) || class.methods.contains_key(&name) {
            return Err(RegistryError::DuplicateMember {
                line,
                class: class.name.clone(),
                member: name,
            });
        }
        class.props.insert(
            name.clone(),
            PropEntry {
                name,
                ty,
                getter,
                setter,
            },
        );
        Ok(())
    }

    fn method(&mut self, args: Vec<String>, line: usize) -> Result<(), RegistryError> {
        let [name, sig, target]: [String; 3] = take(args);
        self.open_class("METHOD", line)?;
        let sig = parse::signature(&sig, line)?;
        let t = self.target(&target, "method target", line)?;
        let receiver_ok = t.sig.params.first() == Some(&Type::Ptr);
        if !receiver_ok || t.sig.ret != sig.ret || t.sig.params[1..] != sig.params[..] {
            return Err(RegistryError::SignatureMismatch {
                line,
                member: name,
                id: target,
            });
        }
        let class = self.open_class("METHOD", line)?;
        if class.props.contains_key(&name) || class.methods.contains_key(&name) {
            return Err(RegistryError::DuplicateMember {
                line,
                class: class.name.clone(),
                member: name,
            });
        }
        class.methods.insert(name.clone(), MethodEntry { name, sig, target });
        Ok(())
    }

    fn class_end(&mut self, line: usize) -> Result<(), RegistryError> {
        let Some((_, class)) = self.open.take() else {
            return Err(RegistryError::UnmatchedEnd { line });
        };
        self.reg.classes.insert(class.name.clone(), class);
        Ok(())
    }
}

/// Moves an argument list of checked length into an array.
fn take<const N: usize>(args: Vec<String>) -> [String; N] {
    let mut it = args.into_iter();
    std::array::from_fn(|_| it.next().unwrap_or_default())
}
